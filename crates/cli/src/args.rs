use std::path::PathBuf;

use clap::Parser;

/// Peer-to-peer LAN file transfer over mDNS discovery and a direct TCP
/// connection.
#[derive(Debug, Parser)]
#[command(name = "localshare", version, about)]
pub struct Args {
    /// Listen for an inbound transfer instead of sending one.
    #[arg(long, conflicts_with = "upload")]
    pub download: bool,

    /// Path of the file or directory to send.
    #[arg(long, value_name = "PATH")]
    pub upload: Option<PathBuf>,

    /// Username of the peer to send to (required with `--upload`), matched
    /// against discovered peers.
    #[arg(long, value_name = "NAME")]
    pub peer: Option<String>,

    /// Username to advertise on the network.
    #[arg(long, value_name = "NAME", default_value = "localshare-user")]
    pub name: String,

    /// Directory incoming files are written under (required with
    /// `--download`).
    #[arg(long, value_name = "PATH")]
    pub target_dir: Option<PathBuf>,

    /// Accept an incoming transfer automatically instead of prompting.
    #[arg(long)]
    pub yes: bool,

    /// Increase logging verbosity; repeatable (`-v`, `-vv`).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Reduce logging to warnings and errors only.
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Resolves `--verbose`/`--quiet` into a single [`logging::Verbosity`].
    #[must_use]
    pub fn verbosity(&self) -> logging::Verbosity {
        if self.quiet {
            return logging::Verbosity::Quiet;
        }
        let mut verbosity = logging::Verbosity::Normal;
        for _ in 0..self.verbose {
            verbosity = verbosity.bump();
        }
        verbosity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_and_upload_are_mutually_exclusive() {
        let err = Args::try_parse_from(["localshare", "--download", "--upload", "a.txt"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn verbosity_escalates_with_repeated_flag() {
        let args = Args::try_parse_from(["localshare", "--upload", "a.txt", "-vv"]).unwrap();
        assert_eq!(args.verbosity(), logging::Verbosity::Debug);
    }

    #[test]
    fn quiet_wins_over_verbose() {
        let args = Args::try_parse_from(["localshare", "--upload", "a.txt", "-v", "--quiet"]).unwrap();
        assert_eq!(args.verbosity(), logging::Verbosity::Quiet);
    }
}
