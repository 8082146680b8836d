//! Verbosity-driven `tracing` subscriber setup.
//!
//! The transfer engine and the discovery adapter only ever call into
//! `tracing`'s macros; this crate owns the one place a global subscriber is
//! installed, so an embedding application (the CLI, or a future GUI) decides
//! the verbosity mapping once at startup.

#![forbid(unsafe_code)]

use tracing_subscriber::EnvFilter;

/// Verbosity level requested by the caller, mirroring the CLI's
/// `--verbose`/`--quiet` flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    /// Only warnings and errors.
    Quiet,
    /// Warnings, errors, and top-level transfer progress.
    #[default]
    Normal,
    /// Adds per-frame protocol tracing.
    Verbose,
    /// Adds per-chunk and checksum tracing.
    Debug,
}

impl Verbosity {
    /// Increases verbosity by one `-v` step, saturating at [`Verbosity::Debug`].
    #[must_use]
    pub fn bump(self) -> Self {
        match self {
            Self::Quiet => Self::Normal,
            Self::Normal => Self::Verbose,
            Self::Verbose | Self::Debug => Self::Debug,
        }
    }

    fn filter_directive(self) -> &'static str {
        match self {
            Self::Quiet => "warn",
            Self::Normal => "info",
            Self::Verbose => "debug",
            Self::Debug => "trace",
        }
    }
}

/// Installs a global `tracing` subscriber for the given [`Verbosity`].
///
/// Safe to call more than once; subsequent calls are no-ops (matching
/// `tracing`'s own "first subscriber wins" semantics), which keeps test
/// harnesses that each spin up a CLI invocation from panicking.
pub fn init(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.filter_directive()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bump_saturates_at_debug() {
        let mut v = Verbosity::Quiet;
        for _ in 0..10 {
            v = v.bump();
        }
        assert_eq!(v, Verbosity::Debug);
    }

    #[test]
    fn ordering_matches_declaration() {
        assert!(Verbosity::Quiet < Verbosity::Normal);
        assert!(Verbosity::Normal < Verbosity::Verbose);
        assert!(Verbosity::Verbose < Verbosity::Debug);
    }
}
