//! # Overview
//!
//! The command-line front-end: parses arguments, wires a [`discovery::Discovery`]
//! adapter, a [`transfer::Upload`] or [`transfer::Download`], and a terminal
//! progress reporter together, and maps the outcome to a process exit code.
//!
//! # Design
//!
//! This crate stays a thin consumer of `transfer`'s public API; it never
//! reaches into `payload`/`protocol` internals. [`run`] is the sole entry
//! point, kept separate from `main` so it can be exercised without an actual
//! process boundary.

mod args;

pub use args::Args;

use std::net::SocketAddr;

use discovery::{BrowseEvent, Discovery, MdnsDiscovery, Peer};
use tokio::net::{TcpListener, TcpStream};
use transfer::{TransferConfig, UserChoice};

/// Process exit code for a completed transfer.
pub const EXIT_OK: i32 = 0;
/// Process exit code for any failure, including a peer rejection.
pub const EXIT_FAILURE: i32 = 1;

/// Runs one transfer according to `args` and returns the process exit code.
pub async fn run(args: Args) -> i32 {
    logging::init(args.verbosity());

    match run_inner(&args).await {
        Ok(()) => EXIT_OK,
        Err(err) => {
            tracing::error!("{err}");
            eprintln!("error: {err}");
            EXIT_FAILURE
        }
    }
}

async fn run_inner(args: &Args) -> Result<(), CliError> {
    let discovery = MdnsDiscovery::new().map_err(CliError::Discovery)?;

    if args.download {
        run_download(args, &discovery).await
    } else if let Some(path) = &args.upload {
        run_upload(args, &discovery, path).await
    } else {
        Err(CliError::Usage(
            "exactly one of --download or --upload <path> is required".into(),
        ))
    }
}

async fn run_upload(args: &Args, discovery: &MdnsDiscovery, path: &std::path::Path) -> Result<(), CliError> {
    let wanted_peer = args
        .peer
        .as_deref()
        .ok_or_else(|| CliError::Usage("--peer <name> is required with --upload".into()))?;

    let peer = find_peer(discovery, wanted_peer).await?;
    let address = discovery.lookup_host(&peer.hostname).await.map_err(CliError::Discovery)?;
    let socket_addr = SocketAddr::new(address, peer.port);

    tracing::info!(peer = %peer.username, addr = %socket_addr, "connecting");
    let stream = TcpStream::connect(socket_addr)
        .await
        .map_err(|source| CliError::Connect { addr: socket_addr, source })?;

    let mut upload = transfer::Upload::new(args.name.clone(), TransferConfig::default());
    upload.set_payload(path).await.map_err(CliError::Transfer)?;
    upload.on_progress(|event| {
        eprint!(
            "\rsending... {}/{} bytes",
            event.total_transferred, event.total_size
        );
    });
    upload.on_rate(|event| {
        tracing::debug!(bytes_per_second = event.bytes_per_second, "transfer rate");
    });
    upload.on_failed(|err| tracing::warn!(%err, "upload failed"));

    let upload = upload.run(stream).await.map_err(CliError::Transfer)?;
    eprintln!();

    report_outcome(transfer::TransferRole::from(upload))
}

/// Logs the average rate (if the transfer started) and maps its final
/// [`transfer::Outcome`] to a [`CliError`].
fn report_outcome(role: transfer::TransferRole) -> Result<(), CliError> {
    if let Some(rate) = role.notifier().and_then(transfer::Notifier::average_rate) {
        tracing::info!(bytes_per_second = rate, "average rate");
    }

    match role.outcome() {
        transfer::Outcome::Completed => Ok(()),
        transfer::Outcome::Rejected => Err(CliError::Rejected),
        transfer::Outcome::Error(reason) => Err(CliError::Usage(reason)),
        transfer::Outcome::InProgress => Err(CliError::Usage("transfer ended in an unexpected state".into())),
    }
}

async fn run_download(args: &Args, discovery: &MdnsDiscovery) -> Result<(), CliError> {
    let target_dir = args
        .target_dir
        .clone()
        .ok_or_else(|| CliError::Usage("--target-dir <path> is required with --download".into()))?;

    let listener = TcpListener::bind("0.0.0.0:0")
        .await
        .map_err(CliError::Listen)?;
    let port = listener.local_addr().map_err(CliError::Listen)?.port();

    let mut publish_events = discovery
        .publish(&args.name, port)
        .await
        .map_err(CliError::Discovery)?;
    if let Some(discovery::PublishEvent::NameChanged(name)) = publish_events.recv().await {
        tracing::info!(%name, "published");
    }

    tracing::info!(port, "waiting for an incoming connection");
    let (stream, peer_addr) = listener.accept().await.map_err(CliError::Listen)?;
    tracing::info!(addr = %peer_addr, "accepted connection");

    let mut download = transfer::Download::new(TransferConfig::default());
    let pending = download.wait_for_offer(stream).await.map_err(CliError::Transfer)?;

    let manifest = pending.manifest();
    eprintln!(
        "{} wants to send {} file(s), {} bytes total",
        download.peer_username().unwrap_or("someone"),
        manifest.files.len(),
        manifest.total_size
    );

    let choice = if args.yes {
        UserChoice::Accept
    } else {
        prompt_choice()
    };

    download.on_progress(|event| {
        eprint!(
            "\rreceiving... {}/{} bytes",
            event.total_transferred, event.total_size
        );
    });
    download.on_rate(|event| {
        tracing::debug!(bytes_per_second = event.bytes_per_second, "transfer rate");
    });
    download.on_failed(|err| tracing::warn!(%err, "download failed"));

    let download = download
        .give_user_choice(pending, choice, target_dir)
        .await
        .map_err(CliError::Transfer)?;
    eprintln!();

    report_outcome(transfer::TransferRole::from(download))
}

fn prompt_choice() -> UserChoice {
    use std::io::Write;
    eprint!("accept? [y/N] ");
    let _ = std::io::stderr().flush();
    let mut line = String::new();
    if std::io::stdin().read_line(&mut line).is_err() {
        return UserChoice::Reject;
    }
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => UserChoice::Accept,
        _ => UserChoice::Reject,
    }
}

async fn find_peer(discovery: &MdnsDiscovery, wanted_username: &str) -> Result<Peer, CliError> {
    let mut events = discovery.browse().await.map_err(CliError::Discovery)?;
    while let Some(event) = events.recv().await {
        if let BrowseEvent::Added(peer) = event {
            if peer.username == wanted_username {
                return Ok(peer);
            }
        }
    }
    Err(CliError::PeerNotFound(wanted_username.to_string()))
}

/// Errors the CLI front-end surfaces before exiting with [`EXIT_FAILURE`].
#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("{0}")]
    Usage(String),

    #[error("discovery failed: {0}")]
    Discovery(discovery::DiscoveryError),

    #[error("no peer named {0:?} was found")]
    PeerNotFound(String),

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to listen for incoming connections: {0}")]
    Listen(#[source] std::io::Error),

    #[error(transparent)]
    Transfer(#[from] transfer::LocalshareError),

    #[error("transfer rejected")]
    Rejected,
}
