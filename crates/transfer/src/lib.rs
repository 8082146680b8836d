//! # Overview
//!
//! Drives one transfer over an already-connected, duplex byte stream: the
//! handshake, then either the [`upload::Upload`] or [`download::Download`]
//! state machine built on top of [`protocol::FrameCodec`] and
//! [`payload::Manager`].
//!
//! # Design
//!
//! Both state machines are generic over `S: AsyncRead + AsyncWrite + Unpin`
//! rather than tied to [`tokio::net::TcpStream`], so the full round trip can
//! be exercised in tests over [`tokio::io::duplex`] with no sockets
//! involved.
//!
//! [`download::Download`] splits its run into [`download::Download::wait_for_offer`]
//! and [`download::Download::give_user_choice`] rather than a single `run`,
//! because the receiver's accept/reject decision is made by a human (or a
//! `--yes` flag) after inspecting the sender's manifest, not by the library.
//!
//! [`notifier::Notifier`] turns the raw byte counters the state machines
//! already track into throttled progress and rate events, so a caller (the
//! CLI) can render a progress bar without polling on every chunk.

mod base;
pub mod config;
pub mod download;
pub mod error;
pub mod handshake;
pub mod notifier;
pub mod role;
pub mod status;
pub mod upload;

pub use config::TransferConfig;
pub use download::{Download, PendingOffer, UserChoice};
pub use error::LocalshareError;
pub use notifier::{Notifier, ProgressEvent, RateEvent};
pub use role::TransferRole;
pub use status::{DownloadStatus, Outcome, UploadStatus};
pub use upload::Upload;
