//! # Overview
//!
//! Peer discovery as a narrow interface the transfer engine consumes,
//! independent of the concrete multicast-DNS library: a [`Discovery`] trait
//! with [`MdnsDiscovery`] as its one production implementation over
//! [`mdns_sd`].
//!
//! # Design
//!
//! The engine only ever needs three capabilities: publish the local peer
//! under a requested username, browse for others, and resolve a browsed
//! peer's hostname to an address. [`Discovery`] exposes exactly that,
//! nothing about service records or TXT properties leaks past it.
//!
//! Publishing a name can be renamed out from under the caller by the
//! daemon on collision (mDNS resolves same-username conflicts by
//! appending a suffix); [`PublishEvent::NameChanged`] surfaces that the
//! same way the registration callback does in the adapter this crate is
//! grounded on.

pub mod error;
mod mdns;
mod peer;

pub use error::DiscoveryError;
pub use mdns::MdnsDiscovery;
pub use peer::Peer;

use std::net::IpAddr;

use tokio::sync::mpsc;

/// The fixed mDNS service type both sides of a transfer advertise under.
pub const SERVICE_TYPE: &str = "_localshare._tcp.";

/// An event raised about the local peer's own published record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PublishEvent {
    /// The daemon assigned (or reassigned) the local service a name,
    /// possibly different from the one requested (collision).
    NameChanged(String),
    /// Publishing failed or was torn down; `None` on graceful shutdown.
    BeingDestroyed(Option<String>),
}

/// An event raised while browsing for peers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BrowseEvent {
    /// A peer appeared (or its advertised hostname/port changed).
    Added(Peer),
    /// A peer's record expired or was withdrawn.
    Removed(Peer),
}

/// Capabilities the transfer engine needs from a discovery backend:
/// publish the local peer, browse for others, and resolve a hostname.
///
/// Implementations run their I/O on background tasks and deliver events
/// over channels, so the engine never blocks on discovery traffic.
#[async_trait::async_trait]
pub trait Discovery: Send + Sync {
    /// Registers the local peer under `requested_username`, returning a
    /// receiver of [`PublishEvent`]s. The first event is always a
    /// `NameChanged` carrying the name actually assigned (which may differ
    /// from `requested_username` on collision).
    async fn publish(
        &self,
        requested_username: &str,
        port: u16,
    ) -> Result<mpsc::Receiver<PublishEvent>, DiscoveryError>;

    /// Starts browsing for peers, returning a receiver of [`BrowseEvent`]s.
    async fn browse(&self) -> Result<mpsc::Receiver<BrowseEvent>, DiscoveryError>;

    /// Resolves `hostname` to an address usable to open a TCP connection.
    async fn lookup_host(&self, hostname: &str) -> Result<IpAddr, DiscoveryError>;
}
