/// A peer discovered on the local network.
///
/// Mirrors the distinction the protocol draws between `name` (the raw,
/// disambiguated service instance name) and `username` (what a human
/// picked): only `username` is meaningful here, since disambiguation is an
/// implementation detail of the concrete [`crate::Discovery`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
    /// Username advertised by the peer.
    pub username: String,
    /// Hostname the service was resolved against. IP resolution is a
    /// separate step ([`crate::Discovery::lookup_host`]).
    pub hostname: String,
    /// TCP port the peer's receiver is listening on.
    pub port: u16,
}
