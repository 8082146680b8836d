/// Errors raised while publishing the local peer or browsing for others.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    /// The underlying mDNS daemon could not be started.
    #[error("failed to start the mDNS daemon: {0}")]
    DaemonStart(String),

    /// Registering the local service record failed.
    #[error("failed to register service: {0}")]
    Register(String),

    /// Unregistering the local service record failed.
    #[error("failed to unregister service: {0}")]
    Unregister(String),

    /// Starting a browse query failed.
    #[error("failed to browse for peers: {0}")]
    Browse(String),

    /// Resolving a hostname to an address failed.
    #[error("failed to resolve host {hostname}: {source}")]
    HostLookup {
        /// Hostname that failed to resolve.
        hostname: String,
        #[source]
        source: std::io::Error,
    },

    /// A hostname resolved to zero addresses.
    #[error("host {0} resolved to no addresses")]
    NoAddress(String),
}
