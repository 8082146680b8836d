use std::time::Duration;

/// Socket-side send buffer ceiling, in bytes. The upload refill loop stops
/// queuing new chunks once the outgoing buffer reaches this size.
pub const WRITE_BUFFER_SIZE: u64 = 100_000;

/// Default wall-clock budget per refill/scan invocation before yielding
/// back to the executor.
pub const DEFAULT_MAX_WORK: Duration = Duration::from_millis(40);

/// Tunables shared by [`crate::upload::Upload`] and [`crate::download::Download`].
#[derive(Clone, Copy, Debug)]
pub struct TransferConfig {
    /// Outgoing buffer ceiling; see [`WRITE_BUFFER_SIZE`].
    pub write_buffer_size: u64,
    /// Wall-clock budget per refill/scan burst.
    pub max_work: Duration,
    /// Whether a sender-side directory scan skips dotfiles.
    pub ignore_hidden: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            write_buffer_size: WRITE_BUFFER_SIZE,
            max_work: DEFAULT_MAX_WORK,
            ignore_hidden: false,
        }
    }
}
