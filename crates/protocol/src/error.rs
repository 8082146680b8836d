use std::io;

/// Errors raised while framing or decoding bytes on the wire.
///
/// Any of these, once surfaced to the transfer layer, ends the connection:
/// there is no partial recovery from a malformed frame.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The peer's handshake did not start with the expected magic bytes.
    #[error("wrong magic bytes: expected {expected:#06x}, got {actual:#06x}")]
    WrongMagic {
        /// Magic this implementation expects.
        expected: u16,
        /// Magic the peer actually sent.
        actual: u16,
    },

    /// The peer's handshake declared an unsupported protocol version.
    #[error("unsupported protocol version {actual:#06x} (this build speaks {expected:#06x})")]
    WrongVersion {
        /// Version this implementation speaks.
        expected: u16,
        /// Version the peer declared.
        actual: u16,
    },

    /// The message code's tag nibble did not match any known frame kind.
    #[error("unknown message code {0:#04x}")]
    UnknownCode(u8),

    /// A length-prefixed frame declared a body size outside the sane range
    /// for its kind (larger than `MAX_FRAME_BODY`, or zero for any kind
    /// other than `Checksums`, which permits an empty body).
    #[error("message of kind {kind} declared an invalid body size of {size} bytes")]
    BadMessageSize {
        /// Human-readable name of the frame kind.
        kind: &'static str,
        /// Declared body size.
        size: u32,
    },

    /// A frame arrived that is not valid in the sender's or receiver's
    /// current state (e.g. a `Chunk` before an `Accept`).
    #[error("received {received} while in state {state}")]
    MessageInWrongState {
        /// Name of the frame kind that arrived.
        received: &'static str,
        /// Name of the state it arrived in.
        state: &'static str,
    },

    /// The payload embedded in an `Offer` frame failed validation.
    #[error(transparent)]
    InvalidPayload(#[from] payload::PayloadError),

    /// Underlying socket I/O failed.
    #[error(transparent)]
    Io(#[from] io::Error),
}
