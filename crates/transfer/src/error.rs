use std::path::PathBuf;

/// Single error type the transfer engine surfaces to its caller, flattening
/// [`protocol::ProtocolError`] and [`payload::PayloadError`] into one set of
/// variants (handshake, protocol, payload, integrity, transport, and
/// peer-reported kinds) rather than chaining through each crate's own error
/// enum. Those crates keep their own enums internally (`FrameCodec`'s
/// `Decoder`/`Encoder` associated error type, `Manifest`/`Manager`'s fallible
/// APIs), but nothing outside this crate deals in anything but
/// `LocalshareError`.
#[derive(Debug, thiserror::Error)]
pub enum LocalshareError {
    // -- Handshake --
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

    // -- Protocol --
    /// The message code's tag nibble did not match any known frame kind.
    #[error("unknown message code {0:#04x}")]
    UnknownCode(u8),

    /// A length-prefixed frame declared a body size outside the sane range
    /// for its kind.
    #[error("message of kind {kind} declared an invalid body size of {size} bytes")]
    BadMessageSize {
        /// Human-readable name of the frame kind.
        kind: &'static str,
        /// Declared body size.
        size: u32,
    },

    /// A frame arrived that is not valid in the sender's or receiver's
    /// current state.
    #[error("received {received} while in state {state}")]
    IllegalMessage {
        /// Name of the frame kind that arrived.
        received: &'static str,
        /// Name of the state it arrived in.
        state: &'static str,
    },

    // -- Payload --
    /// The sender re-opened a file whose size or modification time no
    /// longer matches the snapshot taken when the payload was built.
    #[error("{path} changed on disk since it was offered")]
    FileChanged {
        /// Path of the file that changed, relative to the payload root.
        path: PathBuf,
    },

    /// Creating the destination directory hierarchy failed.
    #[error("failed to create directories for {path}: {source}")]
    PathCreation {
        /// Destination path whose parent directories could not be created.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Opening a file (read or write side) failed.
    #[error("failed to open {path}: {source}")]
    Open {
        /// Path that failed to open.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Truncating/resizing the destination file failed.
    #[error("failed to resize {path} to {size} bytes: {source}")]
    Resize {
        /// Path being resized.
        path: PathBuf,
        /// Target size.
        size: u64,
        #[source]
        source: std::io::Error,
    },

    /// Memory-mapping a file failed.
    #[error("failed to map {path}: {source}")]
    Map {
        /// Path that failed to map.
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory was offered for upload but contains no regular files.
    #[error("{path} contains no files to send")]
    EmptyDirectory {
        /// Directory that was scanned.
        path: PathBuf,
    },

    /// A manifest referenced a path outside of the payload root, or the
    /// payload root itself was not a single path segment.
    #[error("invalid path in manifest: {0}")]
    InvalidPath(String),

    /// An offered manifest failed validation before any data was read.
    #[error("invalid offer: {0}")]
    InvalidOffer(String),

    /// A manifest could not be decoded from the wire bytes.
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    // -- Integrity --
    /// A received file's digest did not match the sender's digest.
    #[error("checksum mismatch for {path}")]
    ChecksumMismatch {
        /// Path whose checksum did not match.
        path: PathBuf,
    },

    /// The peer sent a checksum for a file that has not finished receiving.
    #[error("checksum received before file finished transferring")]
    PrematureChecksum,

    /// The peer claimed a chunk larger than the bytes remaining in the
    /// payload.
    #[error("chunk of {requested} bytes overruns the {remaining} bytes remaining")]
    ChunkOverrun {
        /// Size claimed by the peer.
        requested: u64,
        /// Bytes actually remaining in the payload.
        remaining: u64,
    },

    // -- Transport --
    /// The socket itself failed (connect, read, or write).
    #[error("transport error: {0}")]
    Transport(#[source] std::io::Error),

    // -- Peer-reported --
    /// The peer sent an `Error` frame describing why it gave up.
    #[error("peer reported an error: {0}")]
    PeerReported(String),

    /// The peer rejected the offer.
    #[error("peer rejected the transfer")]
    Rejected,

    /// An operation was attempted out of order (e.g. `give_user_choice`
    /// before an `Offer` was received).
    #[error("transfer is not in a state where {0} is valid")]
    InvalidOperation(&'static str),
}

impl From<protocol::ProtocolError> for LocalshareError {
    fn from(err: protocol::ProtocolError) -> Self {
        match err {
            protocol::ProtocolError::WrongMagic { expected, actual } => Self::WrongMagic { expected, actual },
            protocol::ProtocolError::WrongVersion { expected, actual } => Self::WrongVersion { expected, actual },
            protocol::ProtocolError::UnknownCode(tag) => Self::UnknownCode(tag),
            protocol::ProtocolError::BadMessageSize { kind, size } => Self::BadMessageSize { kind, size },
            protocol::ProtocolError::MessageInWrongState { received, state } => {
                Self::IllegalMessage { received, state }
            }
            protocol::ProtocolError::InvalidPayload(err) => err.into(),
            protocol::ProtocolError::Io(err) => Self::Transport(err),
        }
    }
}

impl From<payload::PayloadError> for LocalshareError {
    fn from(err: payload::PayloadError) -> Self {
        match err {
            payload::PayloadError::FileChanged { path } => Self::FileChanged { path },
            payload::PayloadError::PathCreation { path, source } => Self::PathCreation { path, source },
            payload::PayloadError::Open { path, source } => Self::Open { path, source },
            payload::PayloadError::Resize { path, size, source } => Self::Resize { path, size, source },
            payload::PayloadError::Map { path, source } => Self::Map { path, source },
            payload::PayloadError::EmptyDirectory { path } => Self::EmptyDirectory { path },
            payload::PayloadError::InvalidPath(msg) => Self::InvalidPath(msg),
            payload::PayloadError::InvalidOffer(msg) => Self::InvalidOffer(msg),
            payload::PayloadError::ChecksumMismatch { path } => Self::ChecksumMismatch { path },
            payload::PayloadError::PrematureChecksum => Self::PrematureChecksum,
            payload::PayloadError::ChunkOverrun { requested, remaining } => {
                Self::ChunkOverrun { requested, remaining }
            }
            payload::PayloadError::MalformedManifest(msg) => Self::MalformedManifest(msg),
            payload::PayloadError::Io(err) => Self::Transport(err),
        }
    }
}

impl From<std::io::Error> for LocalshareError {
    fn from(source: std::io::Error) -> Self {
        LocalshareError::Transport(source)
    }
}
