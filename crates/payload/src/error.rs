use std::path::PathBuf;

/// Errors raised by the payload model: file I/O, manifest validation, and
/// integrity checking.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
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

    /// A manifest referenced a path outside of the payload root (e.g. an
    /// absolute path or one containing `..`), or the payload root itself
    /// was not a single path segment.
    #[error("invalid path in manifest: {0}")]
    InvalidPath(String),

    /// An offered manifest failed validation before any data was read.
    #[error("invalid offer: {0}")]
    InvalidOffer(String),

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

    /// A manifest could not be decoded from the wire bytes.
    #[error("malformed manifest: {0}")]
    MalformedManifest(String),

    /// A lower-level I/O failure surfaced by [`crate::file::File::read_into`]
    /// or [`crate::file::File::write_from`] (e.g. the file was not open in
    /// the expected mode).
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
