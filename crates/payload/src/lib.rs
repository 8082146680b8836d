//! # Overview
//!
//! The payload model owns everything about *what* is being transferred,
//! independent of the wire protocol or the socket. A payload is either a
//! single file or a directory tree, flattened into an ordered list of
//! [`file::File`] entries and described by a [`manifest::Manifest`] that is
//! small enough to send ahead of any chunk.
//!
//! # Design
//!
//! [`manager::Manager`] is the only type the transfer layer talks to. It
//! hides the file list behind a chunk-oriented API (`send_next_chunk`,
//! `receive_chunk`) and a checksum-oriented API (`take_pending_checksums`,
//! `test_checksums`), so the caller never has to reason about file
//! boundaries: a chunk may start partway through one file and end partway
//! through the next.
//!
//! [`file::File`] maps each file into memory with [`memmap2`] rather than
//! read/write syscalls per chunk, and folds an MD5 digest ([`checksums`])
//! over every byte it copies so a finished file's checksum is always
//! available with no extra pass over the data.
//!
//! # Invariants
//!
//! - At most one [`file::File`] is open (mapped) at a time across a whole
//!   [`manager::Manager`].
//! - Chunk boundaries never imply file boundaries; a [`file::File`] is only
//!   closed when its own `pos` reaches its `size`.
//! - A manifest is fully [`manifest::Manifest::validate`]d, including a
//!   path-escape check, before any chunk is read from the network.

pub mod error;
pub mod file;
pub mod manager;
pub mod manifest;

pub use error::PayloadError;
pub use file::{File, OpenMode};
pub use manager::{FileChecksum, Manager, Mode, CHUNK_SIZE};
pub use manifest::{FileMeta, Manifest};
