//! # Overview
//!
//! The wire framer turns a byte-oriented duplex stream into a sequence of
//! typed [`Frame`]s. It owns exactly two things: the handshake (magic plus
//! version, exchanged once per connection with no length prefix) and the
//! length-prefixed framing used by every message after it.
//!
//! # Design
//!
//! [`handshake`] is a tiny synchronous encode/decode pair; the caller is
//! expected to read/write its fixed [`handshake::HANDSHAKE_LEN`] bytes
//! directly on the socket before ever constructing a [`codec::FrameCodec`].
//! From there, [`codec::FrameCodec`] implements
//! [`tokio_util::codec::Decoder`]/[`Encoder`] so the transfer layer can wrap
//! the connection in a `Framed<TcpStream, FrameCodec>` and work purely in
//! terms of [`Frame`] values.
//!
//! Message codes embed the protocol version (`(version << 4) | tag`), so a
//! version mismatch is detected on the very first frame rather than only at
//! the handshake, and code-only frames (`Accept`, `Reject`, `Completed`)
//! never pay for a length prefix they don't need.

pub mod codec;
pub mod error;
pub mod frame;
pub mod handshake;
mod wire;

pub use codec::FrameCodec;
pub use error::ProtocolError;
pub use frame::Frame;
pub use handshake::{HANDSHAKE_LEN, MAGIC, PROTOCOL_VERSION};
