use bytes::{Buf, BufMut, Bytes, BytesMut};
use payload::Manifest;

use crate::error::ProtocolError;
use crate::handshake::PROTOCOL_VERSION;
use crate::wire::{get_bytes, get_string, put_bytes, put_string};

const TAG_ERROR: u8 = 0;
const TAG_OFFER: u8 = 1;
const TAG_ACCEPT: u8 = 2;
const TAG_REJECT: u8 = 3;
const TAG_CHUNK: u8 = 4;
pub(crate) const TAG_CHECKSUMS: u8 = 5;
const TAG_COMPLETED: u8 = 6;

/// One message of the transfer protocol, post-handshake.
///
/// `Accept`, `Reject`, and `Completed` carry no body and are a bare code on
/// the wire. Every other variant is length-prefixed: see [`crate::codec`]
/// for the framing itself.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    /// A human-readable failure description, sent before a graceful close.
    Error(String),
    /// Offered by the sender: its username, and the manifest describing
    /// what it wants to send.
    Offer {
        /// Username of the offering peer.
        username: String,
        /// Payload manifest.
        manifest: Manifest,
    },
    /// The receiver agreed to the offer.
    Accept,
    /// The receiver declined the offer.
    Reject,
    /// A span of raw payload bytes, opaque to the framer.
    Chunk(Bytes),
    /// Digests of every file finished since the previous `Checksums` frame,
    /// in transfer order.
    Checksums(Vec<Bytes>),
    /// Sent by the receiver once every byte and every checksum has been
    /// accounted for.
    Completed,
}

impl Frame {
    fn tag(&self) -> u8 {
        match self {
            Frame::Error(_) => TAG_ERROR,
            Frame::Offer { .. } => TAG_OFFER,
            Frame::Accept => TAG_ACCEPT,
            Frame::Reject => TAG_REJECT,
            Frame::Chunk(_) => TAG_CHUNK,
            Frame::Checksums(_) => TAG_CHECKSUMS,
            Frame::Completed => TAG_COMPLETED,
        }
    }

    /// The 16-bit wire code for this frame: `(protocol_version << 4) | tag`.
    #[must_use]
    pub fn code(&self) -> u16 {
        code_for_tag(self.tag())
    }

    /// Whether this kind of frame carries no body and no length prefix.
    #[must_use]
    pub fn is_code_only(&self) -> bool {
        matches!(self, Frame::Accept | Frame::Reject | Frame::Completed)
    }

    /// Encodes just the body (not the code or length prefix) of a
    /// length-prefixed frame. Panics if called on a code-only variant; the
    /// codec never does this.
    pub(crate) fn encode_body(&self, buf: &mut BytesMut) {
        match self {
            Frame::Error(message) => put_string(buf, message),
            Frame::Offer { username, manifest } => {
                put_string(buf, username);
                manifest.encode(buf);
            }
            Frame::Chunk(data) => buf.put_slice(data),
            Frame::Checksums(digests) => {
                buf.put_u32(digests.len() as u32);
                for digest in digests {
                    put_bytes(buf, digest);
                }
            }
            Frame::Accept | Frame::Reject | Frame::Completed => {
                unreachable!("code-only frames have no body")
            }
        }
    }

    /// Builds a code-only frame from its wire code. Fails if `code` names a
    /// length-prefixed kind or an unknown tag.
    pub(crate) fn decode_code_only(code: u16) -> Result<Self, ProtocolError> {
        match tag_for_code(code)? {
            TAG_ACCEPT => Ok(Frame::Accept),
            TAG_REJECT => Ok(Frame::Reject),
            TAG_COMPLETED => Ok(Frame::Completed),
            _ => Err(ProtocolError::UnknownCode((code & 0xF) as u8)),
        }
    }

    /// Builds a length-prefixed frame from its wire code and already-read
    /// body bytes.
    pub(crate) fn decode_body(code: u16, mut body: Bytes) -> Result<Self, ProtocolError> {
        match tag_for_code(code)? {
            TAG_ERROR => Ok(Frame::Error(get_string(&mut body)?)),
            TAG_OFFER => {
                let username = get_string(&mut body)?;
                let manifest = Manifest::decode(&mut body)?;
                Ok(Frame::Offer { username, manifest })
            }
            TAG_CHUNK => Ok(Frame::Chunk(body)),
            TAG_CHECKSUMS => {
                // An empty body is a benign empty list (no files finished since
                // the previous Checksums frame), not a malformed count prefix.
                if !body.has_remaining() {
                    return Ok(Frame::Checksums(Vec::new()));
                }
                if body.remaining() < 4 {
                    return Err(ProtocolError::BadMessageSize {
                        kind: "Checksums",
                        size: body.remaining() as u32,
                    });
                }
                let count = body.get_u32() as usize;
                let mut digests = Vec::with_capacity(count.min(1 << 16));
                for _ in 0..count {
                    digests.push(get_bytes(&mut body)?);
                }
                Ok(Frame::Checksums(digests))
            }
            _ => Err(ProtocolError::UnknownCode((code & 0xF) as u8)),
        }
    }

    /// Human-readable name, used in [`ProtocolError::MessageInWrongState`].
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Frame::Error(_) => "Error",
            Frame::Offer { .. } => "Offer",
            Frame::Accept => "Accept",
            Frame::Reject => "Reject",
            Frame::Chunk(_) => "Chunk",
            Frame::Checksums(_) => "Checksums",
            Frame::Completed => "Completed",
        }
    }
}

fn code_for_tag(tag: u8) -> u16 {
    (u16::from(PROTOCOL_VERSION) << 4) | u16::from(tag)
}

/// Whether `tag` names a code-only frame kind (no length prefix).
pub(crate) fn is_code_only_tag(tag: u8) -> bool {
    matches!(tag, TAG_ACCEPT | TAG_REJECT | TAG_COMPLETED)
}

pub(crate) fn tag_for_code(code: u16) -> Result<u8, ProtocolError> {
    let version = code >> 4;
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::WrongVersion {
            expected: PROTOCOL_VERSION,
            actual: version,
        });
    }
    let tag = (code & 0xF) as u8;
    if tag > TAG_COMPLETED {
        return Err(ProtocolError::UnknownCode(tag));
    }
    Ok(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manifest() -> Manifest {
        Manifest {
            payload_root: ".".into(),
            total_size: 3,
            files: vec![payload::FileMeta {
                relative_path: "a".into(),
                size: 3,
            }],
        }
    }

    #[test]
    fn code_only_frames_round_trip_through_code() {
        for frame in [Frame::Accept, Frame::Reject, Frame::Completed] {
            let code = frame.code();
            let decoded = Frame::decode_code_only(code).unwrap();
            assert_eq!(decoded, frame);
        }
    }

    #[test]
    fn offer_body_round_trips() {
        let frame = Frame::Offer {
            username: "alice".into(),
            manifest: manifest(),
        };
        let mut buf = BytesMut::new();
        frame.encode_body(&mut buf);
        let decoded = Frame::decode_body(frame.code(), buf.freeze()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn checksums_body_round_trips() {
        let frame = Frame::Checksums(vec![Bytes::from_static(&[1; 16]), Bytes::from_static(&[2; 16])]);
        let mut buf = BytesMut::new();
        frame.encode_body(&mut buf);
        let decoded = Frame::decode_body(frame.code(), buf.freeze()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let bogus_code = (u16::from(PROTOCOL_VERSION) << 4) | 0xF;
        assert!(matches!(
            Frame::decode_code_only(bogus_code),
            Err(ProtocolError::UnknownCode(_))
        ));
    }

    #[test]
    fn mismatched_version_is_rejected() {
        let bogus_code = (0xFFFFu16 << 4) | u16::from(TAG_ACCEPT);
        assert!(matches!(
            Frame::decode_code_only(bogus_code),
            Err(ProtocolError::WrongVersion { .. })
        ));
    }
}
