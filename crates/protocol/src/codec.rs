use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::ProtocolError;
use crate::frame::{is_code_only_tag, tag_for_code, Frame, TAG_CHECKSUMS};

/// Upper bound on a length-prefixed frame's declared body size. Well above
/// anything a real `Offer` or `Checksums` frame produces; exists only to
/// stop a malformed or hostile peer from making us allocate unboundedly.
const MAX_FRAME_BODY: u32 = 64 * 1024 * 1024;

/// Header size of a length-prefixed frame: `code (2B) | payload_size (4B)`.
const LENGTH_PREFIXED_HEADER: usize = 6;

/// [`tokio_util::codec::Decoder`]/[`Encoder`] for [`Frame`], to be used
/// inside a [`tokio_util::codec::Framed`] wrapping the connection's
/// `TcpStream` once the handshake has completed.
///
/// Never consumes bytes from the source buffer before a full frame (code,
/// then size for length-prefixed kinds, then exactly `payload_size` bytes of
/// body) has arrived.
#[derive(Default)]
pub struct FrameCodec {
    _private: (),
}

impl FrameCodec {
    /// Builds a fresh codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        if src.len() < 2 {
            return Ok(None);
        }
        let code = u16::from_be_bytes([src[0], src[1]]);
        let tag = tag_for_code(code)?;

        if is_code_only_tag(tag) {
            src.advance(2);
            return Frame::decode_code_only(code).map(Some);
        }

        if src.len() < LENGTH_PREFIXED_HEADER {
            return Ok(None);
        }
        let body_len = u32::from_be_bytes([src[2], src[3], src[4], src[5]]);
        // Checksums is the one length-prefixed frame that legitimately carries
        // an empty body: a benign empty digest list, logged rather than
        // rejected (see Frame::decode_body).
        if (body_len == 0 && tag != TAG_CHECKSUMS) || body_len > MAX_FRAME_BODY {
            return Err(ProtocolError::BadMessageSize {
                kind: "frame payload_size",
                size: body_len,
            });
        }
        let body_len = body_len as usize;
        let total_len = LENGTH_PREFIXED_HEADER + body_len;
        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIXED_HEADER);
        let body = src.split_to(body_len).freeze();
        Frame::decode_body(code, body).map(Some)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        if item.is_code_only() {
            dst.put_u16(item.code());
            return Ok(());
        }

        let mut body = BytesMut::new();
        item.encode_body(&mut body);
        dst.reserve(LENGTH_PREFIXED_HEADER + body.len());
        dst.put_u16(item.code());
        dst.put_u32(body.len() as u32);
        dst.put_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use payload::{FileMeta, Manifest};

    fn roundtrip(frame: Frame) -> Frame {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).unwrap();
        let decoded = codec.decode(&mut buf).unwrap().expect("frame should be fully buffered");
        assert!(buf.is_empty());
        decoded
    }

    #[test]
    fn code_only_frames_round_trip() {
        assert_eq!(roundtrip(Frame::Accept), Frame::Accept);
        assert_eq!(roundtrip(Frame::Reject), Frame::Reject);
        assert_eq!(roundtrip(Frame::Completed), Frame::Completed);
    }

    #[test]
    fn chunk_round_trips() {
        let frame = Frame::Chunk(Bytes::from_static(b"hello"));
        assert_eq!(roundtrip(frame.clone()), frame);
    }

    #[test]
    fn offer_round_trips() {
        let frame = Frame::Offer {
            username: "bob".into(),
            manifest: Manifest {
                payload_root: ".".into(),
                total_size: 2,
                files: vec![FileMeta {
                    relative_path: "a".into(),
                    size: 2,
                }],
            },
        };
        assert_eq!(roundtrip(frame.clone()), frame);
    }

    #[test]
    fn decode_waits_for_a_full_frame() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        codec.encode(Frame::Chunk(Bytes::from_static(b"hello world")), &mut buf).unwrap();
        let mut partial = buf.split_to(buf.len() - 3);
        assert!(codec.decode(&mut partial).unwrap().is_none());
    }

    #[test]
    fn zero_length_frame_is_rejected() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_u16(Frame::Chunk(Bytes::new()).code());
        buf.put_u32(0);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::BadMessageSize { .. })
        ));
    }

    #[test]
    fn zero_length_checksums_is_accepted_as_empty_list() {
        let mut codec = FrameCodec::new();
        let mut buf = BytesMut::new();
        buf.put_u16(Frame::Checksums(Vec::new()).code());
        buf.put_u32(0);
        let decoded = codec.decode(&mut buf).unwrap().expect("frame should be fully buffered");
        assert_eq!(decoded, Frame::Checksums(Vec::new()));
    }
}
