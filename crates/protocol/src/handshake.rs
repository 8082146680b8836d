use bytes::{Buf, BufMut, BytesMut};

use crate::error::ProtocolError;

/// Magic bytes opening every connection, before any version negotiation.
pub const MAGIC: u16 = 0x0CAA;

/// Protocol version this build speaks. There is no negotiation: a mismatch
/// is a hard failure.
pub const PROTOCOL_VERSION: u16 = 0x0002;

/// Wire size of the handshake: `magic` then `version`, each 2 bytes,
/// big-endian. Unlike every other frame, the handshake carries no length
/// prefix — its size is fixed and known up front.
pub const HANDSHAKE_LEN: usize = 4;

/// Appends the handshake bytes to `buf`.
pub fn encode(buf: &mut BytesMut) {
    buf.put_u16(MAGIC);
    buf.put_u16(PROTOCOL_VERSION);
}

/// Validates a peer's handshake bytes. `bytes` must be exactly
/// [`HANDSHAKE_LEN`] long.
pub fn decode(mut bytes: &[u8]) -> Result<(), ProtocolError> {
    debug_assert_eq!(bytes.len(), HANDSHAKE_LEN);
    let magic = bytes.get_u16();
    if magic != MAGIC {
        return Err(ProtocolError::WrongMagic {
            expected: MAGIC,
            actual: magic,
        });
    }
    let version = bytes.get_u16();
    if version != PROTOCOL_VERSION {
        return Err(ProtocolError::WrongVersion {
            expected: PROTOCOL_VERSION,
            actual: version,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let mut buf = BytesMut::new();
        encode(&mut buf);
        assert_eq!(buf.len(), HANDSHAKE_LEN);
        decode(&buf).unwrap();
    }

    #[test]
    fn rejects_wrong_magic() {
        let mut buf = BytesMut::new();
        buf.put_u16(0xDEAD);
        buf.put_u16(PROTOCOL_VERSION);
        assert!(matches!(decode(&buf), Err(ProtocolError::WrongMagic { .. })));
    }

    #[test]
    fn rejects_wrong_version() {
        let mut buf = BytesMut::new();
        buf.put_u16(MAGIC);
        buf.put_u16(0xFFFF);
        assert!(matches!(decode(&buf), Err(ProtocolError::WrongVersion { .. })));
    }
}
