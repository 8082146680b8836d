use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::ProtocolError;

/// Appends a length-prefixed UTF-8 string: a 4-byte length followed by the
/// raw bytes. Used by every frame that carries free-form text.
pub fn put_string(buf: &mut BytesMut, s: &str) {
    buf.put_u32(s.len() as u32);
    buf.put_slice(s.as_bytes());
}

/// Reads a string previously written by [`put_string`].
pub fn get_string(buf: &mut Bytes) -> Result<String, ProtocolError> {
    let bytes = get_bytes(buf)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|_| ProtocolError::BadMessageSize { kind: "string", size: 0 })
}

/// Appends a length-prefixed byte string.
pub fn put_bytes(buf: &mut BytesMut, data: &[u8]) {
    buf.put_u32(data.len() as u32);
    buf.put_slice(data);
}

/// Reads a byte string previously written by [`put_bytes`].
pub fn get_bytes(buf: &mut Bytes) -> Result<Bytes, ProtocolError> {
    if buf.remaining() < 4 {
        return Err(ProtocolError::BadMessageSize { kind: "length prefix", size: 0 });
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(ProtocolError::BadMessageSize {
            kind: "length-prefixed body",
            size: len as u32,
        });
    }
    Ok(buf.copy_to_bytes(len))
}
