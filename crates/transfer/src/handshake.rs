use bytes::BytesMut;
use protocol::handshake;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::LocalshareError;

/// Writes the handshake, then reads and validates the peer's. Both sides of
/// a connection call this first, before constructing a
/// [`protocol::FrameCodec`]-wrapped [`tokio_util::codec::Framed`].
pub async fn perform<S>(stream: &mut S) -> Result<(), LocalshareError>
where
    S: AsyncReadExt + AsyncWriteExt + Unpin,
{
    let mut out = BytesMut::new();
    handshake::encode(&mut out);
    stream.write_all(&out).await?;

    let mut buf = [0u8; handshake::HANDSHAKE_LEN];
    stream.read_exact(&mut buf).await?;
    handshake::decode(&buf).map_err(LocalshareError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn matching_peers_complete_the_handshake() {
        let (mut a, mut b) = tokio::io::duplex(64);
        let (ra, rb) = tokio::join!(perform(&mut a), perform(&mut b));
        ra.unwrap();
        rb.unwrap();
    }
}
