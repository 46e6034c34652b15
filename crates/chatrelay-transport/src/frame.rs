//! Length-prefix framing for stream transports.
//!
//! ```text
//! ┌──────────────────────┬──────────────────────────┐
//! │ length: u32 (BE)     │ payload: `length` bytes  │
//! └──────────────────────┴──────────────────────────┘
//! ```
//!
//! The helpers are generic over `AsyncRead`/`AsyncWrite` so they work on a
//! TCP half as well as on an in-memory duplex pipe in tests.

use std::io::{self, ErrorKind};

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::TransportError;

/// Size of the length prefix in bytes.
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Builds a complete frame (prefix + payload) in a single buffer.
///
/// # Errors
/// Returns [`TransportError::FrameTooLarge`] if the payload length does
/// not fit in a `u32`.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    let len = u32::try_from(payload.len())
        .map_err(|_| TransportError::FrameTooLarge(payload.len()))?;

    let mut buf = BytesMut::with_capacity(LENGTH_PREFIX_LEN + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.to_vec())
}

/// Writes one frame with a single `write_all`, so concurrent writers that
/// serialize on a lock never interleave partial frames.
pub async fn write_frame<W>(
    writer: &mut W,
    payload: &[u8],
) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin,
{
    let frame = encode_frame(payload)?;
    writer
        .write_all(&frame)
        .await
        .map_err(TransportError::SendFailed)?;
    writer.flush().await.map_err(TransportError::SendFailed)
}

/// Reads one frame.
///
/// Returns `Ok(None)` if the stream ends before the header or the body is
/// complete. The body buffer grows with the bytes that actually arrive, so
/// a bogus length does not allocate up front.
pub async fn read_frame<R>(reader: &mut R) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; LENGTH_PREFIX_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(header) as usize;
    let mut body = Vec::new();
    reader.take(len as u64).read_to_end(&mut body).await?;

    if body.len() < len {
        return Ok(None);
    }
    Ok(Some(body))
}
