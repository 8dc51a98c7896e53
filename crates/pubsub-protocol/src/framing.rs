//! Length-prefixed record framing over any async byte stream.
//!
//! Every record on the wire is a 4-byte big-endian length followed by
//! exactly that many bytes of codec-produced payload (spec.md §4.1).
//! Framing is generic over `AsyncRead`/`AsyncWrite` so the same code
//! drives a live `TcpStream` in the broker/client and an in-memory
//! duplex pipe in tests.

use crate::error::FrameError;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

/// Default cap on a single record's payload length: 16 MiB, per spec.md §4.1.
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

/// Write `payload` as a single framed record: a 4-byte big-endian length
/// prefix followed by the bytes, with write-exact semantics.
///
/// A partial write that cannot be completed surfaces as
/// [`FrameError::Io`]; per spec.md §4.1 the socket must then be
/// considered unusable by the caller.
pub async fn send_record<W>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError>
where
    W: AsyncWrite + Unpin,
{
    let len = payload.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    trace!("sent record of {} bytes", len);
    Ok(())
}

/// Read a single framed record: 4 exact bytes of big-endian length, then
/// exactly that many bytes of payload.
///
/// `L == 0` yields an empty `Vec` — permitted as a no-op keepalive per
/// spec.md §4.1; callers should silently ignore it rather than attempt to
/// decode it as a message. `L` above `max_frame_len` is rejected as
/// [`FrameError::TooLarge`] without consuming the payload bytes (the
/// connection is no longer usable at that point — the caller must close
/// it, since the stream position is no longer record-aligned).
pub async fn recv_record<R>(reader: &mut R, max_frame_len: u32) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    match reader.read_exact(&mut len_bytes).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FrameError::Eof),
        Err(e) => return Err(FrameError::Io(e)),
    }
    let len = u32::from_be_bytes(len_bytes);

    if len == 0 {
        return Ok(Vec::new());
    }
    if len > max_frame_len {
        warn!("rejecting oversized record: {} bytes (cap {})", len, max_frame_len);
        return Err(FrameError::TooLarge {
            len,
            cap: max_frame_len,
        });
    }

    let mut buf = vec![0u8; len as usize];
    reader.read_exact(&mut buf).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameError::Eof
        } else {
            FrameError::Io(e)
        }
    })?;
    trace!("received record of {} bytes", len);
    Ok(buf)
}
