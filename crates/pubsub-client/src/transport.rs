//! Blocking length-prefixed record framing over `std::net::TcpStream`.
//!
//! `pubsub_protocol::framing` is generic over `tokio::io::{AsyncRead,
//! AsyncWrite}`; the client library deliberately does not run on an
//! async runtime (spec.md §5: one blocking receive thread per
//! subscriber, publishers send from the calling thread — the same
//! blocking-socket shape as the original `MMW.cpp`). This module is the
//! synchronous counterpart of `pubsub_protocol::framing`, implementing
//! the identical wire contract (spec.md §4.1) over blocking I/O.

use std::io::{Read, Write};
use std::net::TcpStream;

use pubsub_protocol::FrameError;

/// Write `payload` as a single framed record: a 4-byte big-endian length
/// prefix followed by the bytes, with write-exact semantics.
pub fn send_record(stream: &mut TcpStream, payload: &[u8]) -> Result<(), FrameError> {
    let len = payload.len() as u32;
    stream.write_all(&len.to_be_bytes())?;
    stream.write_all(payload)?;
    stream.flush()?;
    Ok(())
}

/// Read a single framed record. `L == 0` yields an empty record
/// (keepalive, silently ignorable); `L` above `max_frame_len` is a
/// protocol error and leaves the stream no longer record-aligned.
pub fn recv_record(stream: &mut TcpStream, max_frame_len: u32) -> Result<Vec<u8>, FrameError> {
    let mut len_bytes = [0u8; 4];
    match stream.read_exact(&mut len_bytes) {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Err(FrameError::Eof),
        Err(e) => return Err(FrameError::Io(e)),
    }
    let len = u32::from_be_bytes(len_bytes);

    if len == 0 {
        return Ok(Vec::new());
    }
    if len > max_frame_len {
        return Err(FrameError::TooLarge {
            len,
            cap: max_frame_len,
        });
    }

    let mut buf = vec![0u8; len as usize];
    stream.read_exact(&mut buf).map_err(|e| {
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            FrameError::Eof
        } else {
            FrameError::Io(e)
        }
    })?;
    Ok(buf)
}

fn is_timeout(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

/// A record reader that tolerates read timeouts without losing its
/// place mid-frame.
///
/// The subscriber receive loop (spec.md §4.4) needs to periodically come
/// up for air to check its stop flag and emit heartbeats even when no
/// message is arriving, so its socket runs with a short read timeout.
/// A plain `read_exact` would discard whatever partial prefix or
/// payload it had already consumed from the stream on timeout, silently
/// desyncing the next record from its length prefix. `FramedReader`
/// carries that partial progress across calls instead.
#[derive(Default)]
pub struct FramedReader {
    len_buf: [u8; 4],
    len_read: usize,
    payload_buf: Vec<u8>,
    payload_read: usize,
    reading_payload: bool,
}

impl FramedReader {
    pub fn new() -> Self {
        Self::default()
    }

    fn reset(&mut self) {
        self.len_read = 0;
        self.reading_payload = false;
        self.payload_read = 0;
    }

    /// Attempt to read one complete record. Returns `Ok(None)` if the
    /// stream's read timeout elapsed before a full record arrived —
    /// callers should check their stop flag / heartbeat schedule and
    /// call again, which resumes exactly where this call left off.
    pub fn try_read_record(
        &mut self,
        stream: &mut TcpStream,
        max_frame_len: u32,
    ) -> Result<Option<Vec<u8>>, FrameError> {
        while self.len_read < 4 {
            match stream.read(&mut self.len_buf[self.len_read..]) {
                Ok(0) => return Err(FrameError::Eof),
                Ok(n) => self.len_read += n,
                Err(e) if is_timeout(&e) => return Ok(None),
                Err(e) => return Err(FrameError::Io(e)),
            }
        }

        if !self.reading_payload {
            let len = u32::from_be_bytes(self.len_buf);
            if len == 0 {
                self.reset();
                return Ok(Some(Vec::new()));
            }
            if len > max_frame_len {
                return Err(FrameError::TooLarge {
                    len,
                    cap: max_frame_len,
                });
            }
            self.payload_buf = vec![0u8; len as usize];
            self.payload_read = 0;
            self.reading_payload = true;
        }

        while self.payload_read < self.payload_buf.len() {
            match stream.read(&mut self.payload_buf[self.payload_read..]) {
                Ok(0) => return Err(FrameError::Eof),
                Ok(n) => self.payload_read += n,
                Err(e) if is_timeout(&e) => return Ok(None),
                Err(e) => return Err(FrameError::Io(e)),
            }
        }

        let record = std::mem::take(&mut self.payload_buf);
        self.reset();
        Ok(Some(record))
    }
}
