//! Typed errors for the framing and codec layers.
//!
//! Per spec.md §7, `IOError` and `ProtocolError` are per-connection: a
//! caller that gets one of these back should tear down that connection,
//! not the whole process. `CodecError` is recoverable at a finer grain —
//! callers decoding a single inbound record should log and drop it rather
//! than close the connection.

use thiserror::Error;

/// Errors surfaced by [`crate::framing::send_record`] and
/// [`crate::framing::recv_record`].
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("connection closed")]
    Eof,

    #[error("frame length {len} exceeds cap of {cap} bytes")]
    TooLarge { len: u32, cap: u32 },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Errors surfaced by a [`crate::codec::Codec`] implementation.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed record: {0}")]
    Malformed(String),

    #[error("unknown message type {0:?}")]
    UnknownType(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Bincode(#[from] bincode::Error),
}
