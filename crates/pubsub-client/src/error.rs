//! Client-side error kinds, mirroring spec.md §7.
//!
//! Per spec.md §7's propagation policy, none of these ever unwind out of
//! a public API call: every client operation returns `Result` (or, at
//! the FFI boundary, the `MMW_OK`/`MMW_ERROR` pair), and a recoverable
//! error here always means "this one call failed", never "the process
//! is in an unknown state".

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Codec(#[from] pubsub_protocol::CodecError),

    #[error(transparent)]
    Frame(#[from] pubsub_protocol::FrameError),

    #[error("invalid state: {0}")]
    State(String),

    #[error("client is shutting down")]
    Shutdown,
}
