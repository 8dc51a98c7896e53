//! Broker error kinds, mirroring spec.md §7.
//!
//! Per-connection errors (`Io`, `Protocol`) are handled by tearing down
//! just the offending connection; `Persistence` is logged and non-fatal;
//! `State` surfaces a caller mistake (e.g. an empty topic); `Shutdown`
//! unwinds the broker's background threads in order.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Codec(#[from] pubsub_protocol::CodecError),

    #[error(transparent)]
    Frame(#[from] pubsub_protocol::FrameError),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("invalid state: {0}")]
    State(String),

    #[error("broker is shutting down")]
    Shutdown,
}
