//! # Pub/Sub Wire Protocol
//!
//! The framed transport, message codec, and logical [`Message`] record
//! shared by the broker and the client library. Nothing in this crate
//! knows about sockets, topics tables, or reliability bookkeeping — it is
//! purely "how do bytes become a `Message` and back".

pub mod codec;
pub mod error;
pub mod framing;
pub mod message;

pub use codec::{BinaryCodec, Codec, TextCodec};
pub use error::{CodecError, FrameError};
pub use framing::{recv_record, send_record, DEFAULT_MAX_FRAME_LEN};
pub use message::{Message, MessageType, Reliability, Role};
