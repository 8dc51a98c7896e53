//! # Pub/Sub Client Library
//!
//! The embeddable half of the pub/sub middleware (spec.md §4.4): open a
//! TCP connection per publisher or subscriber, register with the
//! broker, publish framed records, and — for subscribers — run a
//! dedicated receive thread that dispatches into a user callback, acks
//! reliable deliveries, and emits heartbeats.
//!
//! [`Client`] is the Rust-native entry point. [`ffi`] exposes the same
//! capability set as a stable C ABI for non-Rust callers.

pub mod client;
pub mod config;
pub mod error;
pub mod ffi;
pub mod subscriber;
pub mod transport;
pub mod wire;

pub use client::Client;
pub use config::{ClientConfig, CodecKind};
pub use error::ClientError;
