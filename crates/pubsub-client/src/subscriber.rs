//! Subscriber receive loop: spec.md §4.4's per-subscriber dedicated
//! thread.
//!
//! Grounded in the original `mmw_create_subscriber`'s `std::thread`
//! loop over a blocking socket read; this version additionally emits
//! ACKs for reliable deliveries and periodic heartbeats, both absent
//! from the original (SPEC_FULL.md §2) but required by spec.md §4.4.

use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use pubsub_protocol::{Message, MessageType};

use crate::config::ClientConfig;
use crate::transport::{self, FramedReader};
use crate::wire::ClientCodec;

/// The user-supplied delivery callback, in either overload spec.md §4.4
/// names (`create_subscriber` / `create_subscriber_raw`). Runs on the
/// receive thread; per spec.md §9 it must not block indefinitely.
pub enum Callback {
    Text(Box<dyn Fn(&str) + Send + 'static>),
    Raw(Box<dyn Fn(&[u8]) + Send + 'static>),
}

pub struct Subscriber {
    topic: String,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Subscriber {
    pub fn spawn(
        topic: String,
        stream: TcpStream,
        codec: ClientCodec,
        callback: Callback,
        config: ClientConfig,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = stop.clone();
        let thread_topic = topic.clone();
        let handle = std::thread::Builder::new()
            .name(format!("pubsub-sub-{thread_topic}"))
            .spawn(move || receive_loop(stream, thread_stop, codec, callback, thread_topic, config))
            .expect("failed to spawn subscriber receive thread");

        Self {
            topic,
            stop,
            handle: Some(handle),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Signal the receive loop to stop and join it. Per spec.md §8's
    /// invariant 6, once this returns the thread is no longer running.
    pub fn stop_and_join(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Subscriber {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn receive_loop(
    mut stream: TcpStream,
    stop: Arc<AtomicBool>,
    codec: ClientCodec,
    callback: Callback,
    topic: String,
    config: ClientConfig,
) {
    // A short read timeout lets the loop come up for air between
    // messages to check the stop flag and the heartbeat schedule;
    // `FramedReader` carries any partial frame across the resulting
    // timeouts so this never desyncs the stream.
    let poll_interval = config.heartbeat_interval.min(Duration::from_millis(200));
    if let Err(e) = stream.set_read_timeout(Some(poll_interval)) {
        tracing::warn!(topic = %topic, error = %e, "failed to set subscriber read timeout");
    }

    let mut reader = FramedReader::new();
    let mut last_heartbeat = Instant::now();

    while !stop.load(Ordering::Relaxed) {
        match reader.try_read_record(&mut stream, config.max_frame_len) {
            Ok(Some(bytes)) if bytes.is_empty() => {} // keepalive, no-op
            Ok(Some(bytes)) => handle_record(&bytes, &mut stream, &codec, &callback, &topic),
            Ok(None) => {} // read timed out; fall through to the checks below
            Err(e) => {
                tracing::debug!(topic = %topic, error = %e, "subscriber connection closed");
                break;
            }
        }

        if last_heartbeat.elapsed() >= config.heartbeat_interval {
            if send_heartbeat(&mut stream, &codec).is_err() {
                break;
            }
            last_heartbeat = Instant::now();
        }
    }

    // Best-effort: tell the broker this subscriber is leaving, then
    // close. Attempted whether the loop above exited via `stop` or via
    // a connection error — if the connection is already dead the send
    // is a harmless no-op.
    if let Ok(bytes) = codec.serialize(&Message::unregister(topic.clone())) {
        let _ = transport::send_record(&mut stream, &bytes);
    }
    let _ = stream.shutdown(std::net::Shutdown::Both);
    tracing::debug!(topic = %topic, "subscriber receive thread exiting");
}

fn handle_record(
    bytes: &[u8],
    stream: &mut TcpStream,
    codec: &ClientCodec,
    callback: &Callback,
    topic: &str,
) {
    let decoded = match callback {
        Callback::Raw(_) => codec.deserialize_raw(bytes),
        Callback::Text(_) => codec.deserialize(bytes),
    };

    let message = match decoded {
        Ok(m) => m,
        Err(e) => {
            // spec.md §7: a CodecError on an inbound record is logged
            // and the record dropped, never closing the connection.
            tracing::warn!(topic = %topic, error = %e, "failed to decode inbound record, dropping");
            return;
        }
    };

    if message.message_type != MessageType::Publish {
        return;
    }

    match callback {
        Callback::Text(f) => f(&message.payload),
        Callback::Raw(f) => f(&message.payload_raw),
    }

    if message.reliability {
        let ack = Message::ack(message.message_id, message.topic.clone());
        match codec.serialize(&ack) {
            Ok(bytes) => {
                if let Err(e) = transport::send_record(stream, &bytes) {
                    tracing::warn!(topic = %topic, error = %e, "failed to send ack");
                }
            }
            Err(e) => tracing::warn!(topic = %topic, error = %e, "failed to encode ack"),
        }
    }
}

fn send_heartbeat(stream: &mut TcpStream, codec: &ClientCodec) -> Result<(), crate::error::ClientError> {
    let bytes = codec.serialize(&Message::heartbeat())?;
    transport::send_record(stream, &bytes)?;
    Ok(())
}
