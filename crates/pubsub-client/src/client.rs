//! The embeddable client: process-wide initialize/cleanup lifecycle,
//! publisher/subscriber registration, and publish calls (spec.md §4.4).
//!
//! spec.md §9 calls out the original's implicit global state (file-scope
//! statics in `MMW.cpp`) as something "a faithful systems implementation
//! must model as explicit process state with initialize/teardown
//! lifecycle" rather than an implicit global constructor — `Client` is
//! that explicit state. The one genuinely global piece, the C ABI's
//! singleton, lives only in [`crate::ffi`], which has no other way to
//! hold state across calls.

use std::collections::HashMap;
use std::net::TcpStream;
use std::sync::Mutex;

use pubsub_protocol::{Message, Role};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::subscriber::{Callback, Subscriber};
use crate::transport;
use crate::wire::ClientCodec;

/// One publisher's connection: a registered socket for a single topic.
/// `Mutex` gives interior mutability for `&self` publish calls without
/// exposing the socket to more than one writer at a time — the same
/// shape as the broker's `ConnectionHandle` (spec.md §4.5.3's "never
/// hold a lock across a blocking send" applies here too, trivially,
/// since there is exactly one writer).
struct Publisher {
    stream: Mutex<TcpStream>,
}

pub struct Client {
    config: ClientConfig,
    codec: ClientCodec,
    publishers: Mutex<HashMap<String, Publisher>>,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl Client {
    /// spec.md §4.4: errors if `broker_host` is empty or `broker_port`
    /// is `0`.
    pub fn initialize(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;
        let codec = ClientCodec::from_kind(config.codec);
        Ok(Self {
            config,
            codec,
            publishers: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        })
    }

    /// Opens a TCP connection to the broker and registers `topic` as a
    /// publisher. A second call for the same topic replaces the first
    /// connection (the new registration wins; the old socket is closed
    /// without a matching `unregister`, since the broker's own
    /// connection-close teardown path — spec.md §4.5.2 — removes its
    /// routing-table entry regardless).
    pub fn create_publisher(&self, topic: impl Into<String>) -> Result<(), ClientError> {
        let topic = topic.into();
        if topic.is_empty() {
            return Err(ClientError::State("register with empty topic".into()));
        }
        let stream = connect_and_register(&self.config, &topic, Role::Publisher, &self.codec)?;
        let mut publishers = self.publishers.lock().unwrap();
        publishers.insert(
            topic,
            Publisher {
                stream: Mutex::new(stream),
            },
        );
        Ok(())
    }

    /// Registers `topic` as a subscriber and spawns its dedicated
    /// receive thread (spec.md §4.4), invoking `callback` with the text
    /// payload of each `publish` delivered on `topic`.
    pub fn create_subscriber(
        &self,
        topic: impl Into<String>,
        callback: impl Fn(&str) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.create_subscriber_inner(topic.into(), Callback::Text(Box::new(callback)))
    }

    /// As [`Client::create_subscriber`], but `callback` receives the raw
    /// payload bytes of a binary publish.
    pub fn create_subscriber_raw(
        &self,
        topic: impl Into<String>,
        callback: impl Fn(&[u8]) + Send + 'static,
    ) -> Result<(), ClientError> {
        self.create_subscriber_inner(topic.into(), Callback::Raw(Box::new(callback)))
    }

    fn create_subscriber_inner(&self, topic: String, callback: Callback) -> Result<(), ClientError> {
        if topic.is_empty() {
            return Err(ClientError::State("register with empty topic".into()));
        }
        let stream = connect_and_register(&self.config, &topic, Role::Subscriber, &self.codec)?;
        let subscriber = Subscriber::spawn(topic, stream, self.codec, callback, self.config.clone());
        self.subscribers.lock().unwrap().push(subscriber);
        Ok(())
    }

    /// Publishes a text payload on `topic` using the publisher
    /// connection created by [`Client::create_publisher`]. The broker,
    /// not the client, assigns `message_id` (spec.md §4.4).
    pub fn publish(&self, topic: &str, text: &str, reliability: bool) -> Result<(), ClientError> {
        self.publish_message(topic, Message::publish_text(topic, text, reliability))
    }

    /// As [`Client::publish`], but for a raw byte payload.
    pub fn publish_raw(&self, topic: &str, bytes: &[u8], reliability: bool) -> Result<(), ClientError> {
        self.publish_message(topic, Message::publish_raw(topic, bytes.to_vec(), reliability))
    }

    fn publish_message(&self, topic: &str, message: Message) -> Result<(), ClientError> {
        let publishers = self.publishers.lock().unwrap();
        let publisher = publishers
            .get(topic)
            .ok_or_else(|| ClientError::State(format!("no publisher registered for topic {topic}")))?;
        let bytes = self.codec.serialize(&message)?;
        let mut stream = publisher.stream.lock().unwrap();
        transport::send_record(&mut stream, &bytes)?;
        Ok(())
    }

    /// Orderly teardown (spec.md §4.4): for each publisher, send
    /// `unregister` and close; stop and join every subscriber receive
    /// thread (each of which sends its own `unregister` before closing
    /// — see `subscriber::receive_loop`). After this returns, per
    /// spec.md §8's invariant 6, no socket and no receive thread remain.
    pub fn cleanup(&self) -> Result<(), ClientError> {
        let mut publishers = self.publishers.lock().unwrap();
        for (topic, publisher) in publishers.drain() {
            let mut stream = publisher.stream.lock().unwrap();
            if let Ok(bytes) = self.codec.serialize(&Message::unregister(topic)) {
                let _ = transport::send_record(&mut stream, &bytes);
            }
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        drop(publishers);

        let mut subscribers = self.subscribers.lock().unwrap();
        for subscriber in subscribers.drain(..) {
            subscriber.stop_and_join();
        }
        Ok(())
    }
}

fn connect_and_register(
    config: &ClientConfig,
    topic: &str,
    role: Role,
    codec: &ClientCodec,
) -> Result<TcpStream, ClientError> {
    let mut stream = TcpStream::connect((config.broker_host.as_str(), config.broker_port))?;
    let _ = stream.set_nodelay(true);
    let bytes = codec.serialize(&Message::register(topic, role))?;
    transport::send_record(&mut stream, &bytes)?;
    Ok(stream)
}
