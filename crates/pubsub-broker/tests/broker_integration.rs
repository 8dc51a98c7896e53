//! End-to-end scenarios against a live broker, driven by raw framed TCP
//! connections standing in for publisher/subscriber clients. Covers the
//! concrete scenarios in spec.md §8.

use std::time::Duration;

use pubsub_broker::config::BrokerConfig;
use pubsub_broker::server;
use pubsub_protocol::{Message, Role, TextCodec, Codec};
use tokio::net::TcpStream;
use tokio::time::timeout;

async fn start_broker(db_path: std::path::PathBuf) -> std::net::SocketAddr {
    let config = BrokerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        db_path: db_path.to_string_lossy().into_owned(),
        retry_interval: Duration::from_millis(200),
        max_retries: 3,
        retry_sweep_period: Duration::from_millis(20),
        heartbeat_timeout: Duration::from_millis(300),
        heartbeat_sweep_period: Duration::from_millis(50),
        ..BrokerConfig::default()
    };
    let (listener, state) = server::build(config).await.expect("broker should bind");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server::serve(listener, state));
    addr
}

async fn connect(addr: std::net::SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.expect("connect to broker")
}

async fn send(stream: &mut TcpStream, message: &Message) {
    let bytes = TextCodec.serialize(message).unwrap();
    pubsub_protocol::send_record(stream, &bytes).await.unwrap();
}

async fn recv(stream: &mut TcpStream) -> Message {
    let bytes = timeout(Duration::from_secs(2), pubsub_protocol::recv_record(stream, pubsub_protocol::DEFAULT_MAX_FRAME_LEN))
        .await
        .expect("recv timed out")
        .unwrap();
    TextCodec.deserialize(&bytes).unwrap()
}

async fn try_recv(stream: &mut TcpStream, wait: Duration) -> Option<Message> {
    match timeout(wait, pubsub_protocol::recv_record(stream, pubsub_protocol::DEFAULT_MAX_FRAME_LEN)).await {
        Ok(Ok(bytes)) => Some(TextCodec.deserialize(&bytes).unwrap()),
        _ => None,
    }
}

#[tokio::test]
async fn best_effort_fan_out_reaches_every_subscriber_once() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_broker(dir.path().join("broker.db")).await;

    let mut sub1 = connect(addr).await;
    send(&mut sub1, &Message::register("T", Role::Subscriber)).await;
    let mut sub2 = connect(addr).await;
    send(&mut sub2, &Message::register("T", Role::Subscriber)).await;
    let mut publisher = connect(addr).await;
    send(&mut publisher, &Message::register("T", Role::Publisher)).await;

    // Give registration a moment to land before publishing.
    tokio::time::sleep(Duration::from_millis(50)).await;
    send(&mut publisher, &Message::publish_text("T", "hello", false)).await;

    let m1 = recv(&mut sub1).await;
    let m2 = recv(&mut sub2).await;
    assert_eq!(m1.payload, "hello");
    assert_eq!(m2.payload, "hello");

    // Neither subscriber should have anything else waiting (no ack expected from broker).
    assert!(try_recv(&mut sub1, Duration::from_millis(100)).await.is_none());
}

#[tokio::test]
async fn reliable_publish_is_acked_and_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_broker(dir.path().join("broker.db")).await;

    let mut sub = connect(addr).await;
    send(&mut sub, &Message::register("T", Role::Subscriber)).await;
    let mut publisher = connect(addr).await;
    send(&mut publisher, &Message::register("T", Role::Publisher)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    send(&mut publisher, &Message::publish_text("T", "m1", true)).await;
    let delivered = recv(&mut sub).await;
    assert_eq!(delivered.payload, "m1");
    assert!(delivered.message_id > 0);

    send(&mut sub, &Message::ack(delivered.message_id, "T")).await;

    // No retry should arrive within a couple of sweep periods.
    assert!(try_recv(&mut sub, Duration::from_millis(250)).await.is_none());
}

#[tokio::test]
async fn reliable_publish_is_resent_until_acked() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_broker(dir.path().join("broker.db")).await;

    let mut sub = connect(addr).await;
    send(&mut sub, &Message::register("T", Role::Subscriber)).await;
    let mut publisher = connect(addr).await;
    send(&mut publisher, &Message::register("T", Role::Publisher)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    send(&mut publisher, &Message::publish_text("T", "m1", true)).await;
    let first = recv(&mut sub).await;

    // Don't ack immediately: the retry timer (200ms interval) should resend.
    let resent = recv(&mut sub).await;
    assert_eq!(resent.message_id, first.message_id);
    assert_eq!(resent.payload, "m1");

    send(&mut sub, &Message::ack(resent.message_id, "T")).await;
    assert!(try_recv(&mut sub, Duration::from_millis(250)).await.is_none());
}

#[tokio::test]
async fn reliable_publish_evicts_subscriber_after_exhausting_retries() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_broker(dir.path().join("broker.db")).await;

    let mut sub = connect(addr).await;
    send(&mut sub, &Message::register("T", Role::Subscriber)).await;
    let mut publisher = connect(addr).await;
    send(&mut publisher, &Message::register("T", Role::Publisher)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    send(&mut publisher, &Message::publish_text("T", "m1", true)).await;

    // Never ack: consume redeliveries until the socket is closed by the broker.
    let closed = timeout(Duration::from_secs(3), async {
        loop {
            match pubsub_protocol::recv_record(&mut sub, pubsub_protocol::DEFAULT_MAX_FRAME_LEN).await {
                Ok(_) => continue,
                Err(_) => break,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "broker should have closed the subscriber socket");
}

#[tokio::test]
async fn silent_subscriber_is_evicted_by_heartbeat_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_broker(dir.path().join("broker.db")).await;

    let mut sub = connect(addr).await;
    send(&mut sub, &Message::register("T", Role::Subscriber)).await;
    let mut publisher = connect(addr).await;
    send(&mut publisher, &Message::register("T", Role::Publisher)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Never send a heartbeat; wait past the configured timeout.
    tokio::time::sleep(Duration::from_millis(400)).await;

    send(&mut publisher, &Message::publish_text("T", "lost", false)).await;
    assert!(try_recv(&mut sub, Duration::from_millis(200)).await.is_none());
}

#[tokio::test]
async fn message_ids_increase_across_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("broker.db");

    {
        let addr = start_broker(db_path.clone()).await;
        let mut sub = connect(addr).await;
        send(&mut sub, &Message::register("T", Role::Subscriber)).await;
        let mut publisher = connect(addr).await;
        send(&mut publisher, &Message::register("T", Role::Publisher)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        send(&mut publisher, &Message::publish_text("T", "first", true)).await;
        let delivered = recv(&mut sub).await;
        send(&mut sub, &Message::ack(delivered.message_id, "T")).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(delivered.message_id >= 1);
    }

    // A fresh broker instance against the same db must continue the counter.
    let recovered_next = pubsub_broker::persistence::PersistenceStore::next_message_id(&db_path).unwrap();
    assert!(recovered_next >= 2);

    let addr = start_broker(db_path.clone()).await;
    let mut sub = connect(addr).await;
    send(&mut sub, &Message::register("T", Role::Subscriber)).await;
    let mut publisher = connect(addr).await;
    send(&mut publisher, &Message::register("T", Role::Publisher)).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    send(&mut publisher, &Message::publish_text("T", "second", false)).await;
    let delivered = recv(&mut sub).await;
    assert_eq!(delivered.message_id, recovered_next);
}
