//! End-to-end scenarios against a live broker, driven through the real
//! (blocking) `Client` API. Covers the concrete scenarios in spec.md §8
//! from the client's side of the wire, complementing
//! `pubsub-broker`'s raw-socket version of the same scenarios.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use pubsub_broker::config::BrokerConfig;
use pubsub_broker::server;
use pubsub_client::{Client, ClientConfig};

async fn start_broker(db_path: std::path::PathBuf) -> std::net::SocketAddr {
    let config = BrokerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        db_path: db_path.to_string_lossy().into_owned(),
        retry_interval: Duration::from_millis(150),
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

fn client_config(addr: std::net::SocketAddr) -> ClientConfig {
    ClientConfig {
        broker_host: addr.ip().to_string(),
        broker_port: addr.port(),
        heartbeat_interval: Duration::from_millis(60),
        ..ClientConfig::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn best_effort_publish_reaches_a_subscriber_callback() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_broker(dir.path().join("broker.db")).await;
    let config = client_config(addr);

    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();

    tokio::task::spawn_blocking(move || {
        let client = Client::initialize(config).unwrap();
        client
            .create_subscriber("weather", move |text| {
                received_clone.lock().unwrap().push(text.to_string());
            })
            .unwrap();
        client.create_publisher("weather").unwrap();

        std::thread::sleep(Duration::from_millis(80));
        client.publish("weather", "sunny", false).unwrap();
        std::thread::sleep(Duration::from_millis(200));

        client.cleanup().unwrap();
    })
    .await
    .unwrap();

    assert_eq!(*received.lock().unwrap(), vec!["sunny".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reliable_publish_is_delivered_and_acked_automatically() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_broker(dir.path().join("broker.db")).await;
    let config = client_config(addr);

    let received: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();

    tokio::task::spawn_blocking(move || {
        let client = Client::initialize(config).unwrap();
        client
            .create_subscriber("orders", move |text| {
                received_clone.lock().unwrap().push(text.to_string());
            })
            .unwrap();
        client.create_publisher("orders").unwrap();

        std::thread::sleep(Duration::from_millis(80));
        client.publish("orders", "order-1", true).unwrap();
        // Give the subscriber thread time to receive, ack, and for the
        // retry sweep to confirm no redelivery was needed.
        std::thread::sleep(Duration::from_millis(400));

        client.cleanup().unwrap();
    })
    .await
    .unwrap();

    assert_eq!(*received.lock().unwrap(), vec!["order-1".to_string()]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn raw_publish_reaches_a_raw_subscriber_callback() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_broker(dir.path().join("broker.db")).await;
    let config = client_config(addr);

    let received: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
    let received_clone = received.clone();

    tokio::task::spawn_blocking(move || {
        let client = Client::initialize(config).unwrap();
        client
            .create_subscriber_raw("telemetry", move |bytes: &[u8]| {
                *received_clone.lock().unwrap() = bytes.to_vec();
            })
            .unwrap();
        client.create_publisher("telemetry").unwrap();

        std::thread::sleep(Duration::from_millis(80));
        client.publish_raw("telemetry", &[1, 2, 3, 4], false).unwrap();
        std::thread::sleep(Duration::from_millis(150));

        client.cleanup().unwrap();
    })
    .await
    .unwrap();

    assert_eq!(*received.lock().unwrap(), vec![1, 2, 3, 4]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn publish_on_unregistered_topic_is_a_state_error() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_broker(dir.path().join("broker.db")).await;
    let config = client_config(addr);

    tokio::task::spawn_blocking(move || {
        let client = Client::initialize(config).unwrap();
        let err = client.publish("nobody-publishes-this", "x", false).unwrap_err();
        assert!(matches!(err, pubsub_client::ClientError::State(_)));
        client.cleanup().unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn cleanup_stops_subscriber_threads() {
    let dir = tempfile::tempdir().unwrap();
    let addr = start_broker(dir.path().join("broker.db")).await;
    let config = client_config(addr);

    tokio::task::spawn_blocking(move || {
        let client = Client::initialize(config).unwrap();
        client.create_subscriber("t", |_text: &str| {}).unwrap();
        // cleanup() must join every subscriber thread before returning
        // (spec.md §8 invariant 6); if it hung, this test would time out.
        client.cleanup().unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn initialize_rejects_a_zero_port() {
    let config = ClientConfig {
        broker_port: 0,
        ..ClientConfig::default()
    };
    let err = Client::initialize(config).unwrap_err();
    assert!(matches!(err, pubsub_client::ClientError::State(_)));
}
