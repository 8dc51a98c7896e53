//! Per-connection handler task (spec.md §4.5.2) and the fan-out routine
//! it calls into on `publish` (spec.md §4.5.3).
//!
//! Grounded in the original broker's `handleClient()`: a loop over
//! `recv_record` dispatching on `type`, tearing the connection fully
//! down on EOF or a read error.

use std::sync::Arc;

use pubsub_protocol::{Message, MessageType, Role};
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::watch;

use crate::persistence::PersistedRecord;
use crate::routing::ConnId;
use crate::state::BrokerState;

pub async fn handle_connection(
    conn_id: ConnId,
    mut read_half: OwnedReadHalf,
    mut stop_rx: watch::Receiver<bool>,
    state: Arc<BrokerState>,
) {
    loop {
        tokio::select! {
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
            record = pubsub_protocol::recv_record(&mut read_half, state.config.max_frame_len) => {
                match record {
                    Ok(bytes) if bytes.is_empty() => continue, // keepalive, no-op
                    Ok(bytes) => {
                        if let Err(e) = dispatch(conn_id, &bytes, &state).await {
                            tracing::warn!(conn_id, error = %e, "connection handler error");
                        }
                    }
                    Err(_) => break,
                }
            }
        }
    }

    teardown(conn_id, &state).await;
}

async fn dispatch(conn_id: ConnId, bytes: &[u8], state: &Arc<BrokerState>) -> Result<(), crate::error::BrokerError> {
    let message = state.codec.deserialize(bytes)?;

    match message.message_type {
        MessageType::Register => {
            let Some(role) = Role::parse(&message.payload) else {
                tracing::warn!(conn_id, role = %message.payload, "register with unknown role, ignoring");
                return Ok(());
            };
            if message.topic.is_empty() {
                return Err(crate::error::BrokerError::State(
                    "register with empty topic".into(),
                ));
            }
            state.routing.register(conn_id, role, message.topic).await;
        }
        MessageType::Unregister => {
            state.routing.unregister(conn_id, &message.topic).await;
        }
        MessageType::Publish => {
            handle_publish(conn_id, message, state).await;
        }
        MessageType::Ack => {
            state.pending_ack.ack(conn_id, message.message_id).await;
        }
        MessageType::Heartbeat => {
            state.routing.touch_heartbeat(conn_id).await;
        }
    }
    Ok(())
}

async fn handle_publish(_conn_id: ConnId, mut message: Message, state: &Arc<BrokerState>) {
    message.message_id = state.next_broker_id();

    if message.reliability {
        let payload = if message.payload_raw.is_empty() {
            message.payload.clone().into_bytes()
        } else {
            message.payload_raw.clone()
        };
        if let Err(e) = state.persistence.persist(PersistedRecord {
            message_id: message.message_id,
            topic: message.topic.clone(),
            payload,
            reliability: true,
        }) {
            tracing::warn!(message_id = message.message_id, error = %e, "failed to enqueue persistence");
        }
    }

    route_to_subscribers(&message, state).await;
}

/// spec.md §4.5.3: copy the subscriber list under the routing lock,
/// release it, serialize once, then send to each target without
/// holding any lock across the blocking write.
async fn route_to_subscribers(message: &Message, state: &Arc<BrokerState>) {
    let targets = state.routing.subscribers_for_topic(&message.topic).await;
    if targets.is_empty() {
        return;
    }

    let bytes = match state.codec.serialize(message) {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(topic = %message.topic, error = %e, "failed to serialize message for fan-out");
            return;
        }
    };

    for target in targets {
        if state.registry.send_to(target, &bytes).await.is_err() {
            evict_connection(target, state).await;
            continue;
        }
        if message.reliability {
            state.pending_ack.track(target, message.clone()).await;
        }
    }
}

async fn teardown(conn_id: ConnId, state: &Arc<BrokerState>) {
    state.routing.remove_connection(conn_id).await;
    state.pending_ack.remove_connection(conn_id).await;
    state.registry.remove(conn_id).await;
}

/// Used by the fan-out path and the retry sweep when a send fails or a
/// subscriber exhausts its retries: full eviction per spec.md §4.6's
/// `INFLIGHT → DEAD` transition.
pub async fn evict_connection(conn_id: ConnId, state: &Arc<BrokerState>) {
    state.registry.close(conn_id).await;
    state.routing.remove_connection(conn_id).await;
    state.pending_ack.remove_connection(conn_id).await;
}
