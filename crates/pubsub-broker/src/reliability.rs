//! The pending-ack table: per-subscriber, per-message delivery state for
//! reliable messages (spec.md §4.6's UNSENT → INFLIGHT → ACKED|RETRYING →
//! DEAD state machine). Best-effort messages never enter this table.
//!
//! Locking order relative to `RoutingTable` is fixed by spec.md §4.5.3:
//! the routing lock is always acquired and released before this table's
//! lock is touched, and neither lock is held across a socket write.

use pubsub_protocol::Message;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::routing::ConnId;

#[derive(Debug, Clone)]
pub struct PendingAck {
    pub message: Message,
    pub sent_at: Instant,
    pub retry_count: u32,
}

/// What the retry sweep decided to do with one in-flight message.
#[derive(Debug, Clone)]
pub enum SweepAction {
    /// Still under `max_retries`: resend `message` to `conn_id`.
    Resend { conn_id: ConnId, message: Message },
    /// `max_retries` exhausted: drop the message, no further resend.
    Dead { conn_id: ConnId, message_id: u32 },
}

#[derive(Default)]
pub struct PendingAckTable {
    by_conn: Mutex<HashMap<ConnId, HashMap<u32, PendingAck>>>,
}

impl PendingAckTable {
    pub fn new() -> Self {
        Self {
            by_conn: Mutex::new(HashMap::new()),
        }
    }

    /// Record a just-sent reliable message as INFLIGHT.
    pub async fn track(&self, conn_id: ConnId, message: Message) {
        let mut by_conn = self.by_conn.lock().await;
        by_conn.entry(conn_id).or_default().insert(
            message.message_id,
            PendingAck {
                message,
                sent_at: Instant::now(),
                retry_count: 0,
            },
        );
    }

    /// ACKED: remove the pending entry. Returns `false` if there was
    /// nothing pending under `(conn_id, message_id)` — an ack for an
    /// unknown or already-acked message is ignored, not an error
    /// (spec.md §4.6).
    pub async fn ack(&self, conn_id: ConnId, message_id: u32) -> bool {
        let mut by_conn = self.by_conn.lock().await;
        let Some(per_conn) = by_conn.get_mut(&conn_id) else {
            return false;
        };
        let removed = per_conn.remove(&message_id).is_some();
        if per_conn.is_empty() {
            by_conn.remove(&conn_id);
        }
        removed
    }

    /// Drop every pending entry for a connection that has gone away,
    /// whether by clean unregister or by heartbeat eviction.
    pub async fn remove_connection(&self, conn_id: ConnId) {
        self.by_conn.lock().await.remove(&conn_id);
    }

    /// RETRYING sweep: for every entry whose `sent_at` is older than
    /// `retry_interval`, either bump `retry_count` and hand back a
    /// `Resend`, or — once `retry_count >= max_retries` — drop it and
    /// hand back a `Dead`. Called on the 100ms default sweep period
    /// (spec.md §5).
    pub async fn sweep(&self, retry_interval: Duration, max_retries: u32) -> Vec<SweepAction> {
        let mut by_conn = self.by_conn.lock().await;
        let now = Instant::now();
        let mut actions = Vec::new();

        for (conn_id, per_conn) in by_conn.iter_mut() {
            let mut dead = Vec::new();
            for (message_id, pending) in per_conn.iter_mut() {
                if now.duration_since(pending.sent_at) < retry_interval {
                    continue;
                }
                if pending.retry_count >= max_retries {
                    dead.push(*message_id);
                    actions.push(SweepAction::Dead {
                        conn_id: *conn_id,
                        message_id: *message_id,
                    });
                } else {
                    pending.retry_count += 1;
                    pending.sent_at = now;
                    actions.push(SweepAction::Resend {
                        conn_id: *conn_id,
                        message: pending.message.clone(),
                    });
                }
            }
            for message_id in dead {
                per_conn.remove(&message_id);
            }
        }
        by_conn.retain(|_, per_conn| !per_conn.is_empty());
        actions
    }

    #[cfg(test)]
    pub async fn pending_count(&self, conn_id: ConnId) -> usize {
        self.by_conn
            .lock()
            .await
            .get(&conn_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reliable(message_id: u32) -> Message {
        let mut m = Message::publish_text("t", "payload", true);
        m.message_id = message_id;
        m
    }

    #[tokio::test]
    async fn ack_removes_the_tracked_entry() {
        let table = PendingAckTable::new();
        table.track(1, reliable(7)).await;
        assert!(table.ack(1, 7).await);
        assert_eq!(table.pending_count(1).await, 0);
    }

    #[tokio::test]
    async fn ack_for_unknown_message_is_ignored() {
        let table = PendingAckTable::new();
        assert!(!table.ack(1, 99).await);
    }

    #[tokio::test]
    async fn sweep_resends_until_max_retries_then_marks_dead() {
        let table = PendingAckTable::new();
        table.track(1, reliable(7)).await;
        let interval = Duration::from_millis(1);

        for expected_retry in 1..=3u32 {
            tokio::time::sleep(Duration::from_millis(2)).await;
            let actions = table.sweep(interval, 3).await;
            match &actions[..] {
                [SweepAction::Resend { conn_id, message }] => {
                    assert_eq!(*conn_id, 1);
                    assert_eq!(message.message_id, 7);
                    let _ = expected_retry;
                }
                other => panic!("unexpected sweep result: {other:?}"),
            }
        }

        tokio::time::sleep(Duration::from_millis(2)).await;
        let actions = table.sweep(interval, 3).await;
        assert!(matches!(
            &actions[..],
            [SweepAction::Dead { conn_id: 1, message_id: 7 }]
        ));
        assert_eq!(table.pending_count(1).await, 0);
    }

    #[tokio::test]
    async fn remove_connection_drops_all_its_pending_messages() {
        let table = PendingAckTable::new();
        table.track(1, reliable(7)).await;
        table.track(1, reliable(8)).await;
        table.remove_connection(1).await;
        assert_eq!(table.pending_count(1).await, 0);
    }
}
