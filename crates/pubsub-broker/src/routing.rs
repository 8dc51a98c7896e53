//! The routing table: the broker's record of which connections are
//! registered as publisher/subscriber on which topic.
//!
//! Implements spec.md §3's `ConnectedClient` / routing table and §4.5.3's
//! fan-out lookup. Modeled as a flat `Vec` filtered on dispatch, per
//! spec.md — insertion order is irrelevant except that it is the
//! deterministic delivery order for a single publisher→subscriber path
//! when no retries fire (spec.md §4.5.3).

use pubsub_protocol::Role;
use std::time::Instant;
use tokio::sync::Mutex;

/// Identifies a single accepted TCP connection for the lifetime of the
/// broker process. Stands in for the original implementation's raw
/// socket fd as the connection identity.
pub type ConnId = u64;

#[derive(Debug, Clone)]
pub struct ConnectedClient {
    pub conn_id: ConnId,
    pub role: Role,
    pub topic: String,
    pub last_heartbeat: Instant,
}

#[derive(Default)]
pub struct RoutingTable {
    clients: Mutex<Vec<ConnectedClient>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
        }
    }

    /// Insert `{conn_id, role, topic, last_heartbeat=now}`, ignoring exact
    /// duplicates (same conn_id + topic + role). Returns `true` if a new
    /// entry was inserted.
    pub async fn register(&self, conn_id: ConnId, role: Role, topic: String) -> bool {
        let mut clients = self.clients.lock().await;
        let duplicate = clients
            .iter()
            .any(|c| c.conn_id == conn_id && c.topic == topic && c.role == role);
        if duplicate {
            return false;
        }
        clients.push(ConnectedClient {
            conn_id,
            role,
            topic,
            last_heartbeat: Instant::now(),
        });
        true
    }

    /// Remove entries matching `(conn_id, topic)`, regardless of role.
    pub async fn unregister(&self, conn_id: ConnId, topic: &str) {
        let mut clients = self.clients.lock().await;
        clients.retain(|c| !(c.conn_id == conn_id && c.topic == topic));
    }

    /// Remove every entry for `conn_id` — used on socket close.
    pub async fn remove_connection(&self, conn_id: ConnId) {
        let mut clients = self.clients.lock().await;
        clients.retain(|c| c.conn_id != conn_id);
    }

    /// Subscriber connection ids for `topic`, in insertion order.
    pub async fn subscribers_for_topic(&self, topic: &str) -> Vec<ConnId> {
        let clients = self.clients.lock().await;
        clients
            .iter()
            .filter(|c| c.role == Role::Subscriber && c.topic == topic)
            .map(|c| c.conn_id)
            .collect()
    }

    /// Update `last_heartbeat` for every entry belonging to `conn_id`.
    pub async fn touch_heartbeat(&self, conn_id: ConnId) {
        let mut clients = self.clients.lock().await;
        let now = Instant::now();
        for c in clients.iter_mut().filter(|c| c.conn_id == conn_id) {
            c.last_heartbeat = now;
        }
    }

    /// Remove and return the conn_ids of every subscriber whose
    /// `last_heartbeat` is older than `timeout`. Publishers are never
    /// subject to heartbeat expiry (spec.md §4.5.5).
    pub async fn evict_stale_subscribers(&self, timeout: std::time::Duration) -> Vec<ConnId> {
        let mut clients = self.clients.lock().await;
        let now = Instant::now();
        let mut evicted = Vec::new();
        clients.retain(|c| {
            let stale = c.role == Role::Subscriber && now.duration_since(c.last_heartbeat) > timeout;
            if stale {
                evicted.push(c.conn_id);
            }
            !stale
        });
        evicted.sort_unstable();
        evicted.dedup();
        evicted
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.clients.lock().await.len()
    }
}
