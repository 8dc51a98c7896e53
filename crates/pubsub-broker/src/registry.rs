//! The connection registry: the broker's only way to write to, or force
//! closed, a connection it didn't accept on the current task.
//!
//! The per-connection handler task owns the read half and drives
//! `recv_record` directly; fan-out, retry, and heartbeat eviction reach
//! a connection only through this registry, never by sharing the read
//! half. A `watch` channel tells the handler task to stop without
//! needing a separate cancellation crate.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{watch, Mutex};

use crate::routing::ConnId;

pub struct ConnectionHandle {
    write_half: Mutex<OwnedWriteHalf>,
    stop_tx: watch::Sender<bool>,
}

impl ConnectionHandle {
    /// Write a single length-prefixed record. Concurrent writers to the
    /// same connection (fan-out from multiple publishers) serialize on
    /// `write_half`'s lock; the lock is never held across anything but
    /// this one write.
    pub async fn send(&self, bytes: &[u8]) -> Result<(), pubsub_protocol::FrameError> {
        let mut w = self.write_half.lock().await;
        pubsub_protocol::send_record(&mut *w, bytes).await
    }

    async fn shutdown(&self) {
        let mut w = self.write_half.lock().await;
        let _ = w.shutdown().await;
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    conns: Mutex<HashMap<ConnId, Arc<ConnectionHandle>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            conns: Mutex::new(HashMap::new()),
        }
    }

    /// Register a freshly accepted connection's write half. Returns the
    /// stop-watch receiver the handler task should select on alongside
    /// its `recv_record` loop.
    pub async fn insert(&self, conn_id: ConnId, write_half: OwnedWriteHalf) -> watch::Receiver<bool> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = Arc::new(ConnectionHandle {
            write_half: Mutex::new(write_half),
            stop_tx,
        });
        self.conns.lock().await.insert(conn_id, handle);
        stop_rx
    }

    async fn get(&self, conn_id: ConnId) -> Option<Arc<ConnectionHandle>> {
        self.conns.lock().await.get(&conn_id).cloned()
    }

    /// Send a framed record to `conn_id`, if it is still registered.
    pub async fn send_to(&self, conn_id: ConnId, bytes: &[u8]) -> Result<(), pubsub_protocol::FrameError> {
        match self.get(conn_id).await {
            Some(handle) => handle.send(bytes).await,
            None => Err(pubsub_protocol::FrameError::Eof),
        }
    }

    /// Tell the handler task for `conn_id` to stop and shut down its
    /// write half, then drop the registry's reference to it. Does not
    /// wait for the handler task to actually exit — callers that need
    /// that should track handler `JoinHandle`s separately (the accept
    /// loop's join list, per spec.md §4.5.1).
    pub async fn close(&self, conn_id: ConnId) {
        let handle = self.conns.lock().await.remove(&conn_id);
        if let Some(handle) = handle {
            let _ = handle.stop_tx.send(true);
            handle.shutdown().await;
        }
    }

    /// Remove a connection without signaling it — used when the
    /// handler task itself observed EOF/error and is already exiting.
    pub async fn remove(&self, conn_id: ConnId) {
        self.conns.lock().await.remove(&conn_id);
    }

    /// Close every remaining connection. Called once, at shutdown.
    pub async fn close_all(&self) {
        let ids: Vec<ConnId> = self.conns.lock().await.keys().copied().collect();
        for conn_id in ids {
            self.close(conn_id).await;
        }
    }
}
