//! Heartbeat monitor: a dedicated task that wakes every
//! `heartbeat_sweep_period` (default 1000 ms) and evicts subscribers
//! whose `last_heartbeat` has gone stale (spec.md §4.5.5). Publishers
//! are never subject to this sweep.

use std::sync::Arc;

use crate::connection::evict_connection;
use crate::state::BrokerState;

pub async fn run(state: Arc<BrokerState>) {
    let mut ticker = tokio::time::interval(state.config.heartbeat_sweep_period);
    loop {
        ticker.tick().await;
        let stale = state
            .routing
            .evict_stale_subscribers(state.config.heartbeat_timeout)
            .await;
        for conn_id in stale {
            tracing::info!(conn_id, "evicting subscriber: heartbeat timeout");
            evict_connection(conn_id, &state).await;
        }
    }
}
