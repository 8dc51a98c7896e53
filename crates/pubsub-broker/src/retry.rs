//! Retry timer: a dedicated task that wakes every `retry_sweep_period`
//! (default 100 ms) and resends any pending reliable message whose age
//! exceeds `retry_interval`, evicting the subscriber entirely once
//! `max_retries` is exhausted (spec.md §4.5.4, §4.6).

use std::sync::Arc;

use crate::connection::evict_connection;
use crate::reliability::SweepAction;
use crate::state::BrokerState;

pub async fn run(state: Arc<BrokerState>) {
    let mut ticker = tokio::time::interval(state.config.retry_sweep_period);
    loop {
        ticker.tick().await;
        let actions = state
            .pending_ack
            .sweep(state.config.retry_interval, state.config.max_retries)
            .await;

        for action in actions {
            match action {
                SweepAction::Resend { conn_id, message } => {
                    let bytes = match state.codec.serialize(&message) {
                        Ok(b) => b,
                        Err(e) => {
                            tracing::warn!(conn_id, error = %e, "failed to serialize retry resend");
                            continue;
                        }
                    };
                    if state.registry.send_to(conn_id, &bytes).await.is_err() {
                        tracing::info!(conn_id, "evicting subscriber: resend failed");
                        evict_connection(conn_id, &state).await;
                    }
                }
                SweepAction::Dead { conn_id, message_id } => {
                    tracing::info!(conn_id, message_id, "evicting subscriber: max retries exhausted");
                    evict_connection(conn_id, &state).await;
                }
            }
        }
    }
}
