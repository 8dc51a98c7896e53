//! Accept loop and shutdown orchestration (spec.md §4.5.1, §4.5.6).
//!
//! Grounded in the original broker's `main()`: bind, spawn the
//! heartbeat monitor and retry timer, accept in a loop spawning one
//! handler per connection, and on signal unwind everything in order.

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::config::BrokerConfig;
use crate::connection;
use crate::error::BrokerError;
use crate::heartbeat;
use crate::persistence::PersistenceStore;
use crate::retry;
use crate::routing::ConnId;
use crate::state::BrokerState;

/// Recover the message-id counter from persistence, open the store, and
/// bind the listening socket. Split out from [`serve`] so tests can bind
/// to an ephemeral port (`port: 0`) and read back the real address
/// before driving client connections against it.
pub async fn build(config: BrokerConfig) -> Result<(TcpListener, Arc<BrokerState>), BrokerError> {
    let first_message_id = PersistenceStore::next_message_id(&config.db_path)?;
    let persistence = PersistenceStore::open(&config.db_path)?;
    let state = BrokerState::new(config, persistence, first_message_id);

    let listener = TcpListener::bind((state.config.host.as_str(), state.config.port))
        .await
        .map_err(BrokerError::Io)?;
    tracing::info!(
        host = %state.config.host,
        port = listener.local_addr().map(|a| a.port()).unwrap_or(state.config.port),
        next_message_id = first_message_id,
        "broker listening"
    );
    Ok((listener, state))
}

pub async fn run(config: BrokerConfig) -> Result<(), BrokerError> {
    let (listener, state) = build(config).await?;
    serve(listener, state).await
}

/// Accept loop plus shutdown orchestration, given an already-bound
/// listener and an already-assembled [`BrokerState`].
pub async fn serve(listener: TcpListener, state: Arc<BrokerState>) -> Result<(), BrokerError> {
    let heartbeat_task = tokio::spawn(heartbeat::run(state.clone()));
    let retry_task = tokio::spawn(retry::run(state.clone()));

    let mut handler_tasks = Vec::new();
    let mut next_conn_id: ConnId = 1;

    loop {
        tokio::select! {
            _ = wait_for_shutdown_signal() => {
                tracing::info!("shutdown signal received");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        let _ = stream.set_nodelay(true);
                        let conn_id = next_conn_id;
                        next_conn_id += 1;
                        let (read_half, write_half) = stream.into_split();
                        let stop_rx = state.registry.insert(conn_id, write_half).await;
                        tracing::debug!(conn_id, %addr, "accepted connection");
                        let task_state = state.clone();
                        handler_tasks.push(tokio::spawn(connection::handle_connection(
                            conn_id, read_half, stop_rx, task_state,
                        )));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "accept error");
                    }
                }
            }
        }
    }

    drop(listener);

    // Signal every still-open connection before joining its handler —
    // a handler blocked in recv_record only returns once its socket is
    // actually closed.
    state.registry.close_all().await;
    for task in handler_tasks {
        let _ = task.await;
    }

    heartbeat_task.abort();
    retry_task.abort();
    let _ = heartbeat_task.await;
    let _ = retry_task.await;

    match Arc::try_unwrap(state) {
        Ok(state) => state.persistence.shutdown(),
        Err(_) => {
            tracing::warn!("broker state still referenced at shutdown, persistence store left open");
        }
    }

    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
