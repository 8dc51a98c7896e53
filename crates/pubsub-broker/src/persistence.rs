//! Durable persistence of reliable messages.
//!
//! Grounded in the original broker's `BrokerPersistence` class: a single
//! background writer thread drains a bounded queue so the routing hot
//! path never blocks on disk I/O, while `next_message_id()` is
//! synchronous because the caller needs it before accepting traffic.
//! `rusqlite` (bundled) replaces the original's raw SQLite C API calls;
//! `crossbeam_channel`'s bounded MPSC queue replaces its hand-rolled
//! mutex + condition variable, matching the concurrency shape exactly.

use crate::error::BrokerError;
use crossbeam::channel::{bounded, Sender};
use rusqlite::Connection;
use std::path::Path;
use std::thread::JoinHandle;

/// One reliable message as stored in the `messages` table (spec.md §5's
/// persistence schema).
#[derive(Debug, Clone)]
pub struct PersistedRecord {
    pub message_id: u32,
    pub topic: String,
    pub payload: Vec<u8>,
    pub reliability: bool,
}

enum WriterCommand {
    Persist(PersistedRecord),
    Shutdown,
}

/// Handle to the persistence store. Cloning is cheap — it's just a
/// channel sender plus a path used for the synchronous read path.
pub struct PersistenceStore {
    tx: Sender<WriterCommand>,
    writer: Option<JoinHandle<()>>,
}

impl PersistenceStore {
    /// Open (creating if absent) the store at `db_path`, run schema
    /// setup on the calling thread, and spawn the background writer.
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, BrokerError> {
        let db_path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&db_path)
            .map_err(|e| BrokerError::Persistence(format!("open {}: {e}", db_path.display())))?;
        prepare_schema(&conn)
            .map_err(|e| BrokerError::Persistence(format!("schema setup: {e}")))?;

        let (tx, rx) = bounded::<WriterCommand>(1024);
        let writer = std::thread::Builder::new()
            .name("persistence-writer".into())
            .spawn(move || {
                for cmd in rx {
                    match cmd {
                        WriterCommand::Persist(record) => {
                            if let Err(e) = insert_record(&conn, &record) {
                                tracing::warn!(
                                    message_id = record.message_id,
                                    error = %e,
                                    "failed to persist reliable message"
                                );
                            }
                        }
                        WriterCommand::Shutdown => break,
                    }
                }
            })
            .expect("failed to spawn persistence-writer thread");

        Ok(Self {
            tx,
            writer: Some(writer),
        })
    }

    /// Enqueue `record` for the background writer. Returns immediately;
    /// actual durability is asynchronous. A full queue is treated as a
    /// persistence failure — logged by the caller, routing continues
    /// (spec.md §4.3, §7).
    pub fn persist(&self, record: PersistedRecord) -> Result<(), BrokerError> {
        self.tx
            .try_send(WriterCommand::Persist(record))
            .map_err(|e| BrokerError::Persistence(format!("writer queue: {e}")))
    }

    /// Synchronous: `1 + max(messageId)`, or `1` if the table is empty.
    /// Callers recover the broker's `message_id` counter from this at
    /// startup before accepting any connections.
    pub fn next_message_id(db_path: impl AsRef<Path>) -> Result<u32, BrokerError> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .map_err(|e| BrokerError::Persistence(format!("open {}: {e}", db_path.display())))?;
        prepare_schema(&conn).map_err(|e| BrokerError::Persistence(format!("schema setup: {e}")))?;
        let max_id: Option<i64> = conn
            .query_row("SELECT MAX(messageId) FROM messages", [], |row| row.get(0))
            .map_err(|e| BrokerError::Persistence(format!("next_message_id query: {e}")))?;
        Ok(max_id.map(|id| id as u32 + 1).unwrap_or(1))
    }

    /// Signal the writer thread to drain remaining queued writes and
    /// exit, then join it. Called as the last step of broker shutdown
    /// (spec.md §4.5.6).
    pub fn shutdown(mut self) {
        let _ = self.tx.send(WriterCommand::Shutdown);
        if let Some(writer) = self.writer.take() {
            let _ = writer.join();
        }
    }
}

fn prepare_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS messages (
            messageId INTEGER PRIMARY KEY,
            topic TEXT NOT NULL,
            payload BLOB NOT NULL,
            reliability INTEGER NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn insert_record(conn: &Connection, record: &PersistedRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO messages (messageId, topic, payload, reliability) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            record.message_id,
            record.topic,
            record.payload,
            record.reliability as i64,
        ],
    )?;
    Ok(())
}
