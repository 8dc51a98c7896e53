//! Shared broker state, assembled once in `main` and handed to every
//! accept/handler/retry/heartbeat task as an `Arc`.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use pubsub_protocol::{BinaryCodec, Codec, TextCodec};

use crate::config::{BrokerConfig, CodecKind};
use crate::persistence::PersistenceStore;
use crate::reliability::PendingAckTable;
use crate::registry::ConnectionRegistry;
use crate::routing::RoutingTable;

pub struct BrokerState {
    pub config: BrokerConfig,
    pub codec: Box<dyn Codec>,
    pub routing: RoutingTable,
    pub pending_ack: PendingAckTable,
    pub registry: ConnectionRegistry,
    pub persistence: PersistenceStore,
    next_message_id: AtomicU32,
}

impl BrokerState {
    pub fn new(config: BrokerConfig, persistence: PersistenceStore, first_message_id: u32) -> Arc<Self> {
        let codec: Box<dyn Codec> = match config.codec {
            CodecKind::Text => Box::new(TextCodec),
            CodecKind::Binary => Box::new(BinaryCodec),
        };
        Arc::new(Self {
            config,
            codec,
            routing: RoutingTable::new(),
            pending_ack: PendingAckTable::new(),
            registry: ConnectionRegistry::new(),
            persistence,
            next_message_id: AtomicU32::new(first_message_id),
        })
    }

    /// Monotonic counter seeded from persistence at startup (spec.md
    /// §4.5.2's `next_broker_id()`). Wraps at `u32::MAX`, matching the
    /// original broker's unbounded-but-unaddressed counter growth.
    pub fn next_broker_id(&self) -> u32 {
        self.next_message_id.fetch_add(1, Ordering::SeqCst)
    }
}
