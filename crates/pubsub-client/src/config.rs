//! Client configuration.
//!
//! spec.md §4.4 treats `initialize(broker_host, broker_port)` as the
//! whole of the client's configuration surface; this struct is that
//! shape plus the codec selection and heartbeat cadence spec.md §5
//! lists as "defaults; implementations may expose them via
//! configuration". It mirrors `pubsub_broker::BrokerConfig`'s role on
//! the broker side — the external config-file reader spec.md scopes
//! out would populate one of these.

use std::time::Duration;

/// Which wire codec this client has selected. Broker and clients must
/// agree (spec.md §4.2). Mirrors `pubsub_broker::CodecKind`; kept as a
/// separate type so embedding `pubsub-client` in an application never
/// pulls in the broker crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecKind {
    #[default]
    Text,
    Binary,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub broker_host: String,
    pub broker_port: u16,
    pub codec: CodecKind,
    pub max_frame_len: u32,
    /// How often a subscriber's receive loop emits a `heartbeat` record,
    /// per spec.md §4.4 / §5 (default 1000 ms).
    pub heartbeat_interval: Duration,
    /// Carried through from the original config format's `reliability`
    /// field (spec.md §6's `reliability_policy`), same as the broker's
    /// equivalent slot. Inert — no policy is implemented beyond the
    /// per-publish `reliability` flag.
    pub reliability_policy: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            broker_host: "127.0.0.1".to_string(),
            broker_port: 5000,
            codec: CodecKind::default(),
            max_frame_len: pubsub_protocol::DEFAULT_MAX_FRAME_LEN,
            heartbeat_interval: Duration::from_millis(1000),
            reliability_policy: None,
        }
    }
}

impl ClientConfig {
    /// spec.md §4.4: `initialize` errors if host is empty or port is 0.
    pub fn validate(&self) -> Result<(), crate::error::ClientError> {
        if self.broker_host.is_empty() {
            return Err(crate::error::ClientError::State(
                "broker_host must not be empty".into(),
            ));
        }
        if self.broker_port == 0 {
            return Err(crate::error::ClientError::State(
                "broker_port must not be 0".into(),
            ));
        }
        Ok(())
    }
}
