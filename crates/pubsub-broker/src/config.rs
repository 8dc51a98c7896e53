//! Broker configuration.
//!
//! spec.md treats the config file reader as an external collaborator that
//! yields `{broker_host, broker_port}`; this struct is the shape that
//! collaborator would populate, plus the tuning knobs spec.md §5 lists as
//! "defaults; implementations may expose them via configuration".

use std::time::Duration;

/// Which wire codec a deployment has selected. Broker and clients must
/// agree (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum CodecKind {
    Text,
    Binary,
}

impl Default for CodecKind {
    fn default() -> Self {
        CodecKind::Text
    }
}

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub codec: CodecKind,
    pub db_path: String,
    pub max_frame_len: u32,
    pub retry_interval: Duration,
    pub max_retries: u32,
    pub retry_sweep_period: Duration,
    pub heartbeat_timeout: Duration,
    pub heartbeat_sweep_period: Duration,
    /// Carried through from the original config format's `reliability`
    /// field (spec.md §6's `reliability_policy`). No policy beyond the
    /// per-publish `reliability` flag is implemented; this is an inert,
    /// forward-compatible slot.
    pub reliability_policy: Option<String>,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            codec: CodecKind::default(),
            db_path: "broker.db".to_string(),
            max_frame_len: pubsub_protocol::DEFAULT_MAX_FRAME_LEN,
            retry_interval: Duration::from_secs(2),
            max_retries: 3,
            retry_sweep_period: Duration::from_millis(100),
            heartbeat_timeout: Duration::from_secs(6),
            heartbeat_sweep_period: Duration::from_millis(1000),
            reliability_policy: None,
        }
    }
}
