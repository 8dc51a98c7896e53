pub mod config;
pub mod connection;
pub mod error;
pub mod heartbeat;
pub mod logging;
pub mod persistence;
pub mod registry;
pub mod reliability;
pub mod retry;
pub mod routing;
pub mod server;
pub mod state;

pub use config::{BrokerConfig, CodecKind};
pub use error::BrokerError;
pub use state::BrokerState;
