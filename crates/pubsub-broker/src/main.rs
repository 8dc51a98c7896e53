use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use pubsub_broker::{BrokerConfig, CodecKind};

/// Central pub/sub broker: topic routing, reliability tracking,
/// heartbeat expiry, and durable persistence of reliable messages.
#[derive(Parser, Debug, Clone)]
#[command(version, about)]
struct Args {
    /// Address to bind the broker's listening socket to.
    #[arg(long, default_value = "127.0.0.1", help_heading = "Network")]
    host: String,

    /// Port to bind the broker's listening socket to.
    #[arg(long, default_value_t = 5000, help_heading = "Network")]
    port: u16,

    /// Wire codec both broker and clients must agree on.
    #[arg(long, value_enum, default_value_t = CodecKind::Text, help_heading = "Network")]
    codec: CodecKind,

    /// Path to the embedded persistence store file.
    #[arg(long, default_value = "broker.db", help_heading = "Persistence")]
    db_path: String,

    /// Maximum accepted frame length, in bytes.
    #[arg(long, default_value_t = pubsub_protocol::DEFAULT_MAX_FRAME_LEN, help_heading = "Network")]
    max_frame_len: u32,

    /// Reliable-message retry interval, in milliseconds.
    #[arg(long, default_value_t = 2000, help_heading = "Reliability")]
    retry_interval_ms: u64,

    /// Reliable-message retries before a subscriber is evicted.
    #[arg(long, default_value_t = 3, help_heading = "Reliability")]
    max_retries: u32,

    /// How often the retry timer sweeps pending acknowledgements, in milliseconds.
    #[arg(long, default_value_t = 100, help_heading = "Reliability")]
    retry_sweep_period_ms: u64,

    /// Subscriber heartbeat timeout, in milliseconds.
    #[arg(long, default_value_t = 6000, help_heading = "Reliability")]
    heartbeat_timeout_ms: u64,

    /// How often the heartbeat monitor sweeps for stale subscribers, in milliseconds.
    #[arg(long, default_value_t = 1000, help_heading = "Reliability")]
    heartbeat_sweep_period_ms: u64,

    /// Opaque reliability policy name, passed through but not interpreted.
    #[arg(long, help_heading = "Reliability")]
    reliability_policy: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl From<Args> for BrokerConfig {
    fn from(args: Args) -> Self {
        BrokerConfig {
            host: args.host,
            port: args.port,
            codec: args.codec,
            db_path: args.db_path,
            max_frame_len: args.max_frame_len,
            retry_interval: Duration::from_millis(args.retry_interval_ms),
            max_retries: args.max_retries,
            retry_sweep_period: Duration::from_millis(args.retry_sweep_period_ms),
            heartbeat_timeout: Duration::from_millis(args.heartbeat_timeout_ms),
            heartbeat_sweep_period: Duration::from_millis(args.heartbeat_sweep_period_ms),
            reliability_policy: args.reliability_policy,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    pubsub_broker::logging::init(args.verbose);

    let config: BrokerConfig = args.into();
    match pubsub_broker::server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "broker exited with error");
            ExitCode::FAILURE
        }
    }
}
