//! Tracing initialization.
//!
//! A long-running server has no interactive user to colorize output
//! for, so this drops the teacher's `ColorizedFormatter` in favor of a
//! plain structured line per event; the verbosity-to-level mapping
//! (`-v`/`-vv`) and `RUST_LOG` override are carried over unchanged.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

pub fn init(verbosity: u8) {
    let default_level = match verbosity {
        0 => LevelFilter::INFO,
        1 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    };

    let filter = EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
