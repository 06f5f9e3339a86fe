//! Tracing setup for the daemon.

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the tracing subscriber.
///
/// `RUST_LOG` wins over the configured level, so operators can turn on
/// targeted debug output without editing config files.
pub fn init(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
