//! Diagnostic logging setup
//!
//! Logs go to stderr so rendered reports on stdout stay machine-readable.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `RUST_LOG` wins over `log_level` when set.
pub fn init(log_level: &str) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level/filter '{}'", log_level))?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {}", e))
}
