//! Tracing subscriber setup for processes embedding the keeper.

use anyhow::{anyhow, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install a global subscriber. `RUST_LOG` overrides `level`.
///
/// Fails if another global subscriber is already installed.
pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let log_level = level.parse().unwrap_or(tracing::Level::INFO);
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("smartnode_keeper={},smartnode_types={}", log_level, log_level).into()
        })
    };

    let result = if json {
        tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer())
            .try_init()
    };

    result.map_err(|e| anyhow!("failed to install tracing subscriber: {}", e))
}
