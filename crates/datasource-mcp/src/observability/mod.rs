//! Logging setup

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::config::ObservabilityConfig;
use crate::{Error, Result};

/// Install the global subscriber: an `EnvFilter` built from the configured
/// level plus a stderr fmt layer, JSON when requested.
///
/// Fails on an unparsable filter or when a subscriber is already installed.
pub fn init_observability(config: &ObservabilityConfig) -> Result<()> {
    let filter = build_filter(&config.log_level)?;

    // stdout stays free for command output
    let fmt_layer = if config.json_logs {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install log subscriber: {e}")))
}

fn build_filter(directives: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(directives)
        .map_err(|e| Error::Config(format!("Invalid log filter '{directives}': {e}")))
}
