//! Logging setup for binaries and test harnesses embedding the sandbox.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "ANGULAR_CONTEXT_LOG";

/// Install a stderr subscriber. `ANGULAR_CONTEXT_LOG` overrides `default_level`.
///
/// Fails if a global subscriber is already set.
pub fn init_logging(default_level: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let stderr = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    Registry::default()
        .with(filter)
        .with(stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))
}
