//! Logging initialisation.
//!
//! `SIGTRADER_ENV=production` (or `prod`) selects JSON lines for log
//! aggregation; anything else gets human-readable coloured output. The
//! filter comes from `RUST_LOG` and defaults to `info`. Logs go to stderr so
//! command output on stdout stays clean.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

pub const ENV_VAR: &str = "SIGTRADER_ENV";

pub fn is_production(env: &str) -> bool {
    matches!(env.trim().to_lowercase().as_str(), "production" | "prod")
}

/// Installs the global subscriber. A second call is a no-op.
pub fn init_logging() {
    let env = std::env::var(ENV_VAR).unwrap_or_default();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let result = if is_production(&env) {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "logging already initialised");
    }
}
