//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global subscriber once per process
//! - Pick the output format (JSON for the log service, pretty locally)
//!
//! # Design Decisions
//! - `RUST_LOG` wins over the configured level
//! - JSON output has ANSI colours off; the log service stores raw bytes
//! - A second initialization is a no-op, not an error

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{LogFormat, ObservabilityConfig};

/// Filter from `RUST_LOG`, else `level` for this crate and `warn` elsewhere.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(format!("warn,lt_lambda_adapter={level},adapter_cli={level}"))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Install the global subscriber. Returns `false` if one was already set.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let registry = tracing_subscriber::registry().with(env_filter(&config.log_level));
    let result = match config.log_format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_ansi(false)
                    .with_current_span(false)
                    .with_target(true),
            )
            .try_init(),
        LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
    };
    result.is_ok()
}
