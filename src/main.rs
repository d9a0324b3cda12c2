//! LibreTranslate Lambda adapter (bootstrap binary)
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌────────────────────────────────────────────────────┐
//!                        │                  LAMBDA ADAPTER                     │
//!     Runtime API        │  ┌─────────┐    ┌─────────┐    ┌──────────────┐    │
//!     ───────────────────┼─▶│ runtime │───▶│ adapter │───▶│ http request │    │
//!     invocation/next    │  │ pollers │    │         │    │  translator  │    │
//!                        │  └─────────┘    └────┬────┘    └──────┬───────┘    │
//!                        │                      │                │            │
//!                        │        native app? ──┘                ▼            │
//!                        │                               ┌──────────────┐     │
//!                        │  ┌─────────┐  prepare         │  supervisor  │     │
//!                        │  │ assets  │◀─────────────────│ (once/inst.) │     │
//!                        │  │ S3→/tmp │                  └──────┬───────┘     │
//!                        │  └─────────┘                         ▼             │
//!     ◀──────────────────┼── response ◀── translator ◀── upstream ◀──────────┼──── LibreTranslate
//!     invocation/{id}/…  │                                                    │     127.0.0.1:5000
//!                        └────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use lt_lambda_adapter::backend::AppRegistry;
use lt_lambda_adapter::config::{load_from_env, ObservabilityConfig};
use lt_lambda_adapter::lifecycle::{build_adapter, spawn_signal_listener, Shutdown};
use lt_lambda_adapter::observability::init_logging;
use lt_lambda_adapter::runtime::{self, ErrorReport, RuntimeClient};

const RUNTIME_API_VAR: &str = "AWS_LAMBDA_RUNTIME_API";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match load_from_env() {
        Ok(config) => config,
        Err(e) => {
            init_logging(&ObservabilityConfig::default());
            tracing::error!(error = %e, "Configuration rejected");
            if let Ok(api) = std::env::var(RUNTIME_API_VAR) {
                let report = ErrorReport::new("ConfigError", e.to_string());
                if let Err(post) = RuntimeClient::new(&api).post_init_error(&report).await {
                    tracing::error!(error = %post, "Failed to report init error");
                }
            }
            return Err(e.into());
        }
    };
    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        server = %format!("{}:{}", config.server.bind_host, config.server.port),
        mount = %config.assets.mount_path.display(),
        archive = ?config.assets.archive_location().map(|l| l.to_string()),
        concurrency = config.runtime.concurrency,
        "lt-lambda-adapter starting"
    );

    let api = match config.runtime.api.clone() {
        Some(api) => api,
        None => {
            tracing::error!(var = RUNTIME_API_VAR, "Runtime API address not configured");
            return Err(format!("{} is not set", RUNTIME_API_VAR).into());
        }
    };

    let adapter = Arc::new(build_adapter(&config, &AppRegistry::new()).await);
    let shutdown = Shutdown::new();
    spawn_signal_listener(shutdown.clone());

    runtime::run(
        Arc::new(RuntimeClient::new(&api)),
        adapter.clone(),
        config.runtime.concurrency,
        shutdown,
    )
    .await;

    adapter.shutdown();
    tracing::info!("Shutdown complete");
    Ok(())
}
