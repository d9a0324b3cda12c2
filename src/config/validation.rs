//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, port valid)
//! - A half-configured archive location is not an error; provisioning
//!   reports it and the backend still starts
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AdapterConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::AdapterConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("server.port must not be 0")]
    ZeroPort,

    #[error("server.bind_host must not be empty")]
    EmptyBindHost,

    #[error("server.command must not be empty")]
    EmptyCommand,

    #[error("timeouts.{0} must be greater than 0")]
    ZeroTimeout(&'static str),

    #[error("timeouts.ready_wait_secs ({wait}) must not be shorter than timeouts.launch_secs ({launch})")]
    WaitShorterThanLaunch { wait: u64, launch: u64 },

    #[error("runtime.concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("native.candidates contains an empty location")]
    EmptyCandidate,
}

/// Check `config` for semantic errors.
pub fn validate_config(config: &AdapterConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.port == 0 {
        errors.push(ValidationError::ZeroPort);
    }
    if config.server.bind_host.trim().is_empty() {
        errors.push(ValidationError::EmptyBindHost);
    }
    if config.server.command.trim().is_empty() {
        errors.push(ValidationError::EmptyCommand);
    }

    let timeouts = &config.timeouts;
    for (name, value) in [
        ("probe_interval_ms", timeouts.probe_interval_ms),
        ("probe_connect_ms", timeouts.probe_connect_ms),
        ("launch_secs", timeouts.launch_secs),
        ("ready_wait_secs", timeouts.ready_wait_secs),
        ("upstream_secs", timeouts.upstream_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::ZeroTimeout(name));
        }
    }
    if timeouts.ready_wait_secs < timeouts.launch_secs {
        errors.push(ValidationError::WaitShorterThanLaunch {
            wait: timeouts.ready_wait_secs,
            launch: timeouts.launch_secs,
        });
    }

    if config.runtime.concurrency == 0 {
        errors.push(ValidationError::ZeroConcurrency);
    }
    if config.native.candidates.iter().any(|c| c.trim().is_empty()) {
        errors.push(ValidationError::EmptyCandidate);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
