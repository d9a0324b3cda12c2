//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::config::schema::AdapterConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Names the optional TOML file layered under the environment.
pub const CONFIG_PATH_VAR: &str = "LT_ADAPTER_CONFIG";

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<AdapterConfig, ConfigError> {
    let config = read_file(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Resolve the effective configuration: defaults, then the file named by
/// `LT_ADAPTER_CONFIG`, then environment overrides, then validation.
pub fn load_from_env() -> Result<AdapterConfig, ConfigError> {
    resolve(|var| std::env::var(var).ok())
}

/// Same as [`load_from_env`] with an injectable variable lookup.
pub fn resolve<F>(lookup: F) -> Result<AdapterConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match non_empty(&lookup, CONFIG_PATH_VAR) {
        Some(path) => read_file(Path::new(&path))?,
        None => AdapterConfig::default(),
    };
    apply_env(&mut config, &lookup)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<AdapterConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables onto `config`.
pub fn apply_env<F>(config: &mut AdapterConfig, lookup: &F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(mount) = non_empty(lookup, "LT_EFS_MOUNT") {
        config.assets.mount_path = PathBuf::from(mount);
    }
    if let Some(dir) = non_empty(lookup, "LT_LOCAL_MODEL_DIR") {
        config.assets.local_dir = PathBuf::from(dir);
    }
    if let Some(bucket) = first_set(lookup, &["LT_S3_BUCKET", "MODEL_BUCKET"]) {
        config.assets.bucket = Some(bucket);
    }
    if let Some(key) = first_set(lookup, &["LT_S3_MODEL_KEY", "MODEL_KEY"]) {
        config.assets.key = Some(key);
    }
    if let Some(region) = non_empty(lookup, "LT_S3_REGION") {
        config.assets.region = Some(region);
    }
    if let Some(endpoint) = non_empty(lookup, "LT_S3_ENDPOINT") {
        config.assets.endpoint_url = Some(endpoint);
    }

    if let Some(host) = non_empty(lookup, "LT_LOCAL_BIND") {
        config.server.bind_host = host;
    }
    if let Some(port) = non_empty(lookup, "LT_LOCAL_PORT") {
        config.server.port = port.trim().parse().map_err(|e| ConfigError::Env {
            var: "LT_LOCAL_PORT",
            reason: format!("'{}': {}", port, e),
        })?;
    }
    if let Some(command_line) = non_empty(lookup, "LT_BACKEND_CMD") {
        let mut words = command_line.split_whitespace().map(str::to_string);
        if let Some(command) = words.next() {
            config.server.command = command;
            config.server.args = words.collect();
        }
    }

    if let Some(candidates) = non_empty(lookup, "LT_APP_CANDIDATES") {
        config.native.candidates = candidates
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
    }

    if let Some(api) = non_empty(lookup, "AWS_LAMBDA_RUNTIME_API") {
        config.runtime.api = Some(api);
    }
    if let Some(concurrency) = non_empty(lookup, "LT_RUNTIME_CONCURRENCY") {
        config.runtime.concurrency = concurrency.trim().parse().map_err(|e| ConfigError::Env {
            var: "LT_RUNTIME_CONCURRENCY",
            reason: format!("'{}': {}", concurrency, e),
        })?;
    }

    if let Some(format) = non_empty(lookup, "LT_LOG_FORMAT") {
        config.observability.log_format = format.parse().map_err(|reason| ConfigError::Env {
            var: "LT_LOG_FORMAT",
            reason,
        })?;
    }

    Ok(())
}

fn non_empty<F>(lookup: &F, var: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(var).filter(|v| !v.trim().is_empty())
}

fn first_set<F>(lookup: &F, vars: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    vars.iter().find_map(|var| non_empty(lookup, var))
}
