//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the adapter.
//! All types derive Serde traits so a TOML file can override any subset of
//! the defaults; environment variables are layered on top by `loader.rs`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Candidate `module:attribute` locations probed for an in-process app,
/// highest priority first.
pub const DEFAULT_APP_CANDIDATES: &[&str] = &[
    "main:app",
    "app:app",
    "server:app",
    "libretranslate:app",
    "translate:app",
    "api:app",
    "app.main:app",
    "src.app:app",
];

/// Root configuration for the adapter.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AdapterConfig {
    /// Supervised backend process (loopback address, launch command).
    pub server: ServerConfig,

    /// Probe, launch, wait and upstream deadlines.
    pub timeouts: TimeoutConfig,

    /// Model bundle provisioning.
    pub assets: AssetConfig,

    /// In-process application resolution.
    pub native: NativeConfig,

    /// Invocation delivery loop.
    pub runtime: RuntimeConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Supervised backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    /// Loopback host the backend must bind.
    pub bind_host: String,

    /// Loopback port the backend must bind.
    pub port: u16,

    /// Executable started when no in-process app is available.
    pub command: String,

    /// Arguments; `{host}` and `{port}` are substituted at launch.
    pub args: Vec<String>,

    /// Working directory for the backend process.
    pub working_dir: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            port: 5000,
            command: "libretranslate".to_string(),
            args: vec![
                "--host".to_string(),
                "{host}".to_string(),
                "--port".to_string(),
                "{port}".to_string(),
            ],
            working_dir: None,
        }
    }
}

/// Timeout configuration for bootstrap and proxying.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Delay between readiness probes in milliseconds.
    pub probe_interval_ms: u64,

    /// Per-attempt TCP connect timeout in milliseconds.
    pub probe_connect_ms: u64,

    /// Deadline for the backend to start accepting connections, in seconds.
    pub launch_secs: u64,

    /// Caller-visible bound on the whole ensure-ready sequence, in seconds.
    pub ready_wait_secs: u64,

    /// Upstream request timeout in seconds.
    pub upstream_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            probe_interval_ms: 250,
            probe_connect_ms: 1000,
            launch_secs: 60,
            ready_wait_secs: 70,
            upstream_secs: 300,
        }
    }
}

impl TimeoutConfig {
    pub fn probe_interval(&self) -> Duration {
        Duration::from_millis(self.probe_interval_ms)
    }

    pub fn probe_connect(&self) -> Duration {
        Duration::from_millis(self.probe_connect_ms)
    }

    pub fn launch(&self) -> Duration {
        Duration::from_secs(self.launch_secs)
    }

    pub fn ready_wait(&self) -> Duration {
        Duration::from_secs(self.ready_wait_secs)
    }

    pub fn upstream(&self) -> Duration {
        Duration::from_secs(self.upstream_secs)
    }
}

/// Model bundle locations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AssetConfig {
    /// Shared network mount; also the conventional path downstream code reads.
    pub mount_path: PathBuf,

    /// Ephemeral extraction target used when the shared mount is unusable.
    pub local_dir: PathBuf,

    /// Object-storage bucket holding the model archive.
    pub bucket: Option<String>,

    /// Object key of the gzip-compressed tar archive.
    pub key: Option<String>,

    /// Region override for the object-storage client.
    pub region: Option<String>,

    /// Custom S3-compatible endpoint (MinIO, LocalStack).
    pub endpoint_url: Option<String>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            mount_path: PathBuf::from("/mnt/models"),
            local_dir: PathBuf::from("/tmp/models"),
            bucket: None,
            key: None,
            region: None,
            endpoint_url: None,
        }
    }
}

impl AssetConfig {
    /// Bucket and key, when both are configured.
    pub fn archive_location(&self) -> Option<ArchiveLocation> {
        match (&self.bucket, &self.key) {
            (Some(bucket), Some(key)) if !bucket.is_empty() && !key.is_empty() => {
                Some(ArchiveLocation {
                    bucket: bucket.clone(),
                    key: key.clone(),
                })
            }
            _ => None,
        }
    }
}

/// Object-storage coordinates of a model archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveLocation {
    pub bucket: String,
    pub key: String,
}

impl ArchiveLocation {
    /// Last path segment of the key, used as the local archive file name.
    pub fn file_name(&self) -> &str {
        self.key
            .rsplit('/')
            .find(|segment| !segment.is_empty())
            .unwrap_or("bundle.tar.gz")
    }
}

impl std::fmt::Display for ArchiveLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// In-process application lookup.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NativeConfig {
    /// Ordered `module:attribute` candidates; the first hit wins.
    pub candidates: Vec<String>,
}

impl Default for NativeConfig {
    fn default() -> Self {
        Self {
            candidates: DEFAULT_APP_CANDIDATES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Invocation delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Runtime API host:port (`AWS_LAMBDA_RUNTIME_API`).
    pub api: Option<String>,

    /// Number of concurrent invocation pollers sharing one adapter.
    pub concurrency: usize,

    /// Largest upstream response body accepted, in bytes.
    pub max_response_bytes: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            api: None,
            concurrency: 1,
            max_response_bytes: 6 * 1024 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            "pretty" | "text" => Ok(LogFormat::Pretty),
            other => Err(format!("unknown log format '{}'", other)),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Output format.
    pub log_format: LogFormat,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Json,
        }
    }
}
