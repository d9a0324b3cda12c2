//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! built-in defaults (schema.rs)
//!     → optional TOML file named by LT_ADAPTER_CONFIG (loader.rs)
//!     → environment overrides: LT_EFS_MOUNT, LT_S3_BUCKET, LT_LOCAL_PORT, ...
//!     → validation.rs (semantic checks, all errors collected)
//!     → AdapterConfig (validated, immutable for the instance lifetime)
//! ```
//!
//! # Design Decisions
//! - Config is read once at cold start; an instance never reloads it
//! - All fields have defaults so an empty environment is a valid deployment
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    AdapterConfig, ArchiveLocation, AssetConfig, LogFormat, NativeConfig, ObservabilityConfig,
    RuntimeConfig, ServerConfig, TimeoutConfig,
};
pub use validation::ValidationError;
