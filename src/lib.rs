//! LibreTranslate serverless adapter library.
//!
//! Bridges serverless invocation events to a LibreTranslate-compatible
//! HTTP backend: an in-process app when one is registered, otherwise a
//! supervised loopback server started once per instance, with the model
//! bundle provisioned before first launch.

// Core subsystems
pub mod adapter;
pub mod assets;
pub mod backend;
pub mod config;
pub mod http;
pub mod supervisor;

// Delivery
pub mod runtime;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use adapter::{Adapter, AdapterError};
pub use config::AdapterConfig;
pub use lifecycle::Shutdown;
