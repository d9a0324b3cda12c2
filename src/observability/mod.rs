//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields
//!     → logging.rs (filter + JSON or pretty formatter)
//!     → stdout, collected by the platform log service
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Per-invocation detail at debug; failures at warn/error

pub mod logging;

pub use logging::init_logging;
