//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config loaded → archive source (if configured) → resolve backend → Adapter
//!
//! Shutdown (shutdown.rs):
//!     Signal received → pollers stop taking invocations → backend stopped → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Cold start does no I/O beyond building clients
//! - In-flight invocations finish before the pollers exit

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::{spawn_signal_listener, wait_for_signal};
pub use startup::{archive_source, build_adapter};
