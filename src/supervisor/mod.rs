//! Backend supervision subsystem.
//!
//! # Data Flow
//! ```text
//! ensure_ready() (any number of concurrent callers)
//!     → state.rs: NotStarted → Starting, won by exactly one caller
//!     → winner spawns the startup sequence in the background:
//!           Preparation (asset provisioning, non-fatal)
//!           → launcher.rs (spawn backend entry point)
//!           → probe.rs every probe_interval until ready / exit / deadline
//!           → Ready | Failed(cause)
//!     → every caller waits on the same watch channel, bounded by ready_wait
//! ```
//!
//! # Design Decisions
//! - One launch per instance; Failed is never retried
//! - Three explicit timeouts: per-probe connect, launch deadline, outer wait
//! - A caller that times out does not cancel the background sequence
//! - Readiness is an injectable probe so tests need no real socket

pub mod launcher;
pub mod probe;
pub mod state;
#[allow(clippy::module_inception)]
pub mod supervisor;

pub use launcher::{BackendProcess, Launcher, ProcessLauncher};
pub use probe::{ReadinessProbe, TcpProbe};
pub use state::{ServerState, StartupError};
pub use supervisor::{Preparation, ServerSupervisor, SupervisorTimeouts};
