//! Backend selection subsystem.
//!
//! # Data Flow
//! ```text
//! Cold start:
//!     configured candidates ("main:app", "app:app", ...)
//!     → resolver.rs walks them against the AppRegistry
//!     → first hit: BackendHandle::Native(NativeHandler::{Sync, Async})
//!     → no hit:   BackendHandle::Loopback(LoopbackServer)
//!                 (started lazily by the supervisor on first invocation)
//! ```

pub mod native;
pub mod resolver;

pub use native::{Capability, NativeHandler, SyncHandlerFn};
pub use resolver::{AppRegistry, BackendResolver, CandidateLocation, ResolveError};

/// Loopback address of a supervised backend process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopbackServer {
    pub host: String,
    pub port: u16,
}

impl LoopbackServer {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn authority(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl std::fmt::Display for LoopbackServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.authority())
    }
}

/// How invocations reach the backing application.
#[derive(Debug, Clone)]
pub enum BackendHandle {
    Native(NativeHandler),
    Loopback(LoopbackServer),
}
