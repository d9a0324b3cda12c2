//! Per-invocation orchestration.
//!
//! # Data Flow
//! ```text
//! InvocationEvent
//!     → http::request (to_http_request)
//!     → Native handler?  call in-process ───────────────┐
//!     → else supervisor.ensure_ready()                  │
//!           (first call: provisioning + launch)         │
//!       → http::upstream (forward over loopback)        │
//!     → AdapterResponse ◀───────────────────────────────┘
//! ```
//!
//! # Design Decisions
//! - The backend choice is made once, at construction
//! - Startup and malformed-event failures are invocation errors;
//!   transport failures are already a 502 response by this point

pub mod entrypoint;

use thiserror::Error;

use crate::http::TranslateError;
use crate::supervisor::StartupError;

pub use entrypoint::Adapter;

/// Why an invocation produced no response.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("backend startup failed: {0}")]
    Startup(#[from] StartupError),

    #[error("invalid invocation event: {0}")]
    InvalidEvent(#[from] TranslateError),
}

impl AdapterError {
    /// Short classifier reported to the runtime alongside the message.
    pub fn error_type(&self) -> &'static str {
        match self {
            AdapterError::Startup(_) => "StartupError",
            AdapterError::InvalidEvent(_) => "InvalidEvent",
        }
    }
}
