//! Invocation delivery.
//!
//! # Data Flow
//! ```text
//! worker × runtime.concurrency
//!     → client.rs: GET  /runtime/invocation/next  (long poll)
//!     → Adapter::handle(event)
//!     → client.rs: POST /runtime/invocation/{id}/response
//!              or POST /runtime/invocation/{id}/error
//! ```
//!
//! # Design Decisions
//! - Workers share one `Adapter`, so one backend and one startup gate
//! - A failed poll is logged and retried after a short pause
//! - Shutdown interrupts the long poll, never a running invocation

pub mod client;
pub mod worker;

use thiserror::Error;

pub use client::{ErrorReport, Invocation, RuntimeClient};
pub use worker::{process, run};

/// Failures talking to the Runtime API.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime API request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("runtime API {endpoint} returned {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("runtime API response is missing the {0} header")]
    MissingHeader(&'static str),
}
