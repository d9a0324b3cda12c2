//! Backend startup state machine.
//!
//! # States
//! - NotStarted: no caller has asked for the backend yet
//! - Starting: exactly one startup sequence is in flight
//! - Ready: the backend accepted a connection
//! - Failed: launch or readiness failed; the cause is kept for every caller
//!
//! # State Transitions
//! ```text
//! NotStarted → Starting: first ensure_ready() caller
//! Starting → Ready:      readiness probe succeeded before the launch deadline
//! Starting → Failed:     spawn error, early exit, or launch deadline elapsed
//! ```
//!
//! Ready and Failed are terminal for the instance.

use std::time::Duration;
use thiserror::Error;

/// Why the backend is not available.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartupError {
    #[error("failed to launch backend: {0}")]
    Launch(String),

    #[error("backend exited before becoming ready: {0}")]
    Exited(String),

    #[error("server did not become ready at {addr} within {deadline:?}")]
    NotReady { addr: String, deadline: Duration },

    #[error("timed out after {0:?} waiting for backend startup")]
    WaitTimeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ServerState {
    #[default]
    NotStarted,
    Starting,
    Ready,
    Failed(StartupError),
}

impl ServerState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ServerState::Ready | ServerState::Failed(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!ServerState::NotStarted.is_terminal());
        assert!(!ServerState::Starting.is_terminal());
        assert!(ServerState::Ready.is_terminal());
        assert!(ServerState::Failed(StartupError::Launch("x".into())).is_terminal());
    }

    #[test]
    fn test_error_display() {
        let err = StartupError::NotReady {
            addr: "127.0.0.1:5000".into(),
            deadline: Duration::from_secs(60),
        };
        assert_eq!(
            err.to_string(),
            "server did not become ready at 127.0.0.1:5000 within 60s"
        );

        let err = StartupError::NotReady {
            addr: "127.0.0.1:5000".into(),
            deadline: Duration::from_millis(300),
        };
        assert_eq!(
            err.to_string(),
            "server did not become ready at 127.0.0.1:5000 within 300ms"
        );
    }
}
