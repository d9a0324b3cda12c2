//! Readiness probing.
//!
//! # Responsibilities
//! - Decide whether the launched backend accepts connections yet
//! - Bound every attempt with its own short timeout
//!
//! # Design Decisions
//! - The supervisor owns the polling loop; a probe is a single attempt
//! - Any connect error counts as "not ready", never as a failure

use async_trait::async_trait;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time;

use crate::backend::LoopbackServer;

/// One readiness check against the backend.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn is_ready(&self, server: &LoopbackServer) -> bool;
}

/// Ready once a TCP connection to `host:port` succeeds.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    connect_timeout: Duration,
}

impl TcpProbe {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl ReadinessProbe for TcpProbe {
    async fn is_ready(&self, server: &LoopbackServer) -> bool {
        let connect = TcpStream::connect((server.host.as_str(), server.port));
        match time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                tracing::trace!(server = %server, error = %e, "Probe: connection failed");
                false
            }
            Err(_) => {
                tracing::trace!(server = %server, "Probe: connect timed out");
                false
            }
        }
    }
}
