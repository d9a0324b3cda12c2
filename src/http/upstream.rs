//! Forwarding to the loopback backend.
//!
//! # Responsibilities
//! - Send the translated request to `http://host:port`
//! - Enforce the upstream request timeout and response size limit
//! - Turn every transport failure into a synthetic 502
//!
//! # Design Decisions
//! - Non-2xx replies are still replies: status and body pass through
//! - Connection refused, timeout and protocol errors never fault the
//!   invocation; they become `502 Upstream proxy error: ...`

use axum::body::Body;
use axum::http::StatusCode;
use hyper::body::Incoming;
use hyper::Response;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time;

use crate::backend::LoopbackServer;
use crate::http::event::AdapterResponse;
use crate::http::request::{OutboundRequest, TranslateError};
use crate::http::response::to_adapter_response;

/// Transport-level failures once the backend is reachable.
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{0}")]
    Request(#[from] TranslateError),

    #[error("{0}")]
    Transport(#[from] hyper_util::client::legacy::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("failed to read response body: {0}")]
    Body(String),
}

/// HTTP client bound to one loopback backend.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client<HttpConnector, Body>,
    server: LoopbackServer,
    timeout: Duration,
    max_response_bytes: usize,
}

impl UpstreamClient {
    pub fn new(server: LoopbackServer, timeout: Duration, max_response_bytes: usize) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self {
            client,
            server,
            timeout,
            max_response_bytes,
        }
    }

    pub fn server(&self) -> &LoopbackServer {
        &self.server
    }

    /// Forward `request` and translate the reply; failures become a 502.
    pub async fn forward(&self, request: OutboundRequest) -> AdapterResponse {
        let start_time = Instant::now();
        let method = request.method.clone();
        let target = request.path_and_query.clone();

        match self.send(request).await {
            Ok(response) => {
                tracing::debug!(
                    method = %method,
                    target = %target,
                    status = response.status_code,
                    elapsed_ms = start_time.elapsed().as_millis() as u64,
                    "Upstream responded"
                );
                response
            }
            Err(e) => {
                tracing::error!(
                    method = %method,
                    target = %target,
                    upstream = %self.server,
                    error = %e,
                    "Upstream error"
                );
                AdapterResponse::text(
                    StatusCode::BAD_GATEWAY.as_u16(),
                    format!("Upstream proxy error: {}", e),
                )
            }
        }
    }

    async fn send(&self, request: OutboundRequest) -> Result<AdapterResponse, UpstreamError> {
        let authority = self.server.authority();
        let request = request.into_http(Some(&authority))?;
        let limit = self.max_response_bytes;

        let exchange = async {
            let response: Response<Incoming> = self.client.request(request).await?;
            let (parts, body) = response.into_parts();
            let bytes = axum::body::to_bytes(Body::new(body), limit)
                .await
                .map_err(|e| UpstreamError::Body(e.to_string()))?;
            Ok::<_, UpstreamError>(to_adapter_response(parts.status, &parts.headers, bytes))
        };

        match time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamError::Timeout(self.timeout)),
        }
    }
}
