//! In-process request handlers.
//!
//! A resolved application is tagged once, at resolution time, with the
//! call convention it supports. Nothing re-probes it per invocation.

use axum::body::Body;
use axum::http::{Request, Response, StatusCode, Uri};
use axum::Router;
use bytes::Bytes;
use std::sync::Arc;
use tower::ServiceExt;

use crate::http::event::AdapterResponse;
use crate::http::request::{OutboundRequest, TranslateError};
use crate::http::response::to_adapter_response;

/// Blocking request handler (a plain function of request to response).
pub type SyncHandlerFn = Arc<dyn Fn(Request<Bytes>) -> Response<Bytes> + Send + Sync>;

/// Call convention of a resolved in-process app.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Sync,
    Async,
}

/// An in-process application, tagged with its call convention.
#[derive(Clone)]
pub enum NativeHandler {
    /// Blocking handler; dispatched on the blocking thread pool.
    Sync(SyncHandlerFn),
    /// Routing-table application; driven on the async runtime.
    Async(Router),
}

impl std::fmt::Debug for NativeHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NativeHandler::Sync(_) => f.write_str("NativeHandler::Sync"),
            NativeHandler::Async(_) => f.write_str("NativeHandler::Async"),
        }
    }
}

impl NativeHandler {
    /// Wrap a blocking function.
    pub fn sync<F>(handler: F) -> Self
    where
        F: Fn(Request<Bytes>) -> Response<Bytes> + Send + Sync + 'static,
    {
        NativeHandler::Sync(Arc::new(handler))
    }

    pub fn capability(&self) -> Capability {
        match self {
            NativeHandler::Sync(_) => Capability::Sync,
            NativeHandler::Async(_) => Capability::Async,
        }
    }

    /// Run one request through the app and translate its reply.
    pub async fn call(
        &self,
        request: OutboundRequest,
        max_response_bytes: usize,
    ) -> Result<AdapterResponse, TranslateError> {
        match self {
            NativeHandler::Sync(handler) => {
                let request = into_bytes_request(request)?;
                let handler = Arc::clone(handler);
                match tokio::task::spawn_blocking(move || handler(request)).await {
                    Ok(response) => {
                        let (parts, body) = response.into_parts();
                        Ok(to_adapter_response(parts.status, &parts.headers, body))
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Native handler failed");
                        Ok(internal_error())
                    }
                }
            }
            NativeHandler::Async(router) => {
                let request: Request<Body> = request.into_http(None)?;
                let response = match router.clone().oneshot(request).await {
                    Ok(response) => response,
                    Err(never) => match never {},
                };
                let (parts, body) = response.into_parts();
                match axum::body::to_bytes(body, max_response_bytes).await {
                    Ok(bytes) => Ok(to_adapter_response(parts.status, &parts.headers, bytes)),
                    Err(e) => {
                        tracing::error!(error = %e, "Native response body could not be read");
                        Ok(internal_error())
                    }
                }
            }
        }
    }
}

fn into_bytes_request(request: OutboundRequest) -> Result<Request<Bytes>, TranslateError> {
    let uri = request
        .path_and_query
        .parse::<Uri>()
        .map_err(|e| TranslateError::Uri {
            target: request.path_and_query.clone(),
            reason: e.to_string(),
        })?;
    let mut http = Request::new(request.body);
    *http.method_mut() = request.method;
    *http.uri_mut() = uri;
    *http.headers_mut() = request.headers;
    Ok(http)
}

fn internal_error() -> AdapterResponse {
    AdapterResponse::text(
        StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        "Internal handler error",
    )
}
