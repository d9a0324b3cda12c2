//! HTTP protocol translation subsystem.
//!
//! # Data Flow
//! ```text
//! InvocationEvent (shape A or B)
//!     → event.rs (deserialize, detect shape)
//!     → request.rs (method, path + query, headers, body bytes)
//!     → upstream.rs (loopback hop, timeout, 502 on transport failure)
//!        or an in-process app
//!     → response.rs (status, headers, text or base64 body)
//!     → AdapterResponse
//! ```

pub mod event;
pub mod request;
pub mod response;
pub mod upstream;

pub use event::{AdapterResponse, EventShape, InvocationEvent};
pub use request::{to_http_request, OutboundRequest, TranslateError};
pub use response::to_adapter_response;
pub use upstream::{UpstreamClient, UpstreamError};
