//! Invocation event and response payloads.
//!
//! Two event shapes are accepted on the same type: the newer one carries
//! `rawPath`, `rawQueryString` and `requestContext.http.method`; the older
//! one carries `path`, `httpMethod` and `queryStringParameters`. Every field
//! is optional so either shape (or a mix) deserializes.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// One inbound HTTP call as delivered by the runtime.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct InvocationEvent {
    /// Payload format version, when the trigger reports one ("1.0" / "2.0").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_query_string: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_method: Option<String>,

    /// Shape B query parameters. Ordered so re-encoding is deterministic.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_string_parameters: Option<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,

    /// Text, base64 text, or (rarely) an arbitrary JSON value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,

    pub is_base64_encoded: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_context: Option<RequestContext>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RequestContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http: Option<HttpContext>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HttpContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

/// Which event schema an event was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventShape {
    /// `rawPath` / `rawQueryString` / `requestContext.http.method`.
    V2,
    /// `path` / `queryStringParameters` / `httpMethod`.
    V1,
}

impl InvocationEvent {
    pub fn shape(&self) -> EventShape {
        let has_v2_method = self
            .request_context
            .as_ref()
            .and_then(|ctx| ctx.http.as_ref())
            .is_some_and(|http| http.method.is_some());
        if self.raw_path.is_some() || has_v2_method {
            EventShape::V2
        } else {
            EventShape::V1
        }
    }
}

/// Response handed back to the runtime.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AdapterResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl AdapterResponse {
    /// Plain-text response produced by the adapter itself.
    pub fn text(status_code: u16, body: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(
            "content-type".to_string(),
            "text/plain; charset=utf-8".to_string(),
        );
        Self {
            status_code,
            headers,
            body: body.into(),
            is_base64_encoded: false,
        }
    }
}
