//! Event → HTTP request translation.
//!
//! # Responsibilities
//! - Extract method, path and query from either event shape
//! - Decode the body (base64 or UTF-8 text)
//! - Copy headers, dropping the ones the transport owns
//! - Produce an origin-form request that can be sent to a loopback
//!   backend or handed to an in-process app
//!
//! # Design Decisions
//! - Newer `rawPath`/`rawQueryString` fields win over the older ones
//! - Older query parameter maps are re-encoded form-style in key order
//! - `Host` is never forwarded; the upstream connection sets it

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, CONTENT_LENGTH, HOST};
use axum::http::uri::{Authority, Scheme};
use axum::http::{HeaderMap, Method, Request, Uri};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use std::str::FromStr;
use thiserror::Error;

use crate::http::event::InvocationEvent;

/// Errors raised while turning an event into a request.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("invalid HTTP method '{0}'")]
    Method(String),

    #[error("body is flagged base64 but does not decode: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("invalid request target '{target}': {reason}")]
    Uri { target: String, reason: String },
}

/// Canonical outbound request, independent of the event shape it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundRequest {
    pub method: Method,
    /// Path plus optional `?query`, e.g. `/translate?source=en`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl OutboundRequest {
    /// Build an `http::Request`. With an authority the URI is absolute
    /// (`http://host:port/...`), as the loopback client needs; without
    /// one it stays in origin form for in-process apps.
    pub fn into_http(self, authority: Option<&str>) -> Result<Request<Body>, TranslateError> {
        let uri = match authority {
            Some(authority) => {
                let mut parts = Uri::from_str(&self.path_and_query)
                    .map_err(|e| uri_error(&self.path_and_query, e))?
                    .into_parts();
                parts.scheme = Some(Scheme::HTTP);
                parts.authority =
                    Some(Authority::from_str(authority).map_err(|e| uri_error(authority, e))?);
                Uri::from_parts(parts).map_err(|e| uri_error(&self.path_and_query, e))?
            }
            None => Uri::from_str(&self.path_and_query)
                .map_err(|e| uri_error(&self.path_and_query, e))?,
        };

        let mut request = Request::new(Body::from(self.body));
        *request.method_mut() = self.method;
        *request.uri_mut() = uri;
        *request.headers_mut() = self.headers;
        Ok(request)
    }
}

fn uri_error(target: &str, reason: impl std::fmt::Display) -> TranslateError {
    TranslateError::Uri {
        target: target.to_string(),
        reason: reason.to_string(),
    }
}

/// Translate an invocation event into an outbound request.
pub fn to_http_request(event: &InvocationEvent) -> Result<OutboundRequest, TranslateError> {
    let method_name = event_method(event).to_ascii_uppercase();
    let method = Method::from_bytes(method_name.as_bytes())
        .map_err(|_| TranslateError::Method(method_name.clone()))?;

    Ok(OutboundRequest {
        method,
        path_and_query: path_and_query(event),
        headers: forwarded_headers(event),
        body: body_bytes(event)?,
    })
}

fn event_method(event: &InvocationEvent) -> &str {
    event
        .request_context
        .as_ref()
        .and_then(|ctx| ctx.http.as_ref())
        .and_then(|http| http.method.as_deref())
        .filter(|m| !m.is_empty())
        .or_else(|| event.http_method.as_deref().filter(|m| !m.is_empty()))
        .unwrap_or("GET")
}

/// `rawPath` or `path` (default `/`) followed by the query string, if any.
pub fn path_and_query(event: &InvocationEvent) -> String {
    let path = event
        .raw_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .or_else(|| event.path.as_deref().filter(|p| !p.is_empty()))
        .unwrap_or("/");

    let query = match event.raw_query_string.as_deref().filter(|q| !q.is_empty()) {
        Some(raw) => raw.to_string(),
        None => encode_query(event),
    };

    if query.is_empty() {
        path.to_string()
    } else if query.starts_with('?') {
        format!("{}{}", path, query)
    } else {
        format!("{}?{}", path, query)
    }
}

/// Form-encode shape B parameters in key order. Spaces become `+`; `~` is
/// percent-encoded and `*` is left bare, which form decoders treat the same.
fn encode_query(event: &InvocationEvent) -> String {
    match &event.query_string_parameters {
        Some(params) if !params.is_empty() => url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params.iter())
            .finish(),
        _ => String::new(),
    }
}

fn forwarded_headers(event: &InvocationEvent) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let Some(source) = &event.headers else {
        return headers;
    };

    for (name, value) in source {
        let name = match HeaderName::from_bytes(name.as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                tracing::warn!(header = %name, "Dropping header with invalid name");
                continue;
            }
        };
        if name == HOST || name == CONTENT_LENGTH {
            continue;
        }
        match HeaderValue::from_str(value) {
            Ok(value) => {
                headers.append(name, value);
            }
            Err(_) => tracing::warn!(header = %name, "Dropping header with invalid value"),
        }
    }
    headers
}

/// Decode the event body into raw bytes.
pub fn body_bytes(event: &InvocationEvent) -> Result<Bytes, TranslateError> {
    let Some(body) = &event.body else {
        return Ok(Bytes::new());
    };
    match body {
        serde_json::Value::Null => Ok(Bytes::new()),
        serde_json::Value::String(text) if text.is_empty() => Ok(Bytes::new()),
        serde_json::Value::String(text) if event.is_base64_encoded => {
            Ok(Bytes::from(STANDARD.decode(text)?))
        }
        serde_json::Value::String(text) => Ok(Bytes::from(text.clone().into_bytes())),
        other => Ok(Bytes::from(other.to_string().into_bytes())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn event(value: serde_json::Value) -> InvocationEvent {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_v2_request() {
        let request = to_http_request(&event(json!({
            "rawPath": "/translate",
            "rawQueryString": "source=en&target=fr",
            "headers": {"Content-Type": "application/json", "Host": "abc.lambda-url.aws"},
            "requestContext": {"http": {"method": "post"}},
            "body": "{\"q\":\"hi\"}",
            "isBase64Encoded": false
        })))
        .unwrap();

        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path_and_query, "/translate?source=en&target=fr");
        assert_eq!(request.headers.get("content-type").unwrap(), "application/json");
        assert!(request.headers.get("host").is_none());
        assert_eq!(request.body, Bytes::from_static(b"{\"q\":\"hi\"}"));
    }

    #[test]
    fn test_query_parameters_are_form_encoded() {
        let request = to_http_request(&event(json!({
            "path": "/translate",
            "queryStringParameters": {"q": "a b~c*", "alt": "x&y"}
        })))
        .unwrap();
        assert_eq!(request.path_and_query, "/translate?alt=x%26y&q=a+b%7Ec*");
    }

    #[test]
    fn test_both_shapes_translate_equally() {
        let v2 = to_http_request(&event(json!({
            "rawPath": "/translate",
            "rawQueryString": "q=hello+world&source=en",
            "headers": {"x-api-key": "k"},
            "requestContext": {"http": {"method": "POST"}},
            "body": "payload",
            "isBase64Encoded": false
        })))
        .unwrap();
        let v1 = to_http_request(&event(json!({
            "path": "/translate",
            "httpMethod": "POST",
            "queryStringParameters": {"source": "en", "q": "hello world"},
            "headers": {"X-Api-Key": "k"},
            "body": "payload",
            "isBase64Encoded": false
        })))
        .unwrap();

        assert_eq!(v1, v2);
    }

    #[test]
    fn test_defaults_and_prefixed_query() {
        let request = to_http_request(&event(json!({"rawQueryString": "?a=1"}))).unwrap();
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path_and_query, "/?a=1");
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_base64_body_is_decoded() {
        let request = to_http_request(&event(json!({
            "rawPath": "/upload",
            "body": "AAH/fg==",
            "isBase64Encoded": true
        })))
        .unwrap();
        assert_eq!(request.body.as_ref(), &[0x00, 0x01, 0xff, 0x7e]);
    }

    #[test]
    fn test_invalid_base64_is_an_error() {
        let err = to_http_request(&event(json!({
            "rawPath": "/upload",
            "body": "not base64!!",
            "isBase64Encoded": true
        })))
        .unwrap_err();
        assert!(matches!(err, TranslateError::Base64(_)));
    }

    #[test]
    fn test_non_string_body_is_serialized() {
        let request = to_http_request(&event(json!({
            "rawPath": "/translate",
            "body": {"q": "hi"}
        })))
        .unwrap();
        assert_eq!(request.body, Bytes::from_static(b"{\"q\":\"hi\"}"));
    }

    #[test]
    fn test_absolute_uri_for_loopback() {
        let request = to_http_request(&event(json!({"rawPath": "/languages"}))).unwrap();
        let http = request.into_http(Some("127.0.0.1:5000")).unwrap();
        assert_eq!(http.uri().to_string(), "http://127.0.0.1:5000/languages");
    }
}
