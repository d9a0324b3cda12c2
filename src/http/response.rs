//! HTTP response → adapter response translation.
//!
//! # Responsibilities
//! - Carry status and headers over to the runtime's response shape
//! - Encode the body as text when it is valid UTF-8, base64 otherwise
//!
//! # Design Decisions
//! - Encoding is exact: decoding the produced body with the request-side
//!   rules yields the original bytes
//! - Repeated header values are joined with ", "

use axum::http::{HeaderMap, StatusCode};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use std::collections::BTreeMap;

use crate::http::event::AdapterResponse;

/// Build the runtime response for an upstream (or in-process) reply.
pub fn to_adapter_response(
    status: StatusCode,
    headers: &HeaderMap,
    body: Bytes,
) -> AdapterResponse {
    let (body, is_base64_encoded) = encode_body(body);
    AdapterResponse {
        status_code: status.as_u16(),
        headers: flatten_headers(headers),
        body,
        is_base64_encoded,
    }
}

/// Text when the bytes are valid UTF-8, base64 (flag set) otherwise.
pub fn encode_body(body: Bytes) -> (String, bool) {
    match String::from_utf8(body.to_vec()) {
        Ok(text) => (text, false),
        Err(_) => (STANDARD.encode(&body), true),
    }
}

fn flatten_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut flat: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        flat.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    flat
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::event::InvocationEvent;
    use crate::http::request::body_bytes;
    use axum::http::HeaderValue;

    #[test]
    fn test_text_body_passes_through() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));
        let response = to_adapter_response(
            StatusCode::OK,
            &headers,
            Bytes::from_static(b"{\"translatedText\":\"bonjour\"}"),
        );
        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, "{\"translatedText\":\"bonjour\"}");
        assert!(!response.is_base64_encoded);
        assert_eq!(response.headers["content-type"], "application/json");
    }

    #[test]
    fn test_binary_body_is_base64() {
        let response = to_adapter_response(
            StatusCode::OK,
            &HeaderMap::new(),
            Bytes::from_static(&[0xff, 0xfe, 0x00]),
        );
        assert!(response.is_base64_encoded);
        assert_eq!(response.body, "//4A");
    }

    #[test]
    fn test_repeated_headers_are_joined() {
        let mut headers = HeaderMap::new();
        headers.append("vary", HeaderValue::from_static("origin"));
        headers.append("vary", HeaderValue::from_static("accept"));
        let response = to_adapter_response(StatusCode::NO_CONTENT, &headers, Bytes::new());
        assert_eq!(response.headers["vary"], "origin, accept");
        assert_eq!(response.body, "");
    }

    #[test]
    fn test_body_round_trip() {
        let samples: Vec<Vec<u8>> = vec![
            Vec::new(),
            b"plain ascii".to_vec(),
            "h\u{e9}llo \u{1F600}".as_bytes().to_vec(),
            vec![0xc3, 0x28],
            (0u8..=255).collect(),
            vec![0x00; 17],
        ];

        for original in samples {
            let (body, is_base64_encoded) = encode_body(Bytes::from(original.clone()));
            let event = InvocationEvent {
                body: Some(serde_json::Value::String(body)),
                is_base64_encoded,
                ..Default::default()
            };
            assert_eq!(body_bytes(&event).unwrap().to_vec(), original);
        }
    }
}
