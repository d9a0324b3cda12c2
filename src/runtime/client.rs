//! Lambda Runtime API client.

use bytes::Bytes;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use crate::http::AdapterResponse;
use crate::runtime::RuntimeError;

pub const API_VERSION: &str = "2018-06-01";
pub const REQUEST_ID_HEADER: &str = "Lambda-Runtime-Aws-Request-Id";
pub const DEADLINE_HEADER: &str = "Lambda-Runtime-Deadline-Ms";
pub const ERROR_TYPE_HEADER: &str = "Lambda-Runtime-Function-Error-Type";

/// One event handed out by the runtime.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub request_id: String,
    /// Wall-clock deadline in milliseconds since the epoch.
    pub deadline_ms: Option<u64>,
    pub payload: Bytes,
}

/// Error body understood by the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub error_message: String,
    pub error_type: String,
}

impl ErrorReport {
    pub fn new(error_type: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            error_message: error_message.into(),
            error_type: error_type.into(),
        }
    }
}

/// Talks to `http://$AWS_LAMBDA_RUNTIME_API/2018-06-01`.
#[derive(Debug, Clone)]
pub struct RuntimeClient {
    client: Client,
    base_url: String,
}

impl RuntimeClient {
    /// `api` is `host:port`, optionally with an `http://` prefix.
    pub fn new(api: &str) -> Self {
        let api = api.trim_end_matches('/');
        let base_url = if api.starts_with("http://") || api.starts_with("https://") {
            format!("{}/{}", api, API_VERSION)
        } else {
            format!("http://{}/{}", api, API_VERSION)
        };
        Self {
            client: Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Long-poll for the next invocation.
    pub async fn next_invocation(&self) -> Result<Invocation, RuntimeError> {
        let endpoint = format!("{}/runtime/invocation/next", self.base_url);
        let resp = self.client.get(&endpoint).send().await?;
        let resp = check_status(&endpoint, resp).await?;

        let headers = resp.headers();
        let request_id = headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or(RuntimeError::MissingHeader(REQUEST_ID_HEADER))?;
        let deadline_ms = headers
            .get(DEADLINE_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());

        let payload = resp.bytes().await?;
        Ok(Invocation {
            request_id,
            deadline_ms,
            payload,
        })
    }

    pub async fn post_response(
        &self,
        request_id: &str,
        response: &AdapterResponse,
    ) -> Result<(), RuntimeError> {
        let endpoint = format!("{}/runtime/invocation/{}/response", self.base_url, request_id);
        let resp = self.client.post(&endpoint).json(response).send().await?;
        check_status(&endpoint, resp).await.map(drop)
    }

    pub async fn post_error(
        &self,
        request_id: &str,
        report: &ErrorReport,
    ) -> Result<(), RuntimeError> {
        let endpoint = format!("{}/runtime/invocation/{}/error", self.base_url, request_id);
        self.send_error(endpoint, report).await
    }

    /// Report a failure that happened before the first invocation.
    pub async fn post_init_error(&self, report: &ErrorReport) -> Result<(), RuntimeError> {
        let endpoint = format!("{}/runtime/init/error", self.base_url);
        self.send_error(endpoint, report).await
    }

    async fn send_error(&self, endpoint: String, report: &ErrorReport) -> Result<(), RuntimeError> {
        let resp = self
            .client
            .post(&endpoint)
            .header(ERROR_TYPE_HEADER, &report.error_type)
            .json(report)
            .send()
            .await?;
        check_status(&endpoint, resp).await.map(drop)
    }
}

async fn check_status(endpoint: &str, resp: Response) -> Result<Response, RuntimeError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(RuntimeError::Status {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        body,
    })
}
