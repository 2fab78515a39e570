//! Remote authority transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

use crate::models::RemoteRecord;
use crate::util::{error_excerpt, has_http_scheme, non_empty_trimmed};

const PUSH_PATH: &str = "/sync";
const PULL_PATH: &str = "/latest-data";
const HEALTH_PATH: &str = "/healthz";
const CONNECT_TIMEOUT_SECS: u64 = 10;
const PROBE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(String),
    #[error("Remote returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Remote rejected the batch: {0}")]
    Rejected(String),
    #[error("Invalid response payload: {0}")]
    Decode(String),
    #[error("Invalid transport configuration: {0}")]
    InvalidConfiguration(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout
        } else if error.is_decode() {
            Self::Decode(error.to_string())
        } else {
            Self::Network(error.to_string())
        }
    }
}

/// Acknowledgment of a whole push batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushAck {
    /// Number of records the remote reports as stored
    pub accepted: usize,
    pub message: Option<String>,
}

/// Full authoritative snapshot returned by a pull
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub records: Vec<RemoteRecord>,
    /// Entries that could not be decoded into a record
    pub malformed: usize,
}

impl From<Vec<RemoteRecord>> for RemoteSnapshot {
    fn from(records: Vec<RemoteRecord>) -> Self {
        Self {
            records,
            malformed: 0,
        }
    }
}

/// Request/response channel to the remote authority
///
/// `push` is all-or-nothing per batch. `pull` always returns the complete
/// snapshot, never a delta.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn push(&self, batch: &[RemoteRecord]) -> Result<PushAck, TransportError>;

    async fn pull(&self) -> Result<RemoteSnapshot, TransportError>;
}

/// JSON-over-HTTP transport
#[derive(Clone)]
pub struct HttpTransport {
    base_url: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let base_url = normalize_base_url(base_url.into())?;
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .user_agent(concat!("rollcall/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Cheap reachability check against the health endpoint
    pub async fn probe(&self) -> bool {
        let result = self
            .client
            .get(self.url(HEALTH_PATH))
            .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
            .send()
            .await;
        match result {
            Ok(response) => response.status().is_success(),
            Err(error) => {
                tracing::debug!("Connectivity probe failed: {error}");
                false
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    success: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    accepted: Option<usize>,
}

#[async_trait]
impl Transport for HttpTransport {
    async fn push(&self, batch: &[RemoteRecord]) -> Result<PushAck, TransportError> {
        let response = self
            .client
            .post(self.url(PUSH_PATH))
            .header(reqwest::header::ACCEPT, "application/json")
            .json(batch)
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let payload = response.json::<PushResponse>().await?;

        if !payload.success {
            return Err(TransportError::Rejected(
                payload
                    .message
                    .unwrap_or_else(|| "remote reported success=false".to_string()),
            ));
        }

        Ok(PushAck {
            accepted: payload.accepted.unwrap_or(batch.len()),
            message: payload.message,
        })
    }

    async fn pull(&self) -> Result<RemoteSnapshot, TransportError> {
        let response = self
            .client
            .get(self.url(PULL_PATH))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;
        let response = ensure_success(response).await?;
        let values = response.json::<Vec<serde_json::Value>>().await?;
        Ok(decode_snapshot(values))
    }
}

/// Decode entries one by one so a single bad entry does not fail the pull.
pub fn decode_snapshot(values: Vec<serde_json::Value>) -> RemoteSnapshot {
    let mut snapshot = RemoteSnapshot::default();
    for value in values {
        match serde_json::from_value::<RemoteRecord>(value) {
            Ok(record) => snapshot.records.push(record),
            Err(error) => {
                tracing::warn!("Skipping malformed remote record: {error}");
                snapshot.malformed += 1;
            }
        }
    }
    snapshot
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(status_error(status, &body))
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn status_error(status: StatusCode, body: &str) -> TransportError {
    let body = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|payload| payload.message.or(payload.error))
        .unwrap_or_else(|| body.to_string());
    TransportError::Status {
        status: status.as_u16(),
        body: error_excerpt(&body),
    }
}

fn normalize_base_url(raw: String) -> Result<String, TransportError> {
    let url = non_empty_trimmed(Some(raw)).ok_or_else(|| {
        TransportError::InvalidConfiguration("base URL must not be empty".to_string())
    })?;
    if has_http_scheme(&url) {
        Ok(url.trim_end_matches('/').to_string())
    } else {
        Err(TransportError::InvalidConfiguration(
            "base URL must include http:// or https://".to_string(),
        ))
    }
}
