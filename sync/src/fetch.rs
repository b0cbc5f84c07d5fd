//! Fetch primitive: one cancellable read against the backend.
//!
//! A fetch never retries and never touches shared state; it only hands a
//! [`FetchOutcome`] back to its caller. Cancellation settles to
//! [`FetchOutcome::Cancelled`], which is deliberately not a failure.

use async_trait::async_trait;
use riskboard_async_utils::{CancelErr, CancellationToken, OrCancelExt};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// One GET against a backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// First value of query parameter `name`.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Why a single request did not produce data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    /// Backend answered with a non-success status.
    #[error("request failed with status {status}")]
    Http {
        status: u16,
        /// Human-readable detail extracted from the error payload.
        message: Option<String>,
        /// Raw response body, kept for debugging.
        body: Option<String>,
        retry_after_secs: Option<u64>,
    },

    #[error("request timed out")]
    Timeout,

    /// Connection refused, DNS failure and similar.
    #[error("network error: {0}")]
    Network(String),

    /// Response arrived but did not match the expected shape.
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl FetchFailure {
    pub fn http(status: u16) -> Self {
        Self::Http {
            status,
            message: None,
            body: None,
            retry_after_secs: None,
        }
    }
}

/// Result of one fetch. Cancellation is its own variant, never a failure.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome<T = Value> {
    Data(T),
    Cancelled,
    Failed(FetchFailure),
}

impl FetchOutcome<Value> {
    /// Decode the JSON payload, turning shape mismatches into
    /// [`FetchFailure::Decode`].
    pub fn decode<T: DeserializeOwned>(self) -> FetchOutcome<T> {
        match self {
            Self::Data(value) => match serde_json::from_value(value) {
                Ok(decoded) => FetchOutcome::Data(decoded),
                Err(e) => FetchOutcome::Failed(FetchFailure::Decode(e.to_string())),
            },
            Self::Cancelled => FetchOutcome::Cancelled,
            Self::Failed(failure) => FetchOutcome::Failed(failure),
        }
    }
}

impl<T> FetchOutcome<T> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Backend access seam. The engine talks to the network only through this.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, request: &FetchRequest) -> Result<Value, FetchFailure>;
}

/// Perform one cancellable request.
pub async fn fetch(
    transport: &dyn Transport,
    request: &FetchRequest,
    token: &CancellationToken,
) -> FetchOutcome {
    if token.is_cancelled() {
        return FetchOutcome::Cancelled;
    }
    match transport.get(request).or_cancel(token).await {
        Ok(Ok(value)) => FetchOutcome::Data(value),
        Ok(Err(failure)) => FetchOutcome::Failed(failure),
        Err(CancelErr::Cancelled) => {
            tracing::debug!(path = %request.path, "request cancelled");
            FetchOutcome::Cancelled
        }
    }
}
