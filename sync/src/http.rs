//! `reqwest`-backed [`Transport`].

use crate::config::ApiConfig;
use crate::errors::{Result, SyncError};
use crate::fetch::{FetchFailure, FetchRequest, Transport};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;

/// JSON-over-HTTP transport against the dashboard backend.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::transport_with_source("failed to build HTTP client", e))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(api: &ApiConfig) -> Result<Self> {
        Self::new(&api.base_url, api.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, request: &FetchRequest) -> std::result::Result<Value, FetchFailure> {
        let url = self.url_for(&request.path);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .query(&request.query)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let retry_after_header = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<Value>(&body).ok();
            let retry_after_secs = retry_after_header
                .as_deref()
                .and_then(|v| parse_retry_after_at(v, Utc::now()))
                .or_else(|| parsed.as_ref().and_then(retry_after_from_body));
            tracing::debug!(
                path = %request.path,
                status = status.as_u16(),
                "backend returned an error status"
            );
            return Err(FetchFailure::Http {
                status: status.as_u16(),
                message: error_message(parsed.as_ref(), &body),
                body: (!body.is_empty()).then_some(body),
                retry_after_secs,
            });
        }

        if status == StatusCode::NO_CONTENT || body.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body).map_err(|e| FetchFailure::Decode(e.to_string()))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchFailure {
    if err.is_timeout() {
        FetchFailure::Timeout
    } else if err.is_decode() {
        FetchFailure::Decode(err.to_string())
    } else {
        FetchFailure::Network(err.to_string())
    }
}

const MESSAGE_KEYS: [&str; 3] = ["message", "error", "reason"];

/// Human-readable detail from a backend error payload.
///
/// Looks at `detail` (string), then `detail.{message,error,reason}`, then the
/// same keys at the top level.
pub fn extract_error_message(payload: &Value) -> Option<String> {
    let non_empty = |v: &Value| {
        v.as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    if let Some(detail) = payload.get("detail") {
        if let Some(message) = non_empty(detail) {
            return Some(message);
        }
        if let Some(message) = MESSAGE_KEYS
            .iter()
            .find_map(|key| detail.get(*key).and_then(non_empty))
        {
            return Some(message);
        }
    }

    MESSAGE_KEYS
        .iter()
        .find_map(|key| payload.get(*key).and_then(non_empty))
}

/// Message for an error response: the JSON detail when the body is JSON,
/// the trimmed raw text otherwise.
fn error_message(parsed: Option<&Value>, body: &str) -> Option<String> {
    match parsed {
        Some(payload) => extract_error_message(payload),
        None => {
            let text = body.trim();
            (!text.is_empty()).then(|| text.to_string())
        }
    }
}

/// Parse a `Retry-After` value (delta seconds or HTTP date) relative to `now`.
///
/// Fractional seconds round up. Zero, negative and past values yield `None`.
pub fn parse_retry_after_at(value: &str, now: DateTime<Utc>) -> Option<u64> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        return positive_secs(secs);
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.with_timezone(&Utc).signed_duration_since(now);
    positive_secs(delta.num_milliseconds() as f64 / 1000.0)
}

fn retry_after_from_body(payload: &Value) -> Option<u64> {
    positive_secs(payload.get("detail")?.get("retry_after")?.as_f64()?)
}

fn positive_secs(secs: f64) -> Option<u64> {
    (secs.is_finite() && secs > 0.0).then(|| secs.ceil() as u64)
}
