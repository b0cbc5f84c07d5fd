//! Diagnostic classifier
//!
//! Turns a [`FetchFailure`] into a [`FailureRecord`]: a user-facing message
//! plus a stable code (`{SCOPE}-HTTP-503`, `{SCOPE}-TIMEOUT`, ...) that support
//! can correlate. The same scope and failure shape always yield the same code.

use crate::fetch::FetchFailure;
use riskboard_protocol::FieldKind;
use serde::Serialize;
use std::fmt;

const TIMEOUT_MESSAGE: &str = "The request timed out. Please try again shortly.";
const GENERIC_SCOPE: &str = "GEN";

/// Normalised feature-area tag, e.g. `DASH-HEALTH`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiagnosticScope(String);

impl DiagnosticScope {
    pub fn new(raw: &str) -> Self {
        Self(normalize(raw))
    }

    /// Two-part scope: `area("nex", "dash")` → `NEX-DASH`.
    pub fn area(page: &str, area: &str) -> Self {
        Self(format!("{}-{}", normalize(page), normalize(area)))
    }

    /// Scope for one dashboard field under this prefix.
    pub fn for_field(&self, kind: FieldKind) -> Self {
        Self(format!("{}-{}", self.0, kind.scope_area()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiagnosticScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// Uppercase, squash anything outside [A-Z0-9-] into single dashes, trim.
fn normalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars().flat_map(char::to_uppercase) {
        let ch = if ch.is_ascii_uppercase() || ch.is_ascii_digit() {
            ch
        } else {
            '-'
        };
        if ch == '-' && out.ends_with('-') {
            continue;
        }
        out.push(ch);
    }
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        GENERIC_SCOPE.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Classified failure, attached to snapshots and page state as data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureRecord {
    pub message: String,
    pub code: String,
    /// Transport failures can be retried by an explicit user action.
    pub recoverable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
}

/// Stable code for `failure` under `scope`.
pub fn diagnostic_code(failure: &FetchFailure, scope: &DiagnosticScope) -> String {
    match failure {
        FetchFailure::Http { status, .. } => format!("{scope}-HTTP-{status}"),
        FetchFailure::Timeout => format!("{scope}-TIMEOUT"),
        FetchFailure::Network(_) => format!("{scope}-NETWORK"),
        FetchFailure::Decode(_) => format!("{scope}-DECODE"),
    }
}

/// Classify a failure. `fallback_message` is used whenever the failure
/// carries no backend-provided detail.
pub fn classify(
    failure: &FetchFailure,
    scope: &DiagnosticScope,
    fallback_message: &str,
) -> FailureRecord {
    let (message, retry_after_secs) = match failure {
        FetchFailure::Http {
            message,
            retry_after_secs,
            ..
        } => (
            message
                .as_deref()
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(fallback_message)
                .to_string(),
            *retry_after_secs,
        ),
        FetchFailure::Timeout => (TIMEOUT_MESSAGE.to_string(), None),
        FetchFailure::Network(_) | FetchFailure::Decode(_) => (fallback_message.to_string(), None),
    };

    FailureRecord {
        message,
        code: diagnostic_code(failure, scope),
        recoverable: true,
        retry_after_secs,
    }
}
