//! Engine error types
//!
//! These cover setup problems (configuration, transport construction,
//! fallback dataset). Backend trouble at request time is never an `Err`:
//! it is classified into a [`FailureRecord`](crate::FailureRecord) and
//! attached to the snapshot or page state.

use thiserror::Error;

/// Error category for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// `riskboard.toml` or env misconfigured
    ConfigError,
    /// HTTP client could not be built
    TransportError,
    /// Fallback dataset unreadable or malformed
    FallbackError,
}

impl ErrorCategory {
    /// Machine-readable code for logging
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ConfigError => "CONFIG_ERROR",
            Self::TransportError => "TRANSPORT_ERROR",
            Self::FallbackError => "FALLBACK_ERROR",
        }
    }
}

type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("config error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("transport error: {message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },

    #[error("fallback dataset error: {message}")]
    Fallback {
        message: String,
        #[source]
        source: Option<BoxedSource>,
    },
}

impl SyncError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config { .. } => ErrorCategory::ConfigError,
            Self::Transport { .. } => ErrorCategory::TransportError,
            Self::Fallback { .. } => ErrorCategory::FallbackError,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    pub fn config_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn transport_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn fallback_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Fallback {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for engine setup operations
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_codes_are_stable() {
        assert_eq!(SyncError::config("x").category().as_str(), "CONFIG_ERROR");
        let refused = std::io::Error::other("no tls backend");
        assert_eq!(
            SyncError::transport_with_source("client", refused)
                .category()
                .as_str(),
            "TRANSPORT_ERROR"
        );
        let io = std::io::Error::other("boom");
        let err = SyncError::fallback_with_source("bad dataset", io);
        assert_eq!(err.category(), ErrorCategory::FallbackError);
        assert_eq!(err.to_string(), "fallback dataset error: bad dataset");
    }
}
