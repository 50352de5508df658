//! Provider error taxonomy.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a failed call is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Network trouble, timeouts, rate limits, 5xx.
    Transient,
    /// Bad input, unsupported operations, other 4xx.
    Permanent,
}

/// Errors returned by provider backends.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProviderError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("provider unavailable ({status}): {message}")]
    Unavailable { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("unsupported operation: {0}")]
    Unsupported(String),

    #[error("failed to decode provider response: {0}")]
    Decode(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl ProviderError {
    /// Map a non-success HTTP status to an error.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            429 => ProviderError::RateLimited(message),
            408 | 500..=599 => ProviderError::Unavailable { status, message },
            _ => ProviderError::Rejected { status, message },
        }
    }

    /// Map a reqwest failure (no response received).
    pub fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(timeout)
        } else if err.is_decode() {
            ProviderError::Decode(err.to_string())
        } else {
            ProviderError::Transport(err.to_string())
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::Timeout(_)
            | ProviderError::RateLimited(_)
            | ProviderError::Unavailable { .. }
            | ProviderError::Transport(_) => ErrorClass::Transient,
            ProviderError::Rejected { .. }
            | ProviderError::InvalidRequest(_)
            | ProviderError::Unsupported(_)
            | ProviderError::Decode(_)
            | ProviderError::NotConfigured(_) => ErrorClass::Permanent,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.class() == ErrorClass::Transient
    }

    /// Short machine-readable kind stored on failed jobs.
    pub fn kind(&self) -> &'static str {
        match self {
            ProviderError::Timeout(_) => "timeout",
            ProviderError::RateLimited(_) => "rate_limited",
            ProviderError::Unavailable { .. } => "unavailable",
            ProviderError::Transport(_) => "transport",
            ProviderError::Rejected { .. } => "rejected",
            ProviderError::InvalidRequest(_) => "invalid_request",
            ProviderError::Unsupported(_) => "unsupported",
            ProviderError::Decode(_) => "decode",
            ProviderError::NotConfigured(_) => "not_configured",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_classification() {
        assert!(ProviderError::from_status(429, "slow down").is_transient());
        assert!(ProviderError::from_status(503, "down").is_transient());
        assert!(ProviderError::from_status(500, "boom").is_transient());
        assert!(ProviderError::from_status(408, "timeout").is_transient());

        let err = ProviderError::from_status(400, "bad image");
        assert_eq!(err.class(), ErrorClass::Permanent);
        assert_eq!(err.kind(), "rejected");

        assert!(!ProviderError::from_status(401, "bad key").is_transient());
        assert!(!ProviderError::from_status(404, "no model").is_transient());
    }

    #[test]
    fn test_error_display() {
        let err = ProviderError::from_status(429, "too many requests");
        assert_eq!(err.to_string(), "rate limited: too many requests");

        let err = ProviderError::Timeout(Duration::from_secs(30));
        assert_eq!(err.to_string(), "request timed out after 30s");
        assert_eq!(err.kind(), "timeout");
    }
}
