//! ML client error types.

use std::time::Duration;

use thiserror::Error;

pub type MlResult<T> = Result<T, MlError>;

#[derive(Debug, Error)]
pub enum MlError {
    #[error("ML service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MlError {
    /// Map an HTTP status to an error.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            429 | 500..=599 => Self::ServiceUnavailable(format!("HTTP {}: {}", status, body)),
            _ => Self::RequestFailed(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Map a transport error, folding client-side timeouts into [`MlError::Timeout`].
    pub fn from_transport(error: reqwest::Error, timeout: Duration) -> Self {
        if error.is_timeout() {
            Self::Timeout(timeout.as_secs())
        } else {
            Self::Network(error)
        }
    }

    /// Transport failures worth one more attempt. Timeouts are not retried.
    pub fn is_retryable(&self) -> bool {
        match self {
            MlError::ServiceUnavailable(_) => true,
            MlError::Network(e) => !e.is_timeout(),
            _ => false,
        }
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            MlError::Timeout(_) => true,
            MlError::Network(e) => e.is_timeout(),
            _ => false,
        }
    }
}
