//! Worker error types.
//!
//! Only [`WorkerError::Input`] and [`WorkerError::Fatal`] ever leave
//! [`Analyzer::analyze`](crate::Analyzer::analyze). Stage-level errors from the
//! media, backend and store crates are absorbed into degraded results.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Analysis failed: {0}")]
    Fatal(String),

    #[error("Media error: {0}")]
    Media(#[from] vscope_media::MediaError),

    #[error("Backend error: {0}")]
    Backend(#[from] vscope_ml_client::MlError),

    #[error("Store error: {0}")]
    Store(#[from] vscope_store::StoreError),

    #[error("Model error: {0}")]
    Model(#[from] vscope_models::ModelError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Rejected upload; nothing was attempted.
    pub fn is_input_error(&self) -> bool {
        matches!(self, WorkerError::Input(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(WorkerError::input("empty upload").is_input_error());
        assert!(!WorkerError::fatal("disk full").is_input_error());
    }

    #[test]
    fn test_stage_errors_are_fatal() {
        let io = WorkerError::from(std::io::Error::new(std::io::ErrorKind::Other, "no space"));
        assert!(!io.is_input_error());
        assert!(io.to_string().contains("no space"));
    }
}
