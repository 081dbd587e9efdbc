//! Speech transcription stage.

use std::sync::Arc;
use std::time::Duration;

use vscope_media::AudioAsset;
use vscope_ml_client::{MlError, SpeechBackend};

use crate::retry::{retry_async, with_timeout, RetryConfig, RetryResult};
use crate::stage::StageOutcome;

/// Best-effort transcript of an audio asset.
pub struct Transcriber {
    backend: Arc<dyn SpeechBackend>,
    timeout: Duration,
    retry: RetryConfig,
}

impl Transcriber {
    pub fn new(backend: Arc<dyn SpeechBackend>, timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            backend,
            timeout,
            retry: RetryConfig::new("transcription").with_base_delay(retry_delay),
        }
    }

    /// Transcribe `audio`. Missing audio is an empty transcript; backend
    /// failures degrade to an empty transcript after one retry.
    pub async fn transcribe(&self, audio: &AudioAsset) -> StageOutcome<String> {
        let Some(path) = audio.path() else {
            return StageOutcome::Ok(String::new());
        };

        let result = retry_async(
            &self.retry,
            || with_timeout(self.timeout, self.backend.transcribe(path)),
            |e: &MlError| e.is_retryable() || e.is_timeout(),
        )
        .await;

        match result {
            RetryResult::Success(text) => StageOutcome::Ok(text.trim().to_string()),
            RetryResult::Failed { error, attempts } => StageOutcome::degraded(
                String::new(),
                format!(
                    "{} transcription failed after {} attempt(s): {}",
                    self.backend.name(),
                    attempts,
                    error
                ),
            ),
        }
    }
}
