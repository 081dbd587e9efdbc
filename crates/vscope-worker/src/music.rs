//! Music recognition stage.
//!
//! Three outcomes are kept apart: the service answered with a track, the
//! service answered with nothing, and the service could not be used. Only
//! transport failures are retried, once; a timeout is final for the run.

use std::sync::Arc;
use std::time::Duration;

use vscope_media::AudioAsset;
use vscope_ml_client::{FingerprintBackend, MlError};
use vscope_models::MusicMatch;

use crate::retry::{retry_async, with_timeout, RetryConfig, RetryResult};
use crate::stage::StageOutcome;

pub struct FingerprintMatcher {
    backend: Arc<dyn FingerprintBackend>,
    timeout: Duration,
    retry: RetryConfig,
}

impl FingerprintMatcher {
    pub fn new(backend: Arc<dyn FingerprintBackend>, timeout: Duration, retry_delay: Duration) -> Self {
        Self {
            backend,
            timeout,
            retry: RetryConfig::new("fingerprint")
                .with_max_retries(1)
                .with_base_delay(retry_delay),
        }
    }

    pub async fn identify(&self, audio: &AudioAsset) -> StageOutcome<MusicMatch> {
        let Some(path) = audio.path() else {
            return StageOutcome::Ok(MusicMatch::NoMatch);
        };

        let result = retry_async(
            &self.retry,
            || with_timeout(self.timeout, self.backend.recognize(path)),
            MlError::is_retryable,
        )
        .await;

        match result {
            RetryResult::Success(Some(track)) => StageOutcome::Ok(MusicMatch::Matched(track)),
            RetryResult::Success(None) => StageOutcome::Ok(MusicMatch::NoMatch),
            RetryResult::Failed { error, attempts } => {
                let reason = format!(
                    "{} recognition failed after {} attempt(s): {}",
                    self.backend.name(),
                    attempts,
                    error
                );
                StageOutcome::degraded(
                    MusicMatch::Unavailable {
                        reason: error.to_string(),
                    },
                    reason,
                )
            }
        }
    }
}
