//! Bounded retry for external calls.
//!
//! External backends get at most one extra attempt, and only for errors the
//! caller classifies as transient.

use std::future::Future;
use std::time::Duration;

use tracing::debug;
use vscope_ml_client::{MlError, MlResult};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(5),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(2u32.pow(exp)).min(self.max_delay)
    }
}

/// Result of a retried operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    Success(T),
    /// Operation failed; `attempts` counts the initial call.
    Failed { error: E, attempts: u32 },
}

/// Execute an async operation, retrying while `should_retry` accepts the error.
///
/// ```ignore
/// let config = RetryConfig::new("fingerprint").with_max_retries(1);
/// let result = retry_async(&config, || client.recognize(path), MlError::is_retryable).await;
/// ```
pub async fn retry_async<F, Fut, T, E, P>(
    config: &RetryConfig,
    operation: F,
    should_retry: P,
) -> RetryResult<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) if attempt < config.max_retries && should_retry(&e) => {
                attempt += 1;
                let delay = config.delay_for_attempt(attempt);
                debug!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt + 1,
                }
            }
        }
    }
}

/// Bound a backend call, turning an elapsed deadline into [`MlError::Timeout`].
pub async fn with_timeout<T, Fut>(timeout: Duration, call: Fut) -> MlResult<T>
where
    Fut: Future<Output = MlResult<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(MlError::Timeout(timeout.as_secs())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_retries: u32) -> RetryConfig {
        RetryConfig::new("test")
            .with_max_retries(max_retries)
            .with_base_delay(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_retries_transient_once() {
        let calls = AtomicU32::new(0);
        let result = retry_async(
            &fast(1),
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("transient")
                } else {
                    Ok(42)
                }
            },
            |_| true,
        )
        .await;

        assert!(matches!(result, RetryResult::Success(42)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_gives_up_after_bound() {
        let calls = AtomicU32::new(0);
        let result: RetryResult<(), &str> = retry_async(
            &fast(1),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("down")
            },
            |_| true,
        )
        .await;

        match result {
            RetryResult::Failed { attempts, .. } => assert_eq!(attempts, 2),
            RetryResult::Success(_) => panic!("expected failure"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: RetryResult<(), &str> = retry_async(
            &fast(3),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("timeout")
            },
            |e| *e != "timeout",
        )
        .await;

        assert!(matches!(result, RetryResult::Failed { attempts: 1, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_timeout_maps_elapsed() {
        let result: MlResult<()> = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(MlError::Timeout(_))));
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig::new("x").with_base_delay(Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(10), Duration::from_secs(5));
    }
}
