//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;
use vscope_models::{SamplingInterval, Vocabulary};

/// Analyzer configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Parent directory for per-run temporary workspaces
    pub work_dir: PathBuf,
    /// Sampling interval used when the caller does not pass one
    pub sampling_interval: SamplingInterval,
    /// Upper bound on sampled frames per run
    pub max_frames: u32,
    /// Ordered label vocabulary
    pub vocabulary: Vocabulary,
    /// Timeout for each FFmpeg invocation
    pub media_timeout: Duration,
    /// Timeout for each speech backend call
    pub transcribe_timeout: Duration,
    /// Timeout for each fingerprint backend call
    pub fingerprint_timeout: Duration,
    /// Timeout for each generative backend call
    pub synthesis_timeout: Duration,
    /// Delay before the single retry of an external call
    pub retry_delay: Duration,
    /// Concurrent runs in batch mode
    pub max_concurrent_runs: usize,
    /// JSON-lines record file; records stay in memory when unset
    pub store_path: Option<PathBuf>,
    /// Port for the Prometheus exporter; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/vscope"),
            sampling_interval: SamplingInterval::default(),
            max_frames: 120,
            vocabulary: Vocabulary::default(),
            media_timeout: Duration::from_secs(600),
            transcribe_timeout: Duration::from_secs(300),
            fingerprint_timeout: Duration::from_secs(20),
            synthesis_timeout: Duration::from_secs(60),
            retry_delay: Duration::from_millis(500),
            max_concurrent_runs: 4,
            store_path: None,
            metrics_port: None,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let sampling_interval = env_parse::<f64>("VSCOPE_FRAME_INTERVAL_SECS")
            .map(SamplingInterval::Seconds)
            .filter(|interval| interval.validate().is_ok())
            .unwrap_or(defaults.sampling_interval);

        let vocabulary = match std::env::var("VSCOPE_LABELS") {
            Ok(csv) => Vocabulary::from_csv(&csv).unwrap_or_else(|e| {
                warn!("Ignoring VSCOPE_LABELS: {}", e);
                Vocabulary::default()
            }),
            Err(_) => defaults.vocabulary,
        };

        Self {
            work_dir: std::env::var("VSCOPE_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            sampling_interval,
            max_frames: env_parse::<u32>("VSCOPE_MAX_FRAMES")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_frames),
            vocabulary,
            media_timeout: env_parse("VSCOPE_MEDIA_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.media_timeout),
            transcribe_timeout: env_parse("VSCOPE_TRANSCRIBE_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.transcribe_timeout),
            fingerprint_timeout: env_parse("VSCOPE_FINGERPRINT_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.fingerprint_timeout),
            synthesis_timeout: env_parse("VSCOPE_SYNTHESIS_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(defaults.synthesis_timeout),
            retry_delay: env_parse("VSCOPE_RETRY_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry_delay),
            max_concurrent_runs: env_parse::<usize>("VSCOPE_MAX_CONCURRENT_RUNS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_runs),
            store_path: std::env::var("VSCOPE_STORE_PATH")
                .ok()
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
            metrics_port: env_parse("METRICS_PORT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.sampling_interval, SamplingInterval::Seconds(2.0));
        assert_eq!(config.max_frames, 120);
        assert_eq!(config.vocabulary.len(), 15);
        assert_eq!(config.fingerprint_timeout, Duration::from_secs(20));
        assert!(config.store_path.is_none());
    }
}
