//! Music recognition client.
//!
//! The service accepts a WAV body on `POST /recognize` and answers in the
//! Shazam result shape: `{"track": {"title": "...", "subtitle": "..."}}`
//! where `subtitle` is the artist. A response without `track` is a clean
//! "no match".

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;
use vscope_models::TrackMatch;

use crate::backend::FingerprintBackend;
use crate::error::{MlError, MlResult};

#[derive(Debug, Clone)]
pub struct FingerprintClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl Default for FingerprintClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8003".to_string(),
            api_key: None,
            timeout: Duration::from_secs(20),
        }
    }
}

impl FingerprintClientConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("FINGERPRINT_SERVICE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("FINGERPRINT_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout: std::env::var("VSCOPE_FINGERPRINT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    track: Option<TrackPayload>,
}

#[derive(Debug, Deserialize)]
struct TrackPayload {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    subtitle: Option<String>,
}

impl From<TrackPayload> for TrackMatch {
    fn from(t: TrackPayload) -> Self {
        TrackMatch::new(
            t.title.unwrap_or_default().trim(),
            t.subtitle.unwrap_or_default().trim(),
        )
    }
}

/// HTTP client for the fingerprint service.
pub struct FingerprintClient {
    http: Client,
    config: FingerprintClientConfig,
}

impl FingerprintClient {
    pub fn new(config: FingerprintClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> MlResult<Self> {
        Self::new(FingerprintClientConfig::from_env())
    }
}

#[async_trait]
impl FingerprintBackend for FingerprintClient {
    async fn recognize(&self, audio: &Path) -> MlResult<Option<TrackMatch>> {
        let bytes = tokio::fs::read(audio).await?;
        let url = format!("{}/recognize", self.config.base_url);
        debug!(url = %url, bytes = bytes.len(), "Submitting audio fingerprint");

        let mut request = self
            .http
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(bytes);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| MlError::from_transport(e, self.config.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::from_http_status(status, body));
        }

        let parsed: RecognizeResponse = response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(format!("Malformed recognition result: {}", e)))?;

        Ok(parsed.track.map(TrackMatch::from))
    }

    fn name(&self) -> &'static str {
        "fingerprint-http"
    }
}
