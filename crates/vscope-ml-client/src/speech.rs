//! Speech-to-text client.
//!
//! Speaks the OpenAI-compatible transcription protocol
//! (`POST /v1/audio/transcriptions`, multipart `file` + `model`), which is
//! what hosted Whisper and most self-hosted Whisper servers expose.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::backend::SpeechBackend;
use crate::error::{MlError, MlResult};

/// Configuration for the speech client.
#[derive(Debug, Clone)]
pub struct SpeechClientConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Optional language hint (ISO-639-1)
    pub language: Option<String>,
    pub timeout: Duration,
}

impl Default for SpeechClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8002".to_string(),
            api_key: None,
            model: "whisper-1".to_string(),
            language: None,
            timeout: Duration::from_secs(300),
        }
    }
}

impl SpeechClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("SPEECH_SERVICE_URL").unwrap_or(defaults.base_url),
            api_key: std::env::var("SPEECH_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("SPEECH_MODEL").unwrap_or(defaults.model),
            language: std::env::var("SPEECH_LANGUAGE").ok().filter(|l| !l.is_empty()),
            timeout: std::env::var("VSCOPE_TRANSCRIBE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

/// HTTP speech-to-text client.
pub struct SpeechClient {
    http: Client,
    config: SpeechClientConfig,
}

impl SpeechClient {
    pub fn new(config: SpeechClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> MlResult<Self> {
        Self::new(SpeechClientConfig::from_env())
    }
}

#[async_trait]
impl SpeechBackend for SpeechClient {
    async fn transcribe(&self, audio: &Path) -> MlResult<String> {
        let bytes = tokio::fs::read(audio).await?;
        let file_name = audio
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();

        let file = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/wav")
            .map_err(MlError::Network)?;

        let mut form = Form::new()
            .text("model", self.config.model.clone())
            .text("response_format", "json")
            .part("file", file);
        if let Some(language) = &self.config.language {
            form = form.text("language", language.clone());
        }

        let url = format!("{}/v1/audio/transcriptions", self.config.base_url);
        debug!(url = %url, model = %self.config.model, "Submitting audio for transcription");

        let mut request = self.http.post(&url).multipart(form);
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

        let parsed: TranscriptionResponse = response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(format!("Malformed transcription: {}", e)))?;

        Ok(parsed.text.trim().to_string())
    }

    fn name(&self) -> &'static str {
        "speech-http"
    }
}
