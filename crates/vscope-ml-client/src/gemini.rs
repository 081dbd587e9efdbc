//! Gemini text generation client.
//!
//! Tries each configured model in order and returns the raw text of the first
//! successful completion. JSON extraction is left to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::TextGenerator;
use crate::error::{MlError, MlResult};

const DEFAULT_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-flash-lite", "gemini-2.5-pro"];

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// Models in fallback order
    pub models: Vec<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Create config from environment variables. `GEMINI_API_KEY` is required.
    pub fn from_env() -> MlResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| MlError::Config("GEMINI_API_KEY not set".to_string()))?;

        let mut config = Self::new(api_key);
        if let Ok(models) = std::env::var("GEMINI_MODELS") {
            let models: Vec<String> = models
                .split(',')
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect();
            if !models.is_empty() {
                config.models = models;
            }
        }
        if let Ok(url) = std::env::var("GEMINI_BASE_URL") {
            config.base_url = url;
        }
        if let Some(secs) = std::env::var("VSCOPE_SYNTHESIS_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
        {
            config.timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: String,
}

/// Gemini API client.
pub struct GeminiClient {
    http: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> MlResult<Self> {
        if config.models.is_empty() {
            return Err(MlError::Config("No Gemini models configured".to_string()));
        }
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> MlResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    async fn call_model(&self, model: &str, prompt: &str) -> MlResult<String> {
        let url = format!("{}/models/{}:generateContent", self.config.base_url, model);

        let request = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
            },
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| MlError::from_transport(e, self.config.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::from_http_status(status, body));
        }

        let parsed: GeminiResponse = response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(format!("Failed to parse Gemini response: {}", e)))?;

        parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| MlError::InvalidResponse("No content in Gemini response".to_string()))
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn complete(&self, prompt: &str) -> MlResult<String> {
        let mut last_error = None;

        for model in &self.config.models {
            info!("Attempting Gemini API with model: {}", model);
            match self.call_model(model, prompt).await {
                Ok(text) => {
                    info!("Got completion from {}", model);
                    return Ok(text);
                }
                Err(e) => {
                    warn!("Failed with model {}: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| MlError::ServiceUnavailable("All Gemini models failed".to_string())))
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, models: &[&str]) -> GeminiClient {
        let mut config = GeminiConfig::new("test-key");
        config.base_url = server.uri();
        config.models = models.iter().map(|m| m.to_string()).collect();
        config.timeout = Duration::from_secs(5);
        GeminiClient::new(config).unwrap()
    }

    fn completion(text: &str) -> serde_json::Value {
        json!({"candidates": [{"content": {"parts": [{"text": text}]}}]})
    }

    #[tokio::test]
    async fn test_complete_returns_raw_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/m1:generateContent"))
            .and(query_param("key", "test-key"))
            .and(body_partial_json(
                json!({"generationConfig": {"responseMimeType": "application/json"}}),
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(completion("```json\n{\"score\": 7}\n```")),
            )
            .mount(&server)
            .await;

        let text = client_for(&server, &["m1"]).complete("prompt").await.unwrap();
        assert_eq!(text, "```json\n{\"score\": 7}\n```");
    }

    #[tokio::test]
    async fn test_falls_back_to_next_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/m1:generateContent"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/models/m2:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("ok")))
            .expect(1)
            .mount(&server)
            .await;

        let text = client_for(&server, &["m1", "m2"]).complete("p").await.unwrap();
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_all_models_fail_returns_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client_for(&server, &["m1", "m2"]).complete("p").await.unwrap_err();
        assert!(matches!(err, MlError::ServiceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_candidates_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"candidates": []})))
            .mount(&server)
            .await;

        let err = client_for(&server, &["m1"]).complete("p").await.unwrap_err();
        assert!(matches!(err, MlError::InvalidResponse(_)));
    }

    #[test]
    fn test_empty_model_list_rejected() {
        let mut config = GeminiConfig::new("k");
        config.models.clear();
        assert!(matches!(GeminiClient::new(config), Err(MlError::Config(_))));
    }
}
