//! HTTP client for the embedding service.
//!
//! Endpoints:
//! - `POST /embed/image` `{"image": "<base64 jpeg>"}` → `{"embedding": [f32]}`
//! - `POST /embed/text` `{"texts": [str]}` → `{"embeddings": [[f32]]}`
//! - `GET /health` → `{"status": "ok"}`

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use image::imageops::FilterType;
use image::{DynamicImage, ImageOutputFormat};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::VisionBackend;
use crate::error::{MlError, MlResult};

/// Configuration for the vision client.
#[derive(Debug, Clone)]
pub struct VisionClientConfig {
    /// Base URL of the embedding service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Square edge images are resized to before upload
    pub image_size: u32,
}

impl Default for VisionClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(30),
            image_size: 224,
        }
    }
}

impl VisionClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("VISION_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:8001".to_string()),
            timeout: Duration::from_secs(
                std::env::var("VISION_SERVICE_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            image_size: std::env::var("VISION_IMAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(224),
        }
    }
}

#[derive(Debug, Serialize)]
struct ImageRequest {
    image: String,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct TextResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// Client for the embedding service.
pub struct VisionClient {
    http: Client,
    config: VisionClientConfig,
}

impl VisionClient {
    /// Create a new vision client.
    pub fn new(config: VisionClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> MlResult<Self> {
        Self::new(VisionClientConfig::from_env())
    }

    /// Check if the embedding service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url);

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("Vision service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("Vision service health check error: {}", e);
                Ok(false)
            }
        }
    }

    async fn post_json<Req, Resp>(&self, path: &str, body: &Req) -> MlResult<Resp>
    where
        Req: Serialize + ?Sized,
        Resp: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.config.base_url, path);
        debug!("Sending embedding request to {}", url);

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| MlError::from_transport(e, self.config.timeout))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::from_http_status(status, body));
        }

        response
            .json()
            .await
            .map_err(|e| MlError::InvalidResponse(format!("Malformed embedding response: {}", e)))
    }
}

/// Resize and JPEG-encode an image for upload.
fn encode_image(image: &DynamicImage, size: u32) -> MlResult<String> {
    let resized = image.resize_exact(size, size, FilterType::Triangle).to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(resized)
        .write_to(&mut buf, ImageOutputFormat::Jpeg(90))
        .map_err(|e| MlError::RequestFailed(format!("Failed to encode image: {}", e)))?;
    Ok(base64::engine::general_purpose::STANDARD.encode(buf.into_inner()))
}

#[async_trait]
impl VisionBackend for VisionClient {
    async fn embed_image(&self, image: &DynamicImage) -> MlResult<Vec<f32>> {
        let image = image.clone();
        let size = self.config.image_size;
        let encoded = tokio::task::spawn_blocking(move || encode_image(&image, size))
            .await
            .map_err(|e| MlError::RequestFailed(format!("Image encode task failed: {}", e)))??;

        let response: ImageResponse = self
            .post_json("/embed/image", &ImageRequest { image: encoded })
            .await?;

        if response.embedding.is_empty() {
            return Err(MlError::InvalidResponse("Empty image embedding".to_string()));
        }
        Ok(response.embedding)
    }

    async fn embed_text(&self, texts: &[String]) -> MlResult<Vec<Vec<f32>>> {
        let response: TextResponse = self.post_json("/embed/text", &TextRequest { texts }).await?;

        if response.embeddings.len() != texts.len() {
            return Err(MlError::InvalidResponse(format!(
                "Expected {} text embeddings, got {}",
                texts.len(),
                response.embeddings.len()
            )));
        }
        Ok(response.embeddings)
    }

    fn name(&self) -> &'static str {
        "vision-http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> VisionClient {
        VisionClient::new(VisionClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            image_size: 16,
        })
        .unwrap()
    }

    #[test]
    fn test_config_defaults() {
        let config = VisionClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.image_size, 224);
    }

    #[tokio::test]
    async fn test_embed_text_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed/text"))
            .and(body_partial_json(json!({"texts": ["run", "walk"]})))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"embeddings": [[1.0, 0.0], [0.0, 1.0]]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let texts = vec!["run".to_string(), "walk".to_string()];
        let embeddings = client_for(&server).embed_text(&texts).await.unwrap();
        assert_eq!(embeddings, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn test_embed_text_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed/text"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embeddings": [[1.0]]})))
            .mount(&server)
            .await;

        let texts = vec!["run".to_string(), "walk".to_string()];
        let err = client_for(&server).embed_text(&texts).await.unwrap_err();
        assert!(matches!(err, MlError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_embed_image() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed/image"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.5, 0.5, 0.0]})),
            )
            .mount(&server)
            .await;

        let image = DynamicImage::ImageRgb8(image::RgbImage::new(32, 24));
        let embedding = client_for(&server).embed_image(&image).await.unwrap();
        assert_eq!(embedding.len(), 3);
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed/image"))
            .respond_with(ResponseTemplate::new(503).set_body_string("warming up"))
            .mount(&server)
            .await;

        let image = DynamicImage::ImageRgb8(image::RgbImage::new(4, 4));
        let err = client_for(&server).embed_image(&image).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        assert!(client_for(&server).health_check().await.unwrap());
    }
}
