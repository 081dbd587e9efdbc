//! Backend capability traits.

use std::path::Path;

use async_trait::async_trait;
use image::DynamicImage;
use vscope_models::TrackMatch;

use crate::error::MlResult;

/// Joint image/text embedding model (CLIP-style).
#[async_trait]
pub trait VisionBackend: Send + Sync {
    /// Embed a single image.
    async fn embed_image(&self, image: &DynamicImage) -> MlResult<Vec<f32>>;

    /// Embed a batch of strings, one vector per input, in input order.
    async fn embed_text(&self, texts: &[String]) -> MlResult<Vec<Vec<f32>>>;

    /// Backend name for logging.
    fn name(&self) -> &'static str;
}

/// Speech-to-text model.
#[async_trait]
pub trait SpeechBackend: Send + Sync {
    /// Transcribe an audio file. Silence yields an empty string.
    async fn transcribe(&self, audio: &Path) -> MlResult<String>;

    fn name(&self) -> &'static str;
}

/// Remote music recognition service.
#[async_trait]
pub trait FingerprintBackend: Send + Sync {
    /// Recognize a track. `Ok(None)` means the service answered with no match.
    async fn recognize(&self, audio: &Path) -> MlResult<Option<TrackMatch>>;

    fn name(&self) -> &'static str;
}

/// Generative text model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a prompt, returning the raw model text.
    async fn complete(&self, prompt: &str) -> MlResult<String>;

    fn name(&self) -> &'static str;
}
