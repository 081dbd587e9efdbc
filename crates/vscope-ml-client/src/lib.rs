//! Clients for the external model backends.
//!
//! Each backend is exposed as a capability trait so the analysis pipeline
//! can run against HTTP services in production and in-process stubs in tests:
//! - [`VisionBackend`]: image and text embeddings
//! - [`SpeechBackend`]: speech-to-text
//! - [`FingerprintBackend`]: music recognition
//! - [`TextGenerator`]: generative text completion

pub mod backend;
pub mod error;
pub mod fingerprint;
pub mod gemini;
pub mod speech;
pub mod vision;

pub use backend::{FingerprintBackend, SpeechBackend, TextGenerator, VisionBackend};
pub use error::{MlError, MlResult};
pub use fingerprint::{FingerprintClient, FingerprintClientConfig};
pub use gemini::{GeminiClient, GeminiConfig};
pub use speech::{SpeechClient, SpeechClientConfig};
pub use vision::{VisionClient, VisionClientConfig};
