//! Video virality analyzer.
//!
//! This crate provides:
//! - Zero-shot frame classification with a shared label embedding cache
//! - Majority-vote action aggregation
//! - Transcription and music recognition stages with bounded retry
//! - Insight synthesis that tolerates malformed model output
//! - The run orchestrator and its temporary workspace

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod music;
pub mod pipeline;
pub mod retry;
pub mod stage;
pub mod synthesizer;
pub mod transcriber;
pub mod workspace;

pub use aggregator::{representative_action, ActionSummary};
pub use classifier::{LabelEmbeddingCache, LabelIndex, VisualClassifier};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use logging::RunLogger;
pub use pipeline::{AnalyzeRequest, Analyzer, AnalyzerBackends};
pub use stage::StageOutcome;
pub use synthesizer::{SynthesisResponse, SYNTHESIS_UNAVAILABLE};
