//! Shared data models for the ViralScope analyzer.
//!
//! This crate provides Serde-serializable types for:
//! - Analysis identifiers and the terminal analysis record
//! - Per-frame label votes and the label vocabulary
//! - Music recognition outcomes
//! - Pipeline stages and sampling configuration

pub mod analysis;
pub mod error;
pub mod music;
pub mod sampling;
pub mod stage;
pub mod vocabulary;

// Re-export common types
pub use analysis::{ActionCount, AnalysisId, AnalysisRecord, AnalysisResult, OwnerId, ViralityScore};
pub use error::{ModelError, ModelResult};
pub use music::{MusicMatch, TrackMatch};
pub use sampling::{LabelVote, SamplingInterval};
pub use stage::{RunStage, StageName};
pub use vocabulary::{Vocabulary, DEFAULT_LABELS, UNKNOWN_ACTION};
