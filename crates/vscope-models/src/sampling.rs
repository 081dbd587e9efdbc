//! Frame sampling configuration and per-frame label votes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// How far apart sampled frames are.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum SamplingInterval {
    /// Keep every Nth decoded frame
    Frames(u32),
    /// Keep one frame every N seconds of video
    Seconds(f64),
}

impl SamplingInterval {
    /// Default interval: one frame every two seconds.
    pub const DEFAULT_SECONDS: f64 = 2.0;

    /// Reject zero, negative and non-finite intervals.
    pub fn validate(&self) -> ModelResult<()> {
        match *self {
            Self::Frames(0) => Err(ModelError::InvalidInterval(
                "frame interval must be at least 1".to_string(),
            )),
            Self::Seconds(secs) if !secs.is_finite() || secs <= 0.0 => Err(
                ModelError::InvalidInterval(format!("time interval must be positive, got {}", secs)),
            ),
            _ => Ok(()),
        }
    }
}

impl Default for SamplingInterval {
    fn default() -> Self {
        Self::Seconds(Self::DEFAULT_SECONDS)
    }
}

/// One classified frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LabelVote {
    /// Position of the frame in the sampled sequence
    pub ordinal: u32,
    /// Best-fit vocabulary label
    pub label: String,
    /// Softmax probability of `label` (0.0-1.0)
    pub confidence: f32,
}

impl LabelVote {
    pub fn new(ordinal: u32, label: impl Into<String>, confidence: f32) -> Self {
        Self {
            ordinal,
            label: label.into(),
            confidence,
        }
    }
}
