//! Analysis result data models.
//!
//! An [`AnalysisResult`] is the terminal record of one pipeline run. It is
//! assembled exactly once by the orchestrator and never mutated afterwards;
//! renames and deletes belong to the persistence layer.

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::music::MusicMatch;
use crate::stage::StageName;

/// Unique identifier for an analysis.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct AnalysisId(pub String);

impl AnalysisId {
    /// Generate a new random analysis ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for AnalysisId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque caller identity. The core never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Virality score, always within `0..=100`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(try_from = "i64", into = "u8")]
pub struct ViralityScore(u8);

impl ViralityScore {
    /// Upper bound (inclusive).
    pub const MAX: u8 = 100;

    /// Score used whenever synthesis cannot produce a valid value.
    pub const FALLBACK: ViralityScore = ViralityScore(0);

    /// Validate a raw score.
    pub fn new(value: i64) -> ModelResult<Self> {
        if (0..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(ModelError::ScoreOutOfRange(value))
        }
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for ViralityScore {
    type Error = ModelError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ViralityScore> for u8 {
    fn from(score: ViralityScore) -> Self {
        score.0
    }
}

impl fmt::Display for ViralityScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Number of sampled frames that voted for a label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActionCount {
    pub label: String,
    pub frames: u32,
}

/// The terminal analysis of one uploaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisResult {
    /// Unique identifier for this analysis (UUID)
    pub id: AnalysisId,

    /// Caller who uploaded the video
    pub owner: OwnerId,

    /// Display title
    pub title: String,

    /// When the analysis was created
    pub created_at: DateTime<Utc>,

    /// Majority-vote visual label, `"unknown"` when no frame was classified
    pub representative_action: String,

    /// Per-label frame counts, most frequent first
    pub action_breakdown: Vec<ActionCount>,

    /// Number of frames that produced a label vote
    pub frame_count: u32,

    /// Spoken-language transcript, empty when no speech was detected
    pub transcript: String,

    /// Recognized music track, if any
    pub music_match: MusicMatch,

    /// Virality score
    pub score: ViralityScore,

    /// Explanation produced by the generative backend
    pub explanation: String,

    /// Original upload filename
    pub filename: String,

    /// Stages that fell back to placeholder data
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degraded_stages: Vec<StageName>,
}

impl AnalysisResult {
    /// Creation date formatted as `YYYY-MM-DD`.
    pub fn date(&self) -> String {
        self.created_at.format("%Y-%m-%d").to_string()
    }

    /// Returns true if any stage produced placeholder data.
    pub fn is_degraded(&self) -> bool {
        !self.degraded_stages.is_empty()
    }
}

/// The flat row handed to the persistence layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AnalysisRecord {
    pub id: AnalysisId,
    pub owner: OwnerId,
    pub title: String,
    pub date: String,
    pub explanation: String,
    pub filename: String,
    pub score: ViralityScore,
}

impl From<&AnalysisResult> for AnalysisRecord {
    fn from(result: &AnalysisResult) -> Self {
        Self {
            id: result.id.clone(),
            owner: result.owner.clone(),
            title: result.title.clone(),
            date: result.date(),
            explanation: result.explanation.clone(),
            filename: result.filename.clone(),
            score: result.score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_result() -> AnalysisResult {
        AnalysisResult {
            id: AnalysisId::from_string("a-1"),
            owner: OwnerId::new("user_1"),
            title: "clip".to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 6, 3, 12, 0, 0).unwrap(),
            representative_action: "a dog playing".to_string(),
            action_breakdown: vec![ActionCount {
                label: "a dog playing".to_string(),
                frames: 3,
            }],
            frame_count: 3,
            transcript: String::new(),
            music_match: MusicMatch::NoMatch,
            score: ViralityScore::new(72).unwrap(),
            explanation: "Dogs do well".to_string(),
            filename: "clip.mp4".to_string(),
            degraded_stages: vec![],
        }
    }

    #[test]
    fn test_score_bounds() {
        assert_eq!(ViralityScore::new(0).unwrap().value(), 0);
        assert_eq!(ViralityScore::new(100).unwrap().value(), 100);
        assert_eq!(ViralityScore::new(101), Err(ModelError::ScoreOutOfRange(101)));
        assert_eq!(ViralityScore::new(-1), Err(ModelError::ScoreOutOfRange(-1)));
    }

    #[test]
    fn test_score_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<ViralityScore>("55").is_ok());
        assert!(serde_json::from_str::<ViralityScore>("101").is_err());
        assert!(serde_json::from_str::<ViralityScore>("-3").is_err());
    }

    #[test]
    fn test_record_from_result() {
        let result = sample_result();
        let record = AnalysisRecord::from(&result);

        assert_eq!(record.id, result.id);
        assert_eq!(record.date, "2025-06-03");
        assert_eq!(record.score.value(), 72);
        assert_eq!(record.filename, "clip.mp4");
    }

    #[test]
    fn test_degraded_stages_skipped_when_empty() {
        let json = serde_json::to_value(sample_result()).unwrap();
        assert!(json.get("degraded_stages").is_none());
        assert!(!sample_result().is_degraded());
    }
}
