//! Pipeline run stages.
//!
//! A run moves strictly forward through [`RunStage`]; `Errored` is absorbing
//! and reachable from every non-terminal stage.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// State of a single analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    /// Upload accepted, video persisted to the run workspace
    #[default]
    Received,
    FramesExtracted,
    Classified,
    AudioExtracted,
    Transcribed,
    MusicMatched,
    Synthesized,
    Persisted,
    Done,
    Errored,
}

impl RunStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::FramesExtracted => "frames_extracted",
            Self::Classified => "classified",
            Self::AudioExtracted => "audio_extracted",
            Self::Transcribed => "transcribed",
            Self::MusicMatched => "music_matched",
            Self::Synthesized => "synthesized",
            Self::Persisted => "persisted",
            Self::Done => "done",
            Self::Errored => "errored",
        }
    }

    /// The only stage that may follow this one on the success path.
    pub fn next(&self) -> Option<RunStage> {
        match self {
            Self::Received => Some(Self::FramesExtracted),
            Self::FramesExtracted => Some(Self::Classified),
            Self::Classified => Some(Self::AudioExtracted),
            Self::AudioExtracted => Some(Self::Transcribed),
            Self::Transcribed => Some(Self::MusicMatched),
            Self::MusicMatched => Some(Self::Synthesized),
            Self::Synthesized => Some(Self::Persisted),
            Self::Persisted => Some(Self::Done),
            Self::Done | Self::Errored => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Errored)
    }

    /// Validate and perform a transition.
    pub fn transition(self, to: RunStage) -> ModelResult<RunStage> {
        let allowed = match to {
            Self::Errored => !self.is_terminal(),
            _ => self.next() == Some(to),
        };

        if allowed {
            Ok(to)
        } else {
            Err(ModelError::InvalidTransition {
                from: self.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name of a pipeline stage that can degrade without failing the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    FrameSampling,
    Classification,
    AudioExtraction,
    Transcription,
    MusicMatching,
    Synthesis,
    Persistence,
}

impl StageName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrameSampling => "frame_sampling",
            Self::Classification => "classification",
            Self::AudioExtraction => "audio_extraction",
            Self::Transcription => "transcription",
            Self::MusicMatching => "music_matching",
            Self::Synthesis => "synthesis",
            Self::Persistence => "persistence",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
