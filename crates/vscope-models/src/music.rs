//! Music recognition outcomes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A recognized commercial track.
///
/// Fields may be empty when the recognition service matched a recording
/// without metadata; that is still a match, unlike [`MusicMatch::NoMatch`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
pub struct TrackMatch {
    pub title: String,
    pub artist: String,
}

impl TrackMatch {
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
        }
    }
}

/// Outcome of the fingerprint stage.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MusicMatch {
    /// The service recognized a track
    Matched(TrackMatch),
    /// The service answered and found nothing, or there was no audio to send
    #[default]
    NoMatch,
    /// The service could not be reached or did not answer in time
    Unavailable { reason: String },
}

impl MusicMatch {
    /// Returns the matched track, if any.
    pub fn track(&self) -> Option<&TrackMatch> {
        match self {
            Self::Matched(track) => Some(track),
            _ => None,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, Self::Matched(_))
    }

    /// Human-readable form used in prompts: `"Title" by Artist` or `none`.
    pub fn describe(&self) -> String {
        match self {
            Self::Matched(track) => {
                let title = if track.title.is_empty() { "unknown title" } else { &track.title };
                let artist = if track.artist.is_empty() { "unknown artist" } else { &track.artist };
                format!("\"{}\" by {}", title, artist)
            }
            Self::NoMatch | Self::Unavailable { .. } => "none".to_string(),
        }
    }
}
