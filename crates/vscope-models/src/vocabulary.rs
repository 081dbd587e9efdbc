//! Visual content label vocabulary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Representative action reported when no frame produced a label.
pub const UNKNOWN_ACTION: &str = "unknown";

/// Built-in content labels, in vocabulary order.
pub const DEFAULT_LABELS: &[&str] = &[
    "a football match",
    "a basketball game",
    "a baseball game",
    "a cooking show",
    "a nature documentary",
    "a person giving a lecture",
    "a music concert",
    "a workout video",
    "a wedding",
    "a person running",
    "a dog playing",
    "a news broadcast",
    "a haunted house",
    "a sword fight",
    "a cosplay event",
];

/// Fixed, ordered list of textual labels.
///
/// Order matters: ties in classification go to the lowest index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Vocabulary(Vec<String>);

impl Vocabulary {
    /// Build a vocabulary, rejecting empty lists and blank labels.
    pub fn new<I, S>(labels: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let labels: Vec<String> = labels
            .into_iter()
            .map(|l| Into::<String>::into(l).trim().to_string())
            .collect();

        if labels.is_empty() {
            return Err(ModelError::EmptyVocabulary);
        }
        if let Some(index) = labels.iter().position(|l| l.is_empty()) {
            return Err(ModelError::BlankLabel(index));
        }

        Ok(Self(labels))
    }

    /// Parse a comma-separated list (e.g. from an environment variable).
    pub fn from_csv(csv: &str) -> ModelResult<Self> {
        Self::new(csv.split(',').filter(|s| !s.trim().is_empty()))
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self(DEFAULT_LABELS.iter().map(|l| l.to_string()).collect())
    }
}
