//! Model validation errors.

use thiserror::Error;

pub type ModelResult<T> = Result<T, ModelError>;

#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("Score {0} is outside 0..=100")]
    ScoreOutOfRange(i64),

    #[error("Vocabulary must contain at least one label")]
    EmptyVocabulary,

    #[error("Vocabulary label at index {0} is blank")]
    BlankLabel(usize),

    #[error("Invalid sampling interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid stage transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },
}
