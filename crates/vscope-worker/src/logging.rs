//! Structured run logging.
//!
//! Every line logged through a [`RunLogger`] carries the analysis ID so one
//! run can be followed across stages when several runs are interleaved.

use tracing::{error, info, warn, Span};
use vscope_models::{AnalysisId, RunStage, StageName};

/// Per-run structured logger.
#[derive(Debug, Clone)]
pub struct RunLogger {
    analysis_id: String,
    filename: String,
}

impl RunLogger {
    pub fn new(analysis_id: &AnalysisId, filename: &str) -> Self {
        Self {
            analysis_id: analysis_id.to_string(),
            filename: filename.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            analysis_id = %self.analysis_id,
            filename = %self.filename,
            "Run started: {}", message
        );
    }

    /// Log a state-machine transition.
    pub fn log_stage(&self, stage: RunStage, message: &str) {
        info!(
            analysis_id = %self.analysis_id,
            stage = %stage,
            "Run progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            analysis_id = %self.analysis_id,
            "Run warning: {}", message
        );
    }

    /// Log a stage that fell back to placeholder data.
    pub fn log_degraded(&self, stage: StageName, reason: &str) {
        warn!(
            analysis_id = %self.analysis_id,
            stage = %stage,
            error = %reason,
            "Stage degraded"
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            analysis_id = %self.analysis_id,
            filename = %self.filename,
            "Run error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            analysis_id = %self.analysis_id,
            filename = %self.filename,
            "Run completed: {}", message
        );
    }

    pub fn analysis_id(&self) -> &str {
        &self.analysis_id
    }

    /// Span for instrumenting the whole run.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "analysis",
            analysis_id = %self.analysis_id,
            filename = %self.filename
        )
    }
}
