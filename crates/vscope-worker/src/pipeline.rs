//! Pipeline orchestration.
//!
//! [`Analyzer::analyze`] drives one run through
//! `Received → FramesExtracted → Classified → AudioExtracted → Transcribed →
//! MusicMatched → Synthesized → Persisted → Done`. Each stage hands back a
//! [`StageOutcome`]; degraded stages are recorded on the result and the run
//! carries on. Only a rejected upload, a workspace that cannot be written, or
//! a panic ends the run without a result.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use tracing::Instrument;
use vscope_media::{AudioAsset, AudioExtractor, FfmpegAudioExtractor, FfmpegFrameSampler, FrameSampler, FrameSet};
use vscope_ml_client::{
    FingerprintBackend, FingerprintClient, GeminiClient, SpeechBackend, SpeechClient, TextGenerator,
    VisionBackend, VisionClient,
};
use vscope_models::{
    AnalysisId, AnalysisRecord, AnalysisResult, OwnerId, RunStage, SamplingInterval, StageName,
};
use vscope_store::{AnalysisStore, InMemoryStore, JsonLinesStore};

use crate::aggregator::{summarize, ActionSummary};
use crate::classifier::{LabelEmbeddingCache, VisualClassifier};
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::RunLogger;
use crate::metrics;
use crate::music::FingerprintMatcher;
use crate::stage::StageOutcome;
use crate::synthesizer::{InsightSynthesizer, SynthesisInput, SynthesisResponse};
use crate::transcriber::Transcriber;
use crate::workspace::{sanitize_filename, RunWorkspace};

/// Title used when neither the caller nor the filename provides one.
pub const UNTITLED: &str = "Untitled analysis";

const FALLBACK_FILENAME: &str = "upload";

/// One upload to analyze.
#[derive(Debug, Clone)]
pub struct AnalyzeRequest {
    pub video_bytes: Vec<u8>,
    pub filename: String,
    pub owner: OwnerId,
    /// Overrides the configured sampling interval
    pub sampling_interval: Option<SamplingInterval>,
    /// Display title; derived from the filename when absent
    pub title: Option<String>,
}

impl AnalyzeRequest {
    pub fn new(video_bytes: Vec<u8>, filename: impl Into<String>, owner: OwnerId) -> Self {
        Self {
            video_bytes,
            filename: filename.into(),
            owner,
            sampling_interval: None,
            title: None,
        }
    }

    pub fn with_sampling_interval(mut self, interval: SamplingInterval) -> Self {
        self.sampling_interval = Some(interval);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// External collaborators of the analyzer.
#[derive(Clone)]
pub struct AnalyzerBackends {
    pub frame_sampler: Arc<dyn FrameSampler>,
    pub audio_extractor: Arc<dyn AudioExtractor>,
    pub vision: Arc<dyn VisionBackend>,
    pub speech: Arc<dyn SpeechBackend>,
    pub fingerprint: Arc<dyn FingerprintBackend>,
    pub generator: Arc<dyn TextGenerator>,
    pub store: Arc<dyn AnalysisStore>,
}

impl AnalyzerBackends {
    /// FFmpeg media tools and HTTP backends configured from the environment.
    ///
    /// The vision service is health checked once; an unhealthy service is
    /// logged and left to degrade classification.
    pub async fn from_env(config: &WorkerConfig) -> WorkerResult<Self> {
        let vision = VisionClient::from_env()?;
        match vision.health_check().await {
            Ok(true) => tracing::info!("Vision service is healthy"),
            Ok(false) => tracing::warn!("Vision service is not healthy; classification may degrade"),
            Err(e) => tracing::warn!("Vision service health check failed: {}", e),
        }

        let store: Arc<dyn AnalysisStore> = match &config.store_path {
            Some(path) => Arc::new(JsonLinesStore::new(path.clone())),
            None => Arc::new(InMemoryStore::new()),
        };

        Ok(Self {
            frame_sampler: Arc::new(
                FfmpegFrameSampler::new(config.max_frames).with_timeout(config.media_timeout),
            ),
            audio_extractor: Arc::new(FfmpegAudioExtractor::new().with_timeout(config.media_timeout)),
            vision: Arc::new(vision),
            speech: Arc::new(SpeechClient::from_env()?),
            fingerprint: Arc::new(FingerprintClient::from_env()?),
            generator: Arc::new(GeminiClient::from_env()?),
            store,
        })
    }
}

/// Tracks the state machine and degraded stages of one run.
struct RunTracker<'a> {
    stage: RunStage,
    degraded: Vec<StageName>,
    logger: &'a RunLogger,
}

impl<'a> RunTracker<'a> {
    fn new(logger: &'a RunLogger) -> Self {
        Self {
            stage: RunStage::Received,
            degraded: Vec::new(),
            logger,
        }
    }

    fn advance(&mut self, to: RunStage) -> WorkerResult<()> {
        self.stage = self
            .stage
            .transition(to)
            .map_err(|e| WorkerError::fatal(e.to_string()))?;
        self.logger.log_stage(to, "stage complete");
        Ok(())
    }

    fn degrade(&mut self, stage: StageName, reason: &str) {
        self.logger.log_degraded(stage, reason);
        metrics::record_stage_degraded(stage);
        if !self.degraded.contains(&stage) {
            self.degraded.push(stage);
        }
    }

    /// Unwrap a stage outcome, recording degradation.
    fn settle<T>(&mut self, stage: StageName, outcome: StageOutcome<T>) -> WorkerResult<T> {
        match outcome {
            StageOutcome::Ok(value) => Ok(value),
            StageOutcome::Degraded { value, reason } => {
                self.degrade(stage, &reason);
                Ok(value)
            }
            StageOutcome::Fatal(e) => Err(e),
        }
    }

    fn fail(&mut self, error: &WorkerError) {
        if let Ok(stage) = self.stage.transition(RunStage::Errored) {
            self.stage = stage;
        }
        self.logger.log_stage(RunStage::Errored, &error.to_string());
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn derive_title(requested: Option<&str>, filename: &str) -> String {
    if let Some(title) = requested.map(str::trim).filter(|t| !t.is_empty()) {
        return title.to_string();
    }
    Path::new(filename)
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(UNTITLED)
        .to_string()
}

/// The video analysis pipeline.
pub struct Analyzer {
    config: WorkerConfig,
    labels: Arc<LabelEmbeddingCache>,
    classifier: VisualClassifier,
    transcriber: Transcriber,
    matcher: FingerprintMatcher,
    synthesizer: InsightSynthesizer,
    frame_sampler: Arc<dyn FrameSampler>,
    audio_extractor: Arc<dyn AudioExtractor>,
    store: Arc<dyn AnalysisStore>,
}

impl Analyzer {
    pub fn new(config: WorkerConfig, backends: AnalyzerBackends) -> Self {
        let labels = Arc::new(LabelEmbeddingCache::new(config.vocabulary.clone()));
        Self::with_label_cache(config, backends, labels)
    }

    /// Build an analyzer that shares an existing label cache.
    pub fn with_label_cache(
        config: WorkerConfig,
        backends: AnalyzerBackends,
        labels: Arc<LabelEmbeddingCache>,
    ) -> Self {
        Self {
            classifier: VisualClassifier::new(backends.vision, Arc::clone(&labels)),
            transcriber: Transcriber::new(backends.speech, config.transcribe_timeout, config.retry_delay),
            matcher: FingerprintMatcher::new(
                backends.fingerprint,
                config.fingerprint_timeout,
                config.retry_delay,
            ),
            synthesizer: InsightSynthesizer::new(
                backends.generator,
                config.synthesis_timeout,
                config.retry_delay,
            ),
            frame_sampler: backends.frame_sampler,
            audio_extractor: backends.audio_extractor,
            store: backends.store,
            labels,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn label_cache(&self) -> &Arc<LabelEmbeddingCache> {
        &self.labels
    }

    /// Embed the label vocabulary ahead of the first run.
    pub async fn initialize(&self) -> WorkerResult<()> {
        let index = self.classifier.label_index().await?;
        tracing::info!(labels = index.len(), "Label embeddings ready");
        Ok(())
    }

    /// Analyze one uploaded video.
    pub async fn analyze(&self, request: AnalyzeRequest) -> WorkerResult<AnalysisResult> {
        let started = Instant::now();
        let id = AnalysisId::new();
        let filename = match sanitize_filename(&request.filename) {
            name if name.is_empty() => FALLBACK_FILENAME.to_string(),
            name => name,
        };
        let logger = RunLogger::new(&id, &filename);
        let span = logger.create_span();

        let outcome = AssertUnwindSafe(self.run(id, filename, request, &logger))
            .catch_unwind()
            .instrument(span)
            .await
            .unwrap_or_else(|panic| {
                Err(WorkerError::fatal(format!(
                    "analysis panicked: {}",
                    panic_message(panic.as_ref())
                )))
            });

        let label = match &outcome {
            Ok(result) if result.is_degraded() => "degraded",
            Ok(_) => "ok",
            Err(e) if e.is_input_error() => "input_error",
            Err(_) => "fatal",
        };
        metrics::record_run(label, started.elapsed());

        if let Err(e) = &outcome {
            logger.log_error(&format!("Run ended without a result: {}", e));
        }
        outcome
    }

    async fn run(
        &self,
        id: AnalysisId,
        filename: String,
        request: AnalyzeRequest,
        logger: &RunLogger,
    ) -> WorkerResult<AnalysisResult> {
        if request.video_bytes.is_empty() {
            return Err(WorkerError::input("uploaded video is empty"));
        }
        let interval = request.sampling_interval.unwrap_or(self.config.sampling_interval);
        interval
            .validate()
            .map_err(|e| WorkerError::input(e.to_string()))?;

        logger.log_start(&format!("{} bytes", request.video_bytes.len()));
        let mut tracker = RunTracker::new(logger);

        // Dropping the workspace on any early return or unwind removes it.
        let workspace = match RunWorkspace::create(&self.config.work_dir, &id).await {
            Ok(ws) => ws,
            Err(e) => {
                let err = WorkerError::fatal(format!("cannot create run workspace: {}", e));
                tracker.fail(&err);
                return Err(err);
            }
        };

        let result = self
            .run_stages(&mut tracker, &workspace, id, filename, request, interval)
            .await;

        if let Err(e) = &result {
            tracker.fail(e);
        }
        workspace.close();
        result
    }

    async fn run_stages(
        &self,
        tracker: &mut RunTracker<'_>,
        workspace: &RunWorkspace,
        id: AnalysisId,
        filename: String,
        request: AnalyzeRequest,
        interval: SamplingInterval,
    ) -> WorkerResult<AnalysisResult> {
        let video = tracker.settle(
            StageName::FrameSampling,
            persist_upload(workspace, &filename, &request.video_bytes).await,
        )?;
        drop(request.video_bytes);

        let frames = tracker.settle(
            StageName::FrameSampling,
            self.sample_frames(&video, interval, &workspace.frames_dir()).await,
        )?;
        tracker.advance(RunStage::FramesExtracted)?;

        let logger = tracker.logger;
        let classified = self.classify(&frames, logger).await;
        let summary = tracker.settle(StageName::Classification, classified)?;
        tracker.advance(RunStage::Classified)?;

        let audio = tracker.settle(
            StageName::AudioExtraction,
            self.extract_audio(&video, &workspace.audio_dir()).await,
        )?;
        tracker.advance(RunStage::AudioExtracted)?;

        let transcript = tracker.settle(
            StageName::Transcription,
            self.transcriber.transcribe(&audio).await,
        )?;
        tracker.advance(RunStage::Transcribed)?;

        let music = tracker.settle(StageName::MusicMatching, self.matcher.identify(&audio).await)?;
        tracker.advance(RunStage::MusicMatched)?;

        let synthesis = self
            .synthesizer
            .synthesize(&SynthesisInput {
                transcript: &transcript,
                music: &music,
                representative_action: &summary.representative_action,
                frame_count: summary.frame_count,
                filename: &filename,
            })
            .await;
        if synthesis.is_degraded() {
            metrics::record_synthesis_fallback();
        }
        let (score, explanation) =
            tracker.settle(StageName::Synthesis, synthesis.map(SynthesisResponse::into_parts))?;
        tracker.advance(RunStage::Synthesized)?;

        let title = derive_title(request.title.as_deref(), &filename);
        let mut result = AnalysisResult {
            id,
            owner: request.owner,
            title,
            created_at: Utc::now(),
            representative_action: summary.representative_action,
            action_breakdown: summary.breakdown,
            frame_count: summary.frame_count,
            transcript,
            music_match: music,
            score,
            explanation,
            filename,
            degraded_stages: Vec::new(),
        };

        if let Err(e) = self.store.record(&AnalysisRecord::from(&result)).await {
            metrics::record_persistence_failure();
            tracker.degrade(
                StageName::Persistence,
                &format!("{} store write failed: {}", self.store.name(), e),
            );
        }
        tracker.advance(RunStage::Persisted)?;

        result.degraded_stages = std::mem::take(&mut tracker.degraded);
        tracker.advance(RunStage::Done)?;
        tracker.logger.log_completion(&format!(
            "score={} action={} music={}",
            result.score,
            result.representative_action,
            result.music_match.describe()
        ));
        Ok(result)
    }

    async fn sample_frames(
        &self,
        video: &Path,
        interval: SamplingInterval,
        out_dir: &Path,
    ) -> StageOutcome<FrameSet> {
        match self.frame_sampler.sample(video, interval, out_dir).await {
            Ok(frames) if frames.is_empty() => {
                StageOutcome::degraded(frames, "no frames could be extracted")
            }
            Ok(frames) => StageOutcome::Ok(frames),
            Err(e) => StageOutcome::degraded(
                FrameSet::empty(),
                format!("{} sampling failed: {}", self.frame_sampler.name(), e),
            ),
        }
    }

    async fn classify(&self, frames: &FrameSet, logger: &RunLogger) -> StageOutcome<ActionSummary> {
        if frames.is_empty() {
            return StageOutcome::Ok(summarize(&[]));
        }

        let index = match self.classifier.label_index().await {
            Ok(index) => index,
            Err(e) => {
                return StageOutcome::degraded(
                    summarize(&[]),
                    format!("label embeddings unavailable: {}", e),
                )
            }
        };

        let classification = self.classifier.classify(&index, frames, logger).await;
        let summary = summarize(&classification.votes);
        if classification.votes.is_empty() {
            StageOutcome::degraded(
                summary,
                format!("all {} frames failed to classify", classification.skipped),
            )
        } else {
            StageOutcome::Ok(summary)
        }
    }

    async fn extract_audio(&self, video: &Path, out_dir: &Path) -> StageOutcome<AudioAsset> {
        match self.audio_extractor.extract(video, out_dir).await {
            Ok(asset) => StageOutcome::Ok(asset),
            Err(e) => StageOutcome::degraded(
                AudioAsset::Empty,
                format!("{} extraction failed: {}", self.audio_extractor.name(), e),
            ),
        }
    }
}

/// Write the upload into the workspace. Failure here ends the run.
async fn persist_upload(workspace: &RunWorkspace, filename: &str, bytes: &[u8]) -> StageOutcome<PathBuf> {
    match workspace.write_video(filename, bytes).await {
        Ok(path) => StageOutcome::Ok(path),
        Err(e) => StageOutcome::Fatal(WorkerError::fatal(format!("cannot store uploaded video: {}", e))),
    }
}
