//! Zero-shot visual classification.
//!
//! Every vocabulary label is embedded once into a [`LabelIndex`]; each frame
//! then costs a single image embedding plus N dot products. The index lives
//! in a [`LabelEmbeddingCache`] shared by all runs and is read-only once built.

use std::sync::Arc;

use tokio::sync::OnceCell;
use tracing::{debug, info};
use vscope_media::{Frame, FrameSet};
use vscope_ml_client::{MlError, MlResult, VisionBackend};
use vscope_models::{LabelVote, Vocabulary, UNKNOWN_ACTION};

use crate::error::WorkerResult;
use crate::logging::RunLogger;

/// Logit scale applied to cosine similarities before the softmax.
pub const LOGIT_SCALE: f32 = 100.0;

/// Scale a vector to unit length. Zero vectors are returned unchanged.
pub fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Normalised label embeddings, in vocabulary order.
#[derive(Debug, Clone)]
pub struct LabelIndex {
    labels: Vec<String>,
    embeddings: Vec<Vec<f32>>,
    dim: usize,
}

impl LabelIndex {
    /// Build from precomputed embeddings, one per label.
    pub fn from_embeddings(vocabulary: &Vocabulary, embeddings: Vec<Vec<f32>>) -> MlResult<Self> {
        if embeddings.len() != vocabulary.len() {
            return Err(MlError::InvalidResponse(format!(
                "{} label embeddings for {} labels",
                embeddings.len(),
                vocabulary.len()
            )));
        }

        let dim = embeddings.first().map(Vec::len).unwrap_or(0);
        if dim == 0 || embeddings.iter().any(|e| e.len() != dim) {
            return Err(MlError::InvalidResponse(
                "Label embeddings are empty or of mixed dimension".to_string(),
            ));
        }

        Ok(Self {
            labels: vocabulary.labels().to_vec(),
            embeddings: embeddings.into_iter().map(l2_normalize).collect(),
            dim,
        })
    }

    /// Embed the whole vocabulary in one batch.
    pub async fn build(vocabulary: &Vocabulary, backend: &dyn VisionBackend) -> MlResult<Self> {
        let embeddings = backend.embed_text(vocabulary.labels()).await?;
        Self::from_embeddings(vocabulary, embeddings)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn label(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Cosine similarity of an image embedding against every label.
    pub fn similarities(&self, image_embedding: &[f32]) -> MlResult<Vec<f32>> {
        if image_embedding.len() != self.dim {
            return Err(MlError::InvalidResponse(format!(
                "Image embedding has dimension {}, labels have {}",
                image_embedding.len(),
                self.dim
            )));
        }
        let image = l2_normalize(image_embedding.to_vec());
        Ok(self.embeddings.iter().map(|label| dot(&image, label)).collect())
    }

    /// Best label for an image embedding.
    ///
    /// Returns the winning vocabulary index and its softmax probability.
    /// On equal similarity the lowest index wins.
    pub fn best_match(&self, image_embedding: &[f32]) -> MlResult<(usize, f32)> {
        let sims = self.similarities(image_embedding)?;

        let mut best = 0usize;
        for (i, &s) in sims.iter().enumerate().skip(1) {
            if s > sims[best] {
                best = i;
            }
        }

        let max = sims[best];
        let denom: f32 = sims
            .iter()
            .map(|s| ((s - max) * LOGIT_SCALE).exp())
            .sum();
        Ok((best, 1.0 / denom))
    }
}

/// Process-wide label embedding cache.
///
/// Built through [`LabelEmbeddingCache::initialize`]; concurrent callers wait
/// on the same initialization and a successful build is never repeated.
#[derive(Debug)]
pub struct LabelEmbeddingCache {
    vocabulary: Vocabulary,
    index: OnceCell<Arc<LabelIndex>>,
}

impl LabelEmbeddingCache {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self {
            vocabulary,
            index: OnceCell::new(),
        }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    /// Build the index if it has not been built yet.
    pub async fn initialize(&self, backend: &dyn VisionBackend) -> MlResult<Arc<LabelIndex>> {
        self.index
            .get_or_try_init(|| async {
                info!(
                    labels = self.vocabulary.len(),
                    backend = backend.name(),
                    "Embedding label vocabulary"
                );
                LabelIndex::build(&self.vocabulary, backend).await.map(Arc::new)
            })
            .await
            .cloned()
    }

    pub fn get(&self) -> Option<Arc<LabelIndex>> {
        self.index.get().cloned()
    }

    pub fn is_initialized(&self) -> bool {
        self.index.initialized()
    }
}

/// Votes for a frame set, plus how many frames had to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Classification {
    pub votes: Vec<LabelVote>,
    pub skipped: usize,
}

/// Classifies sampled frames against the cached label index.
pub struct VisualClassifier {
    backend: Arc<dyn VisionBackend>,
    cache: Arc<LabelEmbeddingCache>,
}

impl VisualClassifier {
    pub fn new(backend: Arc<dyn VisionBackend>, cache: Arc<LabelEmbeddingCache>) -> Self {
        Self { backend, cache }
    }

    /// Label index for this run, building it on first use.
    pub async fn label_index(&self) -> MlResult<Arc<LabelIndex>> {
        self.cache.initialize(self.backend.as_ref()).await
    }

    /// Classify a single frame.
    pub async fn classify_frame(&self, index: &LabelIndex, frame: &Frame) -> WorkerResult<LabelVote> {
        let image = frame.decode().await?;
        let embedding = self.backend.embed_image(&image).await?;
        let (best, confidence) = index.best_match(&embedding)?;
        let label = index.label(best).unwrap_or(UNKNOWN_ACTION);
        Ok(LabelVote::new(frame.ordinal, label, confidence))
    }

    /// Classify every frame, skipping frames that fail to decode or embed.
    pub async fn classify(
        &self,
        index: &LabelIndex,
        frames: &FrameSet,
        logger: &RunLogger,
    ) -> Classification {
        let mut result = Classification::default();

        for frame in frames {
            match self.classify_frame(index, frame).await {
                Ok(vote) => {
                    debug!(
                        ordinal = vote.ordinal,
                        label = %vote.label,
                        confidence = vote.confidence,
                        "Frame classified"
                    );
                    result.votes.push(vote);
                }
                Err(e) => {
                    logger.log_warning(&format!("Skipping frame {}: {}", frame.ordinal, e));
                    result.skipped += 1;
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::DynamicImage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn vocab(labels: &[&str]) -> Vocabulary {
        Vocabulary::new(labels.iter().copied()).unwrap()
    }

    #[test]
    fn test_normalize() {
        let v = l2_normalize(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(l2_normalize(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_best_match_picks_highest_cosine() {
        let index = LabelIndex::from_embeddings(
            &vocab(&["run", "walk", "swim"]),
            vec![vec![1.0, 0.0], vec![0.0, 1.0], vec![-1.0, 0.0]],
        )
        .unwrap();

        let (best, confidence) = index.best_match(&[0.1, 5.0]).unwrap();
        assert_eq!(index.label(best), Some("walk"));
        assert!(confidence > 0.99);
    }

    #[test]
    fn test_tie_goes_to_lowest_index() {
        let index = LabelIndex::from_embeddings(
            &vocab(&["a", "b", "c"]),
            vec![vec![0.0, 1.0], vec![1.0, 0.0], vec![1.0, 0.0]],
        )
        .unwrap();

        let (best, confidence) = index.best_match(&[1.0, 0.0]).unwrap();
        assert_eq!(best, 1);
        assert!((confidence - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_magnitude_does_not_matter() {
        let index = LabelIndex::from_embeddings(
            &vocab(&["x", "y"]),
            vec![vec![10.0, 0.0], vec![0.0, 0.1]],
        )
        .unwrap();
        let (best, _) = index.best_match(&[0.2, 1.0]).unwrap();
        assert_eq!(best, 1);
    }

    #[test]
    fn test_dimension_mismatch() {
        let index =
            LabelIndex::from_embeddings(&vocab(&["x"]), vec![vec![1.0, 0.0, 0.0]]).unwrap();
        assert!(index.best_match(&[1.0, 0.0]).is_err());
        assert!(LabelIndex::from_embeddings(&vocab(&["x", "y"]), vec![vec![1.0]]).is_err());
    }

    struct CountingVision {
        text_calls: AtomicUsize,
    }

    #[async_trait]
    impl VisionBackend for CountingVision {
        async fn embed_image(&self, _image: &DynamicImage) -> MlResult<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }

        async fn embed_text(&self, texts: &[String]) -> MlResult<Vec<Vec<f32>>> {
            self.text_calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_cache_initializes_once_under_contention() {
        let backend = Arc::new(CountingVision {
            text_calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(LabelEmbeddingCache::new(vocab(&["a", "b"])));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let backend = Arc::clone(&backend);
                tokio::spawn(async move { cache.initialize(backend.as_ref()).await.map(|i| i.len()) })
            })
            .collect();

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 2);
        }
        assert_eq!(backend.text_calls.load(Ordering::SeqCst), 1);
        assert!(cache.is_initialized());
    }

    #[tokio::test]
    async fn test_undecodable_frames_are_skipped() {
        let dir = tempfile::TempDir::new().unwrap();
        let good = dir.path().join("frame00001.jpg");
        image::RgbImage::from_pixel(4, 4, image::Rgb([200, 10, 10]))
            .save_with_format(&good, image::ImageFormat::Png)
            .unwrap();
        let junk = dir.path().join("frame00002.jpg");
        std::fs::write(&junk, b"not an image").unwrap();

        let frames = FrameSet::new(
            vec![
                Frame {
                    ordinal: 0,
                    source_index: 0,
                    timestamp_secs: None,
                    path: junk,
                },
                Frame {
                    ordinal: 1,
                    source_index: 30,
                    timestamp_secs: None,
                    path: good,
                },
            ],
            30,
            None,
        );

        let backend = Arc::new(CountingVision {
            text_calls: AtomicUsize::new(0),
        });
        let vocabulary = vocab(&["a", "b"]);
        let index =
            LabelIndex::from_embeddings(&vocabulary, vec![vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let classifier =
            VisualClassifier::new(backend, Arc::new(LabelEmbeddingCache::new(vocabulary)));
        let logger = RunLogger::new(&vscope_models::AnalysisId::new(), "clip.mp4");

        let classification = classifier.classify(&index, &frames, &logger).await;
        assert_eq!(classification.skipped, 1);
        assert_eq!(classification.votes.len(), 1);
        assert_eq!(classification.votes[0].ordinal, 1);
        assert_eq!(classification.votes[0].label, "a");
    }
}
