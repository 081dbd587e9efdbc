//! Deterministic frame sampling.
//!
//! Frames are selected by decoded-frame index (`n % step == 0`), so the same
//! video and interval always yield the same frames. Sampled images are written
//! as JPEGs into a caller-owned directory and exposed as a [`FrameSet`] that can
//! be iterated any number of times from the first frame.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::DynamicImage;
use tracing::{debug, warn};
use vscope_models::SamplingInterval;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::probe::probe_video;

/// Frame step used when a time interval cannot be converted (unknown or zero fps).
pub const DEFAULT_FRAME_STEP: u32 = 30;

/// Default cap on frames per video.
pub const DEFAULT_MAX_FRAMES: u32 = 120;

const FRAME_PREFIX: &str = "frame";
const FRAME_EXTENSION: &str = "jpg";

/// One sampled still image.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    /// Position in the sampled sequence (0-based)
    pub ordinal: u32,
    /// Index of the source frame in the decoded stream
    pub source_index: u64,
    /// Source timestamp in seconds, when the frame rate is known
    pub timestamp_secs: Option<f64>,
    /// Encoded image on disk
    pub path: PathBuf,
}

impl Frame {
    /// Read and decode the image.
    pub async fn decode(&self) -> MediaResult<DynamicImage> {
        let bytes = tokio::fs::read(&self.path).await?;
        tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| MediaError::internal(format!("Frame decode task failed: {}", e)))?
            .map_err(|e| MediaError::frame_decode(e.to_string()))
    }
}

/// Ordered, finite set of sampled frames.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSet {
    frames: Vec<Frame>,
    step: u32,
    fps: Option<f64>,
}

impl FrameSet {
    pub fn new(frames: Vec<Frame>, step: u32, fps: Option<f64>) -> Self {
        Self { frames, step, fps }
    }

    /// Empty set, for videos with nothing decodable.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Iterate from the first frame. Each call starts over.
    pub fn iter(&self) -> std::slice::Iter<'_, Frame> {
        self.frames.iter()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Source frames between consecutive samples.
    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn fps(&self) -> Option<f64> {
        self.fps
    }

    /// Build a set from the frame images already present in `dir`.
    pub async fn collect_from_dir(dir: &Path, step: u32, fps: Option<f64>) -> MediaResult<Self> {
        let mut paths = Vec::new();
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_frame = path.extension().and_then(|e| e.to_str()) == Some(FRAME_EXTENSION)
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(FRAME_PREFIX));
            if is_frame {
                paths.push(path);
            }
        }

        // Zero-padded names sort in extraction order.
        paths.sort();

        let frames = paths
            .into_iter()
            .enumerate()
            .map(|(i, path)| {
                let ordinal = i as u32;
                let source_index = u64::from(ordinal) * u64::from(step.max(1));
                Frame {
                    ordinal,
                    source_index,
                    timestamp_secs: fps.map(|fps| source_index as f64 / fps),
                    path,
                }
            })
            .collect();

        Ok(Self::new(frames, step, fps))
    }
}

impl<'a> IntoIterator for &'a FrameSet {
    type Item = &'a Frame;
    type IntoIter = std::slice::Iter<'a, Frame>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Convert a sampling interval into a decoded-frame step.
///
/// Time intervals need the frame rate; when it is unknown, zero or not finite
/// the fixed [`DEFAULT_FRAME_STEP`] is used instead. The step is never zero.
pub fn frame_step(interval: SamplingInterval, fps: Option<f64>) -> u32 {
    match interval {
        SamplingInterval::Frames(n) => n.max(1),
        SamplingInterval::Seconds(secs) => match fps {
            Some(fps) if fps.is_finite() && fps > 0.0 && secs.is_finite() && secs > 0.0 => {
                (fps * secs).round().clamp(1.0, f64::from(u32::MAX)) as u32
            }
            _ => DEFAULT_FRAME_STEP,
        },
    }
}

/// Frame sampling provider.
#[async_trait]
pub trait FrameSampler: Send + Sync {
    /// Sample frames from `video` into `out_dir`.
    ///
    /// An unreadable or empty video yields an empty [`FrameSet`], not an error.
    async fn sample(
        &self,
        video: &Path,
        interval: SamplingInterval,
        out_dir: &Path,
    ) -> MediaResult<FrameSet>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// FFmpeg-backed frame sampler.
#[derive(Debug, Clone)]
pub struct FfmpegFrameSampler {
    max_frames: u32,
    timeout: Option<Duration>,
}

impl FfmpegFrameSampler {
    pub fn new(max_frames: u32) -> Self {
        Self {
            max_frames: max_frames.max(1),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn build_command(&self, video: &Path, out_dir: &Path, step: u32) -> FfmpegCommand {
        let pattern = out_dir.join(format!("{}%05d.{}", FRAME_PREFIX, FRAME_EXTENSION));
        FfmpegCommand::new(video, pattern)
            .video_filter(format!("select='not(mod(n\\,{}))'", step))
            .output_args(["-vsync", "vfr", "-q:v", "2"])
            .max_frames(self.max_frames)
    }
}

impl Default for FfmpegFrameSampler {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAMES)
    }
}

#[async_trait]
impl FrameSampler for FfmpegFrameSampler {
    async fn sample(
        &self,
        video: &Path,
        interval: SamplingInterval,
        out_dir: &Path,
    ) -> MediaResult<FrameSet> {
        tokio::fs::create_dir_all(out_dir).await?;

        let fps = match probe_video(video, self.timeout).await {
            Ok(info) if !info.has_video => {
                debug!(video = %video.display(), "No video stream, nothing to sample");
                return Ok(FrameSet::empty());
            }
            Ok(info) => info.fps,
            Err(e) => {
                warn!(video = %video.display(), error = %e, "Probe failed, sampling without frame rate");
                None
            }
        };

        let step = frame_step(interval, fps);
        let cmd = self.build_command(video, out_dir, step);

        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = self.timeout {
            runner = runner.with_timeout(timeout);
        }

        // A truncated or corrupt stream may still have produced some frames.
        if let Err(e) = runner.run(&cmd).await {
            warn!(video = %video.display(), error = %e, "Frame extraction failed");
        }

        let frames = FrameSet::collect_from_dir(out_dir, step, fps).await?;
        debug!(
            frames = frames.len(),
            step = step,
            fps = ?fps,
            "Frame sampling complete"
        );

        Ok(frames)
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_frame_step_from_seconds() {
        assert_eq!(frame_step(SamplingInterval::Seconds(2.0), Some(30.0)), 60);
        assert_eq!(frame_step(SamplingInterval::Seconds(2.0), Some(29.97)), 60);
        assert_eq!(frame_step(SamplingInterval::Seconds(0.01), Some(30.0)), 1);
    }

    #[test]
    fn test_frame_step_without_frame_rate() {
        assert_eq!(
            frame_step(SamplingInterval::Seconds(2.0), None),
            DEFAULT_FRAME_STEP
        );
        assert_eq!(
            frame_step(SamplingInterval::Seconds(2.0), Some(0.0)),
            DEFAULT_FRAME_STEP
        );
        assert_eq!(
            frame_step(SamplingInterval::Seconds(2.0), Some(f64::NAN)),
            DEFAULT_FRAME_STEP
        );
    }

    #[test]
    fn test_frame_step_from_frames() {
        assert_eq!(frame_step(SamplingInterval::Frames(10), None), 10);
        assert_eq!(frame_step(SamplingInterval::Frames(0), Some(30.0)), 1);
    }

    #[test]
    fn test_select_filter() {
        let sampler = FfmpegFrameSampler::new(5);
        let args = sampler
            .build_command(Path::new("in.mp4"), Path::new("/tmp/frames"), 60)
            .build_args();

        assert!(args.contains(&"select='not(mod(n\\,60))'".to_string()));
        assert!(args.contains(&"5".to_string()));
        assert_eq!(
            args.last().map(String::as_str),
            Some("/tmp/frames/frame%05d.jpg")
        );
    }

    #[tokio::test]
    async fn test_collect_orders_frames_and_ignores_other_files() {
        let dir = TempDir::new().unwrap();
        for name in ["frame00003.jpg", "frame00001.jpg", "frame00002.jpg", "audio.wav", "notes.jpg"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let set = FrameSet::collect_from_dir(dir.path(), 60, Some(30.0)).await.unwrap();

        assert_eq!(set.len(), 3);
        let names: Vec<_> = set
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["frame00001.jpg", "frame00002.jpg", "frame00003.jpg"]);

        let last = set.iter().last().unwrap();
        assert_eq!(last.ordinal, 2);
        assert_eq!(last.source_index, 120);
        assert_eq!(last.timestamp_secs, Some(4.0));
    }

    #[tokio::test]
    async fn test_iteration_is_restartable() {
        let dir = TempDir::new().unwrap();
        for name in ["frame00001.jpg", "frame00002.jpg"] {
            tokio::fs::write(dir.path().join(name), b"x").await.unwrap();
        }
        let set = FrameSet::collect_from_dir(dir.path(), 30, None).await.unwrap();

        let first: Vec<u32> = set.iter().map(|f| f.ordinal).collect();
        let second: Vec<u32> = (&set).into_iter().map(|f| f.ordinal).collect();
        assert_eq!(first, second);
        assert!(set.iter().all(|f| f.timestamp_secs.is_none()));
    }

    #[tokio::test]
    async fn test_decode_corrupt_frame_is_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame00001.jpg");
        tokio::fs::write(&path, b"not a jpeg").await.unwrap();

        let frame = Frame {
            ordinal: 0,
            source_index: 0,
            timestamp_secs: None,
            path,
        };
        assert!(matches!(frame.decode().await, Err(MediaError::FrameDecode(_))));
    }

    #[tokio::test]
    async fn test_decode_valid_frame() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("frame00001.jpg");
        image::RgbImage::from_pixel(8, 8, image::Rgb([200, 10, 10]))
            .save(&path)
            .unwrap();

        let frame = Frame {
            ordinal: 0,
            source_index: 0,
            timestamp_secs: None,
            path,
        };
        let decoded = frame.decode().await.unwrap();
        assert_eq!(decoded.width(), 8);
    }
}
