//! Audio track extraction.
//!
//! Demuxes the audio track into a 16kHz mono PCM WAV, the format both the
//! speech and fingerprint backends accept. A video without audio produces
//! [`AudioAsset::Empty`] instead of an error.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::probe_video;

/// Sample rate expected by speech recognition backends.
pub const AUDIO_SAMPLE_RATE: u32 = 16000;

/// Size of a canonical WAV header; anything this small carries no samples.
const WAV_HEADER_BYTES: u64 = 44;

/// How much of the file is scanned for the `data` chunk.
const WAV_HEAD_SCAN_BYTES: u64 = 4096;

const AUDIO_FILE_NAME: &str = "audio.wav";

/// Declared length of the `data` chunk, if `head` starts a RIFF/WAVE file
/// whose `data` chunk header lies within it.
fn wav_data_len(head: &[u8]) -> Option<u32> {
    if head.len() < 12 || &head[0..4] != b"RIFF" || &head[8..12] != b"WAVE" {
        return None;
    }

    let mut offset = 12usize;
    while offset.checked_add(8)? <= head.len() {
        let id = &head[offset..offset + 4];
        let size = u32::from_le_bytes(head[offset + 4..offset + 8].try_into().ok()?);
        if id == b"data" {
            return Some(size);
        }
        // Chunks are word aligned.
        let padded = size as usize + (size as usize & 1);
        offset = offset.checked_add(8)?.checked_add(padded)?;
    }
    None
}

/// Extracted audio, or the explicit absence of it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioAsset {
    /// The video has no audio track, or it decoded to nothing
    Empty,
    /// WAV file on disk
    File { path: PathBuf, size_bytes: u64 },
}

impl AudioAsset {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File { path, .. } => Some(path),
            Self::Empty => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Classify a file written by an extractor.
    ///
    /// A WAV whose `data` chunk is empty is `Empty` no matter how much
    /// metadata precedes it.
    pub async fn from_output(path: PathBuf) -> MediaResult<Self> {
        let size_bytes = match tokio::fs::metadata(&path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::Empty),
            Err(e) => return Err(e.into()),
        };
        if size_bytes <= WAV_HEADER_BYTES {
            return Ok(Self::Empty);
        }

        let mut head = Vec::new();
        tokio::fs::File::open(&path)
            .await?
            .take(WAV_HEAD_SCAN_BYTES)
            .read_to_end(&mut head)
            .await?;

        match wav_data_len(&head) {
            Some(0) => Ok(Self::Empty),
            _ => Ok(Self::File { path, size_bytes }),
        }
    }
}

/// Audio extraction provider.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Extract the audio track of `video` into `out_dir`.
    async fn extract(&self, video: &Path, out_dir: &Path) -> MediaResult<AudioAsset>;

    /// Provider name for logging.
    fn name(&self) -> &'static str;
}

/// FFmpeg-backed audio extractor.
#[derive(Debug, Clone)]
pub struct FfmpegAudioExtractor {
    sample_rate: u32,
    timeout: Option<Duration>,
}

impl FfmpegAudioExtractor {
    pub fn new() -> Self {
        Self {
            sample_rate: AUDIO_SAMPLE_RATE,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn build_command(&self, video: &Path, output: &Path) -> FfmpegCommand {
        FfmpegCommand::new(video, output)
            .no_video()
            .audio_channels(1)
            .audio_rate(self.sample_rate)
            .audio_codec("pcm_s16le")
            .strip_metadata()
    }
}

impl Default for FfmpegAudioExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioExtractor for FfmpegAudioExtractor {
    async fn extract(&self, video: &Path, out_dir: &Path) -> MediaResult<AudioAsset> {
        tokio::fs::create_dir_all(out_dir).await?;

        match probe_video(video, self.timeout).await {
            Ok(info) if !info.has_audio => {
                debug!(video = %video.display(), "No audio stream");
                return Ok(AudioAsset::Empty);
            }
            Ok(_) => {}
            Err(e) => {
                warn!(video = %video.display(), error = %e, "Probe failed, attempting extraction anyway");
            }
        }

        let output = out_dir.join(AUDIO_FILE_NAME);
        let cmd = self.build_command(video, &output);

        let mut runner = FfmpegRunner::new();
        if let Some(timeout) = self.timeout {
            runner = runner.with_timeout(timeout);
        }
        runner.run(&cmd).await?;

        let asset = AudioAsset::from_output(output).await?;
        debug!(asset = ?asset, "Audio extraction complete");
        Ok(asset)
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
