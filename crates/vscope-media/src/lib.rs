//! FFmpeg CLI wrapper for video analysis inputs.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building and a runner with timeouts
//! - FFprobe stream inspection
//! - Deterministic, evenly spaced frame sampling
//! - Audio track extraction to 16kHz mono WAV

pub mod audio;
pub mod command;
pub mod error;
pub mod frames;
pub mod probe;

pub use audio::{AudioAsset, AudioExtractor, FfmpegAudioExtractor};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frames::{frame_step, FfmpegFrameSampler, Frame, FrameSampler, FrameSet, DEFAULT_FRAME_STEP};
pub use probe::{probe_video, VideoInfo};
