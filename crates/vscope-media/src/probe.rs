//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::warn;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Container and stream information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Duration in seconds
    pub duration: f64,
    /// Width in pixels (0 without a video stream)
    pub width: u32,
    /// Height in pixels (0 without a video stream)
    pub height: u32,
    /// Declared frame rate, `None` when missing or zero
    pub fps: Option<f64>,
    /// Video codec
    pub codec: String,
    /// File size in bytes
    pub size: u64,
    /// Whether the container has a video stream
    pub has_video: bool,
    /// Whether the container has an audio stream
    pub has_audio: bool,
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a media file for information.
///
/// With a `timeout`, ffprobe is killed once it elapses.
pub async fn probe_video(
    path: impl AsRef<Path>,
    timeout: Option<Duration>,
) -> MediaResult<VideoInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let child = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match timeout {
        Some(timeout) => match tokio::time::timeout(timeout, child).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("FFprobe timed out after {:?}, killing process", timeout);
                return Err(MediaError::Timeout(timeout.as_secs()));
            }
        },
        None => child.await?,
    };

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: "FFprobe failed".to_string(),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<VideoInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe.streams.iter().find(|s| s.codec_type == "video");
    let has_audio = probe.streams.iter().any(|s| s.codec_type == "audio");

    let duration = probe
        .format
        .duration
        .as_ref()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let size = probe
        .format
        .size
        .as_ref()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(0);

    // avg_frame_rate is "0/0" for some containers; fall through to r_frame_rate.
    let fps = video_stream.and_then(|v| {
        v.avg_frame_rate
            .as_deref()
            .and_then(parse_frame_rate)
            .or_else(|| v.r_frame_rate.as_deref().and_then(parse_frame_rate))
    });

    Ok(VideoInfo {
        duration,
        width: video_stream.and_then(|v| v.width).unwrap_or(0),
        height: video_stream.and_then(|v| v.height).unwrap_or(0),
        fps,
        codec: video_stream
            .and_then(|v| v.codec_name.clone())
            .unwrap_or_default(),
        size,
        has_video: video_stream.is_some(),
        has_audio,
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97"). Zero rates are rejected.
fn parse_frame_rate(s: &str) -> Option<f64> {
    let fps = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den <= 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };

    (fps.is_finite() && fps > 0.0).then_some(fps)
}
