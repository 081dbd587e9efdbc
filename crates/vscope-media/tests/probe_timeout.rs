//! A hanging ffprobe must not outlive the media timeout.
//!
//! Puts a `sleep`ing ffprobe first on PATH, so this lives in its own test
//! binary. Run with `cargo test -p vscope-media -- --ignored`.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use vscope_media::{
    probe_video, AudioExtractor, FfmpegAudioExtractor, FfmpegFrameSampler, FrameSampler, MediaError,
};
use vscope_models::SamplingInterval;

fn install_hanging_ffprobe(bin_dir: &Path) {
    let script = bin_dir.join("ffprobe");
    std::fs::write(&script, "#!/bin/sh\nsleep 30\n").unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    let path = std::env::var("PATH").unwrap_or_default();
    std::env::set_var("PATH", format!("{}:{}", bin_dir.display(), path));
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_hanging_ffprobe_is_cut_off() {
    let dir = TempDir::new().unwrap();
    let bin_dir = dir.path().join("bin");
    std::fs::create_dir_all(&bin_dir).unwrap();
    install_hanging_ffprobe(&bin_dir);

    let video = dir.path().join("clip.mp4");
    std::fs::write(&video, b"not really a video").unwrap();
    let limit = Duration::from_secs(1);

    let started = Instant::now();
    let err = probe_video(&video, Some(limit)).await.unwrap_err();
    assert!(matches!(err, MediaError::Timeout(1)), "{err}");
    assert!(started.elapsed() < Duration::from_secs(5));

    // Both stages fall back after the probe times out instead of hanging.
    let started = Instant::now();
    let frames = FfmpegFrameSampler::new(10)
        .with_timeout(limit)
        .sample(&video, SamplingInterval::default(), &dir.path().join("frames"))
        .await
        .unwrap();
    assert!(frames.is_empty());
    assert!(started.elapsed() < Duration::from_secs(5));

    let started = Instant::now();
    let _ = FfmpegAudioExtractor::new()
        .with_timeout(limit)
        .extract(&video, &dir.path().join("audio"))
        .await;
    assert!(started.elapsed() < Duration::from_secs(5));
}
