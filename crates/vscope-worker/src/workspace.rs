//! Per-run temporary workspace.
//!
//! Holds the uploaded video, sampled frames and extracted audio of a single
//! run. The directory is removed when the workspace is dropped, so every exit
//! path of a run (including unwinding) reclaims it.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, warn};
use vscope_models::AnalysisId;

const VIDEO_STEM: &str = "input";
const FRAMES_DIR: &str = "frames";
const AUDIO_DIR: &str = "audio";

/// Keep only the final path component of an uploaded filename.
pub fn sanitize_filename(name: &str) -> String {
    name.rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Lowercased alphanumeric extension of `name`, if it has a usable one.
fn video_extension(name: &str) -> Option<String> {
    let ext = Path::new(name).extension()?.to_str()?;
    (!ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

/// Temporary directory owned by one run.
#[derive(Debug)]
pub struct RunWorkspace {
    dir: TempDir,
}

impl RunWorkspace {
    /// Create a fresh workspace under `parent`.
    pub async fn create(parent: &Path, id: &AnalysisId) -> io::Result<Self> {
        tokio::fs::create_dir_all(parent).await?;

        let parent = parent.to_path_buf();
        let prefix = format!("run-{}-", id);
        let dir = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new().prefix(&prefix).tempdir_in(&parent)
        })
        .await
        .map_err(io::Error::other)??;

        debug!(path = %dir.path().display(), "Run workspace created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.dir.path().join(FRAMES_DIR)
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.dir.path().join(AUDIO_DIR)
    }

    /// Write the uploaded video under a fixed name, keeping its extension.
    pub async fn write_video(&self, filename: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let name = match video_extension(filename) {
            Some(ext) => format!("{}.{}", VIDEO_STEM, ext),
            None => VIDEO_STEM.to_string(),
        };
        let path = self.dir.path().join(name);
        tokio::fs::write(&path, bytes).await?;
        Ok(path)
    }

    /// Remove the workspace now, reporting failures instead of ignoring them.
    pub fn close(self) {
        let path = self.dir.path().to_path_buf();
        if let Err(e) = self.dir.close() {
            warn!(path = %path.display(), error = %e, "Failed to remove run workspace");
        } else {
            debug!(path = %path.display(), "Run workspace removed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("clip.mp4"), "clip.mp4");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\Users\\me\\video.MOV"), "video.MOV");
        assert_eq!(sanitize_filename("dir/"), "");
    }

    #[test]
    fn test_video_extension() {
        assert_eq!(video_extension("a.MP4").as_deref(), Some("mp4"));
        assert_eq!(video_extension("noext"), None);
        assert_eq!(video_extension("weird.m p4"), None);
    }

    #[tokio::test]
    async fn test_workspace_removed_on_drop() {
        let parent = tempfile::TempDir::new().unwrap();
        let path = {
            let ws = RunWorkspace::create(parent.path(), &AnalysisId::new())
                .await
                .unwrap();
            let video = ws.write_video("holiday.mov", b"data").await.unwrap();
            assert_eq!(video.file_name().unwrap(), "input.mov");
            assert!(video.exists());
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_close_removes_contents() {
        let parent = tempfile::TempDir::new().unwrap();
        let ws = RunWorkspace::create(parent.path(), &AnalysisId::new())
            .await
            .unwrap();
        tokio::fs::create_dir_all(ws.frames_dir()).await.unwrap();
        tokio::fs::write(ws.frames_dir().join("frame00001.jpg"), b"x")
            .await
            .unwrap();
        let path = ws.path().to_path_buf();

        ws.close();
        assert!(!path.exists());
    }
}
