//! Artifact delivery

use crate::recorder::Artifact;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Hands a finished recording to the candidate
#[async_trait]
pub trait DownloadSink: Send + Sync {
    async fn deliver(&self, artifact: &Artifact, filename: &str) -> anyhow::Result<()>;
}

/// Writes artifacts into a downloads directory
pub struct DirectoryDownloadSink {
    dir: PathBuf,
}

impl DirectoryDownloadSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where `filename` would be written. Only the final path component is
    /// kept; an empty name gets a timestamped default.
    pub fn target_path(&self, filename: &str) -> PathBuf {
        let name = Path::new(filename)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(default_filename);
        self.dir.join(name)
    }
}

fn default_filename() -> String {
    format!(
        "ielts-speaking-test-{}.webm",
        chrono::Utc::now().timestamp_millis()
    )
}

#[async_trait]
impl DownloadSink for DirectoryDownloadSink {
    async fn deliver(&self, artifact: &Artifact, filename: &str) -> anyhow::Result<()> {
        if artifact.is_empty() {
            anyhow::bail!("No video data to download");
        }

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let path = self.target_path(filename);
        tokio::fs::write(&path, &artifact.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        tracing::info!("Video downloaded: {} ({}KB)", path.display(), artifact.size_kb());
        Ok(())
    }
}
