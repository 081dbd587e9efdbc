//! Store implementations.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use vscope_models::AnalysisRecord;

use crate::error::{StoreError, StoreResult};

/// Destination for finished analyses.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Persist one record.
    async fn record(&self, record: &AnalysisRecord) -> StoreResult<()>;

    /// Store name for logging.
    fn name(&self) -> &'static str;
}

/// Process-local store, used when no durable store is configured.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: Mutex<Vec<AnalysisRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far, in insertion order.
    pub fn records(&self) -> Vec<AnalysisRecord> {
        self.records
            .lock()
            .map(|r| r.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AnalysisStore for InMemoryStore {
    async fn record(&self, record: &AnalysisRecord) -> StoreResult<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| StoreError::unavailable("in-memory store lock poisoned"))?;
        records.push(record.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Append-only JSON-lines file, one record per line.
#[derive(Debug)]
pub struct JsonLinesStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonLinesStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back. Used by tooling and tests.
    pub async fn load(&self) -> StoreResult<Vec<AnalysisRecord>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl AnalysisStore for JsonLinesStore {
    async fn record(&self, record: &AnalysisRecord) -> StoreResult<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;

        debug!(analysis_id = %record.id, path = %self.path.display(), "Analysis recorded");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "jsonl"
    }
}
