use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;

use super::{empty_document, merge_goals, JourneyStore};
use crate::lock::{self, FileLock, DEFAULT_LOCK_TIMEOUT_MS};
use crate::model::Journey;

/// Journey document kept as pretty JSON on disk.
///
/// Reads and read-modify-writes hold `<path>.lock`; writes go through a
/// temp file and rename so readers never see a partial document.
#[derive(Debug, Clone)]
pub struct FileJourneyStore {
    path: PathBuf,
    lock_timeout_ms: u64,
}

impl FileJourneyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }

    pub fn with_lock_timeout(mut self, timeout_ms: u64) -> Self {
        self.lock_timeout_ms = timeout_ms;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Blocking read; a missing file is an empty journey.
    pub fn read_document(&self) -> crate::Result<Value> {
        match lock::read_locked(&self.path, self.lock_timeout_ms)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
            None => Ok(empty_document()),
        }
    }

    /// Blocking write of the whole document.
    pub fn write_document(&self, document: &Value) -> crate::Result<()> {
        let json = serde_json::to_string_pretty(document)?;
        lock::write_atomic_locked(&self.path, json.as_bytes(), self.lock_timeout_ms)
    }

    fn replace_goals(&self, journey: &Journey) -> crate::Result<()> {
        let _lock = FileLock::acquire(lock::lock_path_for(&self.path), self.lock_timeout_ms)?;
        let mut document = match std::fs::read(&self.path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => empty_document(),
            Err(err) => return Err(err.into()),
        };
        merge_goals(&mut document, journey)?;
        let json = serde_json::to_string_pretty(&document)?;
        lock::write_atomic(&self.path, json.as_bytes())
    }
}

#[async_trait]
impl JourneyStore for FileJourneyStore {
    async fn get_journey(&self) -> anyhow::Result<Value> {
        let store = self.clone();
        let document = tokio::task::spawn_blocking(move || store.read_document())
            .await
            .context("journey read task failed")?
            .with_context(|| format!("reading {}", self.path.display()))?;
        Ok(document)
    }

    async fn update_journey(&self, journey: &Journey) -> anyhow::Result<()> {
        let store = self.clone();
        let journey = journey.clone();
        tokio::task::spawn_blocking(move || store.replace_goals(&journey))
            .await
            .context("journey write task failed")?
            .with_context(|| format!("writing {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), "journey document written");
        Ok(())
    }
}
