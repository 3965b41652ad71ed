//! Local filesystem checkpoint store.
//!
//! Writes are atomic: the JSON document goes to a sibling `.tmp` file which is
//! then renamed over the checkpoint path. Reads never fail; a missing, corrupt,
//! or stale file is reported as no checkpoint.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::CheckpointConfig;
use crate::storage::{Checkpoint, CheckpointStore};

/// Checkpoint file on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalCheckpointStore {
    path: PathBuf,
    max_age: Duration,
}

impl LocalCheckpointStore {
    /// Create a store at `path` that ignores checkpoints older than `max_age`.
    pub fn new(path: impl Into<PathBuf>, max_age: Duration) -> Self {
        Self {
            path: path.into(),
            max_age,
        }
    }

    pub fn from_config(config: &CheckpointConfig) -> Self {
        Self::new(&config.path, config.max_age())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sibling file that receives writes before the rename.
    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.ensure_dir().await?;

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Load the checkpoint as seen at `now`.
    pub async fn load_at(&self, now: DateTime<Utc>) -> Option<Checkpoint> {
        let bytes = match self.read_bytes().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                log::debug!("No checkpoint at {}", self.path.display());
                return None;
            }
            Err(e) => {
                log::warn!("Failed to read checkpoint {}: {}", self.path.display(), e);
                return None;
            }
        };

        let checkpoint: Checkpoint = match serde_json::from_slice(&bytes) {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                log::warn!("Ignoring unreadable checkpoint {}: {}", self.path.display(), e);
                return None;
            }
        };

        if checkpoint.is_stale(now, self.max_age) {
            log::info!(
                "Checkpoint from {} is too old, ignoring",
                checkpoint.timestamp
            );
            return None;
        }

        log::info!(
            "Checkpoint loaded ({} rooms, written {})",
            checkpoint.classrooms.len(),
            checkpoint.timestamp
        );
        Some(checkpoint)
    }
}

#[async_trait]
impl CheckpointStore for LocalCheckpointStore {
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        self.write_bytes(&bytes).await?;
        log::debug!("Checkpoint written to {}", self.path.display());
        Ok(())
    }

    async fn load(&self) -> Option<Checkpoint> {
        self.load_at(Utc::now()).await
    }
}
