//! Checkpoint persistence.
//!
//! The observer keeps one recovery file holding the last detected state so a
//! restart does not report unchanged data as new:
//!
//! ```text
//! {
//!   "timestamp": "2025-06-01T12:00:00Z",
//!   "data_hash": "<sha256 hex>",
//!   "classrooms": [ ... ]
//! }
//! ```

pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::Room;
use crate::pipeline::Fingerprint;

// Re-export for convenience
pub use local::LocalCheckpointStore;

/// Last known state written after every detected change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// When the checkpoint was written
    pub timestamp: DateTime<Utc>,
    /// Fingerprint of `classrooms`
    pub data_hash: Fingerprint,
    /// Full decoded collection, kept for recovery display
    pub classrooms: Vec<Room>,
}

impl Checkpoint {
    pub fn new(data_hash: Fingerprint, classrooms: Vec<Room>) -> Self {
        Self {
            timestamp: Utc::now(),
            data_hash,
            classrooms,
        }
    }

    /// Whether the checkpoint is older than `max_age` at `now`.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        now - self.timestamp > max_age
    }
}

/// Trait for checkpoint backends.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Persist a checkpoint, replacing any previous one.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// Load the checkpoint if present, readable and fresh.
    async fn load(&self) -> Option<Checkpoint>;

    /// Fingerprint of a fresh checkpoint, if any.
    async fn load_fingerprint(&self) -> Option<Fingerprint> {
        self.load().await.map(|checkpoint| checkpoint.data_hash)
    }
}
