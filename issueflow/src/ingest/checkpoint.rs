//! Ingestion checkpoint and its durable key-value store
//!
//! The whole checkpoint is serialized as one JSON value under
//! [`CHECKPOINT_KEY`], so every invocation reads and writes it as a unit.

use crate::common::{atomic_write, ensure_parent_dir};
use crate::error::{ErrorContext, IssueFlowError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Key the checkpoint is stored under
pub const CHECKPOINT_KEY: &str = "ingestion_checkpoint";

/// Ingestion stages, in the only order they may be visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionStage {
    /// Pulling pages from the issue source into the record store
    Fetching,
    /// Writing working-set rows in batches
    WritingWorkingSet,
    /// Writing changelog rows in batches
    WritingChangelog,
    /// Nothing left to do until the universe drifts
    Done,
}

impl IngestionStage {
    /// The stage after this one; `Done` is terminal
    pub fn next(self) -> Self {
        match self {
            IngestionStage::Fetching => IngestionStage::WritingWorkingSet,
            IngestionStage::WritingWorkingSet => IngestionStage::WritingChangelog,
            IngestionStage::WritingChangelog => IngestionStage::Done,
            IngestionStage::Done => IngestionStage::Done,
        }
    }

    /// String form of the stage
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestionStage::Fetching => "fetching",
            IngestionStage::WritingWorkingSet => "writing_working_set",
            IngestionStage::WritingChangelog => "writing_changelog",
            IngestionStage::Done => "done",
        }
    }
}

impl fmt::Display for IngestionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable ingestion progress
///
/// `remaining_item_count` always equals `total_item_count` minus the items
/// processed since the last reset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestionCheckpoint {
    /// Size of the universe at the last reset
    pub total_item_count: u64,
    /// Items still to fetch
    pub remaining_item_count: u64,
    /// Offset of the next page to request
    pub last_start_offset: u64,
    /// Current stage
    pub stage: IngestionStage,
    /// Next working-set row to write
    pub working_set_row: u64,
    /// Next changelog row to write
    pub changelog_row: u64,
    /// Last time the checkpoint changed
    pub updated_at: Option<DateTime<Utc>>,
}

impl IngestionCheckpoint {
    /// A checkpoint at the start of a universe of `total` items
    pub fn fresh(total: u64) -> Self {
        Self {
            total_item_count: total,
            remaining_item_count: total,
            last_start_offset: 0,
            stage: IngestionStage::Fetching,
            working_set_row: 0,
            changelog_row: 0,
            updated_at: Some(Utc::now()),
        }
    }

    /// Items fetched since the last reset
    pub fn processed_item_count(&self) -> u64 {
        self.total_item_count.saturating_sub(self.remaining_item_count)
    }

    /// Account for a committed page of `count` items
    pub fn record_page(&mut self, count: u64) {
        self.last_start_offset += count;
        self.remaining_item_count = self.remaining_item_count.saturating_sub(count);
        self.touch();
    }

    /// Move to the next stage
    pub fn advance(&mut self) {
        self.stage = self.stage.next();
        self.touch();
    }

    /// Stamp the modification time
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    /// Decode from the stored value
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|e| IssueFlowError::Checkpoint(format!("stored checkpoint is unreadable: {}", e)))
    }

    /// Encode for storage
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Durable key-value state shared across invocations
#[async_trait::async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Read the value under `key`
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace the value under `key`
    async fn set(&self, key: &str, value: Value) -> Result<()>;

    /// Delete the value under `key`
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Load the ingestion checkpoint, if one was saved
pub async fn load_checkpoint(store: &dyn CheckpointStore) -> Result<Option<IngestionCheckpoint>> {
    match store.get(CHECKPOINT_KEY).await? {
        Some(value) => IngestionCheckpoint::from_value(value).map(Some),
        None => Ok(None),
    }
}

/// Save the ingestion checkpoint
pub async fn save_checkpoint(
    store: &dyn CheckpointStore,
    checkpoint: &IngestionCheckpoint,
) -> Result<()> {
    store.set(CHECKPOINT_KEY, checkpoint.to_value()?).await
}

/// In-memory checkpoint store
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    values: Arc<RwLock<BTreeMap<String, Value>>>,
    fail_set: Arc<RwLock<bool>>,
}

impl MemoryCheckpointStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `set` fail (or succeed again)
    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_set.write().await = fail;
    }
}

#[async_trait::async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.values.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        if *self.fail_set.read().await {
            return Err(IssueFlowError::persistence_failed(
                "checkpoint write",
                "simulated checkpoint store failure",
            ));
        }
        self.values.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.values.write().await.remove(key);
        Ok(())
    }
}

/// Checkpoint store backed by a single JSON file
///
/// The file holds one object mapping keys to values and is replaced atomically
/// on every write.
#[derive(Debug, Clone)]
pub struct FileSystemCheckpointStore {
    path: PathBuf,
}

impl FileSystemCheckpointStore {
    /// Use the file at `path`; it is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_map(&self) -> Result<BTreeMap<String, Value>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("cannot read checkpoint file {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|e| {
            IssueFlowError::Checkpoint(format!(
                "checkpoint file {} is not valid JSON: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn write_map(&self, map: &BTreeMap<String, Value>) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        let content = serde_json::to_vec_pretty(map)?;
        atomic_write(&self.path, &content).map_err(|e| {
            IssueFlowError::persistence_failed("checkpoint write", e.to_string())
        })
    }
}

#[async_trait::async_trait]
impl CheckpointStore for FileSystemCheckpointStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_map()?.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(key.to_string(), value);
        self.write_map(&map)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut map = self.read_map()?;
        if map.remove(key).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}
