//! Persisted issue records
//!
//! Appends are at-least-once: a page retried after a failed checkpoint write
//! is appended a second time. Stores never rewrite history on append. Instead
//! [`RecordStore::read_all`] collapses duplicates by issue key, keeping the
//! most recently appended copy at the position the key was first seen.

use crate::common::{atomic_write, ensure_parent_dir};
use crate::error::{IssueFlowError, Result};
use crate::issues::record::IssueRecord;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Append-preferred store of extracted records
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Append `rows` after everything already stored
    async fn append_rows(&self, rows: &[IssueRecord]) -> Result<()>;

    /// Every stored record, de-duplicated by key
    async fn read_all(&self) -> Result<Vec<IssueRecord>>;

    /// Remove every record
    async fn clear(&self) -> Result<()>;
}

/// Collapse duplicate keys: last copy wins, first-seen position is kept
pub fn dedupe_by_key(records: Vec<IssueRecord>) -> Vec<IssueRecord> {
    let mut position: HashMap<String, usize> = HashMap::new();
    let mut unique: Vec<IssueRecord> = Vec::with_capacity(records.len());

    for record in records {
        match position.get(&record.key) {
            Some(&index) => unique[index] = record,
            None => {
                position.insert(record.key.clone(), unique.len());
                unique.push(record);
            }
        }
    }
    unique
}

/// Failure switches for [`MemoryRecordStore`]
#[derive(Debug, Clone, Default)]
pub struct MemoryStoreConfig {
    /// Fail appends
    pub fail_append: bool,
    /// Fail reads
    pub fail_read: bool,
    /// Fail clears
    pub fail_clear: bool,
}

/// In-memory record store
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    rows: Arc<RwLock<Vec<IssueRecord>>>,
    config: Arc<RwLock<MemoryStoreConfig>>,
}

impl MemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Change the failure switches
    pub async fn set_config(&self, config: MemoryStoreConfig) {
        *self.config.write().await = config;
    }

    /// Number of appended rows, duplicates included
    pub async fn raw_len(&self) -> usize {
        self.rows.read().await.len()
    }
}

#[async_trait::async_trait]
impl RecordStore for MemoryRecordStore {
    async fn append_rows(&self, rows: &[IssueRecord]) -> Result<()> {
        if self.config.read().await.fail_append {
            return Err(IssueFlowError::persistence_failed(
                "append records",
                "simulated record store failure",
            ));
        }
        self.rows.write().await.extend_from_slice(rows);
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<IssueRecord>> {
        if self.config.read().await.fail_read {
            return Err(IssueFlowError::persistence_failed(
                "read records",
                "simulated record store failure",
            ));
        }
        Ok(dedupe_by_key(self.rows.read().await.clone()))
    }

    async fn clear(&self) -> Result<()> {
        if self.config.read().await.fail_clear {
            return Err(IssueFlowError::persistence_failed(
                "clear records",
                "simulated record store failure",
            ));
        }
        self.rows.write().await.clear();
        Ok(())
    }
}

/// Record store writing one JSON object per line
#[derive(Debug, Clone)]
pub struct JsonLinesRecordStore {
    path: PathBuf,
}

impl JsonLinesRecordStore {
    /// Use the file at `path`; it is created on first append
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append_sync(&self, rows: &[IssueRecord]) -> Result<()> {
        ensure_parent_dir(&self.path)?;
        if self.path.exists() {
            let mut existing = OpenOptions::new().read(true).write(true).open(&self.path)?;
            if let Some(kept) = trim_torn_tail(&mut existing)? {
                warn!(
                    "Dropped an unterminated line at the end of {}; kept {} bytes",
                    self.path.display(),
                    kept
                );
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(file);
        for row in rows {
            serde_json::to_writer(&mut writer, row)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }
}

/// Cut a trailing partial line left by an interrupted append
///
/// Returns the new length when something was removed.
fn trim_torn_tail(file: &mut File) -> io::Result<Option<u64>> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(None);
    }

    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    if last[0] == b'\n' {
        return Ok(None);
    }

    let mut buf = vec![0u8; 8192];
    let mut end = len;
    while end > 0 {
        let start = end.saturating_sub(buf.len() as u64);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(pos) = chunk.iter().rposition(|b| *b == b'\n') {
            let kept = start + pos as u64 + 1;
            file.set_len(kept)?;
            return Ok(Some(kept));
        }
        end = start;
    }
    file.set_len(0)?;
    Ok(Some(0))
}

#[async_trait::async_trait]
impl RecordStore for JsonLinesRecordStore {
    async fn append_rows(&self, rows: &[IssueRecord]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.append_sync(rows).map_err(|e| {
            IssueFlowError::persistence_failed(
                "append records",
                format!("{}: {}", self.path.display(), e),
            )
        })?;
        debug!("Appended {} records to {}", rows.len(), self.path.display());
        Ok(())
    }

    async fn read_all(&self) -> Result<Vec<IssueRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            IssueFlowError::persistence_failed(
                "read records",
                format!("{}: {}", self.path.display(), e),
            )
        })?;

        let mut records = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<IssueRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!(
                    "Skipping unreadable record at {}:{}: {}",
                    self.path.display(),
                    index + 1,
                    e
                ),
            }
        }
        Ok(dedupe_by_key(records))
    }

    async fn clear(&self) -> Result<()> {
        atomic_write(&self.path, b"").map_err(|e| {
            IssueFlowError::persistence_failed("clear records", e.to_string())
        })
    }
}
