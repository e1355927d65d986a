//! Row sinks for the working-set and changelog writing stages
//!
//! A batch written at `start_row` replaces everything from that row on, so
//! replaying a batch after a failed checkpoint write leaves the same rows
//! behind as writing it once.

use crate::common::atomic_write;
use crate::error::{IssueFlowError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A rectangular output target addressed by zero-based row offset
#[async_trait::async_trait]
pub trait RowSink: Send + Sync {
    /// Write `rows` starting at `start_row`, discarding anything at or after it
    async fn write_batch(&self, start_row: u64, rows: &[Vec<String>]) -> Result<()>;

    /// Remove every row
    async fn clear(&self) -> Result<()>;

    /// Number of rows currently held
    async fn row_count(&self) -> Result<u64>;
}

fn offset_index(start_row: u64, existing: usize, operation: &str) -> Result<usize> {
    let index = usize::try_from(start_row).unwrap_or(usize::MAX);
    if index > existing {
        return Err(IssueFlowError::persistence_failed(
            operation,
            format!(
                "row offset {} is past the end of the sink ({} rows)",
                start_row, existing
            ),
        ));
    }
    Ok(index)
}

/// In-memory row sink
#[derive(Debug, Clone, Default)]
pub struct MemoryRowSink {
    rows: Arc<RwLock<Vec<Vec<String>>>>,
    fail_writes: Arc<RwLock<bool>>,
}

impl MemoryRowSink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail (or succeed again)
    pub async fn set_fail_writes(&self, fail: bool) {
        *self.fail_writes.write().await = fail;
    }

    /// A copy of every row
    pub async fn rows(&self) -> Vec<Vec<String>> {
        self.rows.read().await.clone()
    }
}

#[async_trait::async_trait]
impl RowSink for MemoryRowSink {
    async fn write_batch(&self, start_row: u64, rows: &[Vec<String>]) -> Result<()> {
        if *self.fail_writes.read().await {
            return Err(IssueFlowError::persistence_failed(
                "write rows",
                "simulated sink failure",
            ));
        }
        let mut held = self.rows.write().await;
        let index = offset_index(start_row, held.len(), "write rows")?;
        held.truncate(index);
        held.extend_from_slice(rows);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.rows.write().await.clear();
        Ok(())
    }

    async fn row_count(&self) -> Result<u64> {
        Ok(self.rows.read().await.len() as u64)
    }
}

/// Row sink backed by a headerless CSV file
#[derive(Debug, Clone)]
pub struct CsvRowSink {
    path: PathBuf,
}

impl CsvRowSink {
    /// Use the file at `path`; it is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_rows(&self) -> Result<Vec<Vec<String>>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(str::to_string).collect());
        }
        Ok(rows)
    }

    fn write_rows(&self, rows: &[Vec<String>]) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_writer(Vec::new());
        for row in rows {
            writer.write_record(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| IssueFlowError::Other(format!("CSV buffer error: {}", e)))?;
        atomic_write(&self.path, &bytes)
    }
}

#[async_trait::async_trait]
impl RowSink for CsvRowSink {
    async fn write_batch(&self, start_row: u64, rows: &[Vec<String>]) -> Result<()> {
        let as_persistence = |e: IssueFlowError| {
            IssueFlowError::persistence_failed(
                "write rows",
                format!("{}: {}", self.path.display(), e),
            )
        };

        let mut held = self.read_rows().map_err(as_persistence)?;
        let index = offset_index(start_row, held.len(), "write rows")?;
        held.truncate(index);
        held.extend_from_slice(rows);
        self.write_rows(&held).map_err(as_persistence)
    }

    async fn clear(&self) -> Result<()> {
        atomic_write(&self.path, b"")
            .map_err(|e| IssueFlowError::persistence_failed("clear rows", e.to_string()))
    }

    async fn row_count(&self) -> Result<u64> {
        Ok(self.read_rows()?.len() as u64)
    }
}
