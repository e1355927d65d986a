//! Resumable, drift-detecting ingestion
//!
//! Every call to [`IngestionController::run_once`] does one bounded unit of
//! work and leaves behind a checkpoint from which the next call can resume,
//! whether or not the current one completes:
//!
//! 1. Probe the size of the universe. If it differs from the checkpoint, the
//!    previous progress is void: every store is cleared and fetching restarts
//!    at offset zero.
//! 2. Run the current stage:
//!    * `Fetching` pulls up to the fetch budget in pages, committing the
//!      checkpoint after each page.
//!    * `WritingWorkingSet` and `WritingChangelog` each write one batch of rows
//!      at their own row offset.
//!    * `Done` does nothing.
//!
//! Any source or persistence failure returns immediately. The checkpoint then
//! still points at the last committed page, so the next call retries it.

use super::checkpoint::{
    load_checkpoint, save_checkpoint, CheckpointStore, IngestionCheckpoint, IngestionStage,
    CHECKPOINT_KEY,
};
use super::sink::RowSink;
use super::source::IssueSource;
use super::store::RecordStore;
use crate::error::Result;
use crate::issues::extract::IssueExtractor;
use crate::issues::record::IssueRecord;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-invocation limits and identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Query selecting the universe
    pub query: String,
    /// Items requested per page
    pub page_size: u64,
    /// Items fetched per invocation at most
    pub fetch_budget: u64,
    /// Working-set rows written per invocation at most
    pub working_set_batch_size: u64,
    /// Changelog rows written per invocation at most
    pub changelog_batch_size: u64,
    /// Tool name used in changelog keys
    pub tool_name: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            query: String::new(),
            page_size: 100,
            fetch_budget: 5000,
            working_set_batch_size: 2500,
            changelog_batch_size: 5000,
            tool_name: "jira".to_string(),
        }
    }
}

/// What one invocation did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationReport {
    /// Stage found in the stored checkpoint (`Fetching` when there was none)
    pub stage_before: IngestionStage,
    /// Stage persisted at the end of the invocation
    pub stage_after: IngestionStage,
    /// Whether the universe size changed since the last invocation
    pub drift_detected: bool,
    /// Whether progress was discarded and the stores cleared
    pub reset_performed: bool,
    /// Items fetched and stored during this invocation
    pub items_fetched: u64,
    /// Rows written to a sink during this invocation
    pub rows_written: u64,
    /// The checkpoint as persisted
    pub checkpoint: IngestionCheckpoint,
}

/// Drives the ingestion state machine over injected collaborators
pub struct IngestionController {
    source: Arc<dyn IssueSource>,
    checkpoints: Arc<dyn CheckpointStore>,
    records: Arc<dyn RecordStore>,
    working_set: Arc<dyn RowSink>,
    changelog: Arc<dyn RowSink>,
    extractor: IssueExtractor,
    settings: ControllerSettings,
}

impl IngestionController {
    /// Create a controller
    pub fn new(
        source: Arc<dyn IssueSource>,
        checkpoints: Arc<dyn CheckpointStore>,
        records: Arc<dyn RecordStore>,
        working_set: Arc<dyn RowSink>,
        changelog: Arc<dyn RowSink>,
        extractor: IssueExtractor,
        settings: ControllerSettings,
    ) -> Self {
        Self {
            source,
            checkpoints,
            records,
            working_set,
            changelog,
            extractor,
            settings,
        }
    }

    /// The settings in use
    pub fn settings(&self) -> &ControllerSettings {
        &self.settings
    }

    /// The stored checkpoint, if any
    pub async fn checkpoint(&self) -> Result<Option<IngestionCheckpoint>> {
        load_checkpoint(self.checkpoints.as_ref()).await
    }

    /// Forget all progress and clear every store
    pub async fn reset(&self) -> Result<()> {
        self.clear_outputs().await?;
        self.checkpoints.remove(CHECKPOINT_KEY).await?;
        info!("Ingestion state reset");
        Ok(())
    }

    async fn clear_outputs(&self) -> Result<()> {
        self.records.clear().await?;
        self.working_set.clear().await?;
        self.changelog.clear().await?;
        Ok(())
    }

    async fn save(&self, checkpoint: &IngestionCheckpoint) -> Result<()> {
        save_checkpoint(self.checkpoints.as_ref(), checkpoint).await
    }

    /// Run one bounded unit of work
    pub async fn run_once(&self) -> Result<InvocationReport> {
        let stored = self.checkpoint().await?;
        let probe = self.source.search(&self.settings.query, 0, 0).await?;
        let total = probe.total;

        let stage_before = stored
            .as_ref()
            .map(|c| c.stage)
            .unwrap_or(IngestionStage::Fetching);

        let (mut checkpoint, drift_detected, reset_performed) = match stored {
            Some(existing) if existing.total_item_count == total => (existing, false, false),
            Some(existing) => {
                info!(
                    "Item count drifted from {} to {}; restarting ingestion",
                    existing.total_item_count, total
                );
                (self.start_over(total).await?, true, true)
            }
            None => {
                info!("No checkpoint found; starting ingestion of {} items", total);
                (self.start_over(total).await?, false, true)
            }
        };

        let mut report = InvocationReport {
            stage_before,
            stage_after: checkpoint.stage,
            drift_detected,
            reset_performed,
            items_fetched: 0,
            rows_written: 0,
            checkpoint: checkpoint.clone(),
        };

        match checkpoint.stage {
            IngestionStage::Fetching => {
                report.items_fetched = self.fetch(&mut checkpoint).await?;
            }
            IngestionStage::WritingWorkingSet => {
                report.rows_written = self.write_working_set(&mut checkpoint).await?;
            }
            IngestionStage::WritingChangelog => {
                report.rows_written = self.write_changelog(&mut checkpoint).await?;
            }
            IngestionStage::Done => {
                debug!("Ingestion is done; nothing to do");
            }
        }

        if checkpoint.stage != report.stage_after {
            info!("Ingestion stage {} -> {}", report.stage_after, checkpoint.stage);
        }
        report.stage_after = checkpoint.stage;
        report.checkpoint = checkpoint;
        Ok(report)
    }

    async fn start_over(&self, total: u64) -> Result<IngestionCheckpoint> {
        self.clear_outputs().await?;
        let checkpoint = IngestionCheckpoint::fresh(total);
        self.save(&checkpoint).await?;
        Ok(checkpoint)
    }

    async fn fetch(&self, checkpoint: &mut IngestionCheckpoint) -> Result<u64> {
        let budget = self.settings.fetch_budget;
        let mut fetched: u64 = 0;

        info!(
            "Fetching up to {} items starting at offset {}",
            budget, checkpoint.last_start_offset
        );

        while checkpoint.remaining_item_count > 0 && fetched < budget {
            let page_size = self.settings.page_size.min(budget - fetched);
            let page = self
                .source
                .search(&self.settings.query, checkpoint.last_start_offset, page_size)
                .await?;

            if page.issues.is_empty() {
                warn!(
                    "Source returned no items at offset {} with {} still expected",
                    checkpoint.last_start_offset, checkpoint.remaining_item_count
                );
                break;
            }

            let records = self.extractor.extract_all(&page.issues);
            self.records.append_rows(&records).await?;

            let count = records.len() as u64;
            checkpoint.record_page(count);
            self.save(checkpoint).await?;
            fetched += count;

            debug!(
                "Stored page of {} items; offset now {}, {} remaining",
                count, checkpoint.last_start_offset, checkpoint.remaining_item_count
            );
        }

        if checkpoint.remaining_item_count == 0 {
            info!("All {} items fetched", checkpoint.total_item_count);
            checkpoint.advance();
            self.save(checkpoint).await?;
        } else {
            info!(
                "{} items fetched; {} of {} remaining",
                fetched, checkpoint.remaining_item_count, checkpoint.total_item_count
            );
        }

        Ok(fetched)
    }

    async fn write_working_set(&self, checkpoint: &mut IngestionCheckpoint) -> Result<u64> {
        let records = self.records.read_all().await?;
        let rows: Vec<Vec<String>> = records.iter().map(IssueRecord::to_row).collect();

        let written = write_batch(
            self.working_set.as_ref(),
            &rows,
            &mut checkpoint.working_set_row,
            self.settings.working_set_batch_size,
        )
        .await?;

        if checkpoint.working_set_row >= rows.len() as u64 {
            checkpoint.advance();
        }
        checkpoint.touch();
        self.save(checkpoint).await?;
        Ok(written)
    }

    async fn write_changelog(&self, checkpoint: &mut IngestionCheckpoint) -> Result<u64> {
        let records = self.records.read_all().await?;
        let rows: Vec<Vec<String>> = records
            .iter()
            .flat_map(|r| r.changelog_rows(&self.settings.tool_name))
            .map(|row| row.to_row())
            .collect();

        let written = write_batch(
            self.changelog.as_ref(),
            &rows,
            &mut checkpoint.changelog_row,
            self.settings.changelog_batch_size,
        )
        .await?;

        if checkpoint.changelog_row >= rows.len() as u64 {
            checkpoint.advance();
        }
        checkpoint.touch();
        self.save(checkpoint).await?;
        Ok(written)
    }
}

/// Write the next batch of `rows` at `*offset`, advancing it on success
async fn write_batch(
    sink: &dyn RowSink,
    rows: &[Vec<String>],
    offset: &mut u64,
    batch_size: u64,
) -> Result<u64> {
    let total = rows.len() as u64;
    let start = (*offset).min(total);
    let end = start.saturating_add(batch_size).min(total);

    let slice = &rows[start as usize..end as usize];
    sink.write_batch(start, slice).await?;

    info!("Wrote rows {} to {} of {}", start, end, total);
    *offset = end;
    Ok(end - start)
}
