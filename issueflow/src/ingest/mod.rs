//! Resumable batch ingestion
//!
//! The [`IngestionController`] owns no state of its own. Progress lives in a
//! [`CheckpointStore`], fetched records in a [`RecordStore`], and the two
//! output tables in [`RowSink`]s, all injected as trait objects so the same
//! state machine runs against files in production and memory in tests.

/// Checkpoint type and stores
pub mod checkpoint;
/// The ingestion state machine
pub mod controller;
/// Working-set and changelog row sinks
pub mod sink;
/// Issue sources
pub mod source;
/// Record stores
pub mod store;

pub use checkpoint::{
    load_checkpoint, save_checkpoint, CheckpointStore, FileSystemCheckpointStore,
    IngestionCheckpoint, IngestionStage, MemoryCheckpointStore, CHECKPOINT_KEY,
};
pub use controller::{ControllerSettings, IngestionController, InvocationReport};
pub use sink::{CsvRowSink, MemoryRowSink, RowSink};
pub use source::{FileSystemIssueSource, IssueSource, MemoryIssueSource, MemorySourceConfig, SearchPage};
pub use store::{dedupe_by_key, JsonLinesRecordStore, MemoryRecordStore, MemoryStoreConfig, RecordStore};
