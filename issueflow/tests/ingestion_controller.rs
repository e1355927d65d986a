//! End-to-end tests of the ingestion state machine over memory and file backends

use issueflow::error::IssueFlowError;
use issueflow::ingest::{
    ControllerSettings, CsvRowSink, FileSystemCheckpointStore, FileSystemIssueSource,
    IngestionController, IngestionStage, JsonLinesRecordStore, MemoryCheckpointStore,
    MemoryIssueSource, MemoryRecordStore, MemoryRowSink, MemorySourceConfig, MemoryStoreConfig,
    RecordStore, RowSink,
};
use issueflow::issues::{CategoryMap, ElapsedCalendar, IssueExtractor, TrackerIssue};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

fn tracker_issue(n: usize) -> TrackerIssue {
    serde_json::from_value(json!({
        "id": format!("{}", 10_000 + n),
        "key": format!("SHOP-{}", n),
        "fields": {
            "project": { "key": "SHOP", "name": "Storefront" },
            "issuetype": { "name": "Task" },
            "created": "2024-03-04T08:00:00.000+0000",
            "reporter": { "displayName": "Ana Souza" },
            "assignee": { "displayName": "Bruno Lima" }
        },
        "changelog": {
            "histories": [
                {
                    "created": "2024-03-04T10:00:00.000+0000",
                    "author": { "displayName": "Bruno Lima" },
                    "items": [{ "field": "status", "from": "1", "to": "3",
                                "fromString": "Backlog", "toString": "Doing" }]
                },
                {
                    "created": "2024-03-04T15:00:00.000+0000",
                    "author": { "displayName": "Bruno Lima" },
                    "items": [{ "field": "status", "from": "3", "to": "5",
                                "fromString": "Doing", "toString": "Done" }]
                }
            ]
        }
    }))
    .unwrap()
}

fn tracker_issues(n: usize) -> Vec<TrackerIssue> {
    (1..=n).map(tracker_issue).collect()
}

fn extractor() -> IssueExtractor {
    let categories = CategoryMap::new()
        .with("1", "backlog_time")
        .with("3", "in_progress_time")
        .with("5", "done_time");
    IssueExtractor::new(categories, Arc::new(ElapsedCalendar))
}

struct Harness {
    source: MemoryIssueSource,
    checkpoints: MemoryCheckpointStore,
    records: MemoryRecordStore,
    working_set: MemoryRowSink,
    changelog: MemoryRowSink,
    controller: IngestionController,
}

fn harness(issues: Vec<TrackerIssue>, settings: ControllerSettings) -> Harness {
    let source = MemoryIssueSource::new(issues);
    let checkpoints = MemoryCheckpointStore::new();
    let records = MemoryRecordStore::new();
    let working_set = MemoryRowSink::new();
    let changelog = MemoryRowSink::new();
    let controller = IngestionController::new(
        Arc::new(source.clone()),
        Arc::new(checkpoints.clone()),
        Arc::new(records.clone()),
        Arc::new(working_set.clone()),
        Arc::new(changelog.clone()),
        extractor(),
        settings,
    );
    Harness {
        source,
        checkpoints,
        records,
        working_set,
        changelog,
        controller,
    }
}

fn settings(page_size: u64, fetch_budget: u64) -> ControllerSettings {
    ControllerSettings {
        query: "project = SHOP".to_string(),
        page_size,
        fetch_budget,
        working_set_batch_size: 2,
        changelog_batch_size: 10,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_full_cycle_reaches_done() {
    let h = harness(tracker_issues(5), settings(2, 5000));

    let report = h.controller.run_once().await.unwrap();
    assert_eq!(report.items_fetched, 5);
    assert_eq!(report.stage_after, IngestionStage::WritingWorkingSet);

    let mut stages = Vec::new();
    for _ in 0..5 {
        let report = h.controller.run_once().await.unwrap();
        stages.push((report.stage_after, report.rows_written));
    }
    assert_eq!(
        stages,
        vec![
            (IngestionStage::WritingWorkingSet, 2),
            (IngestionStage::WritingWorkingSet, 2),
            (IngestionStage::WritingChangelog, 1),
            (IngestionStage::WritingChangelog, 10),
            (IngestionStage::Done, 5),
        ]
    );

    let working_set = h.working_set.rows().await;
    assert_eq!(working_set.len(), 5);
    assert!(working_set.iter().all(|row| row.len() == 33));
    assert_eq!(working_set[0][3], "SHOP-1");

    let changelog = h.changelog.rows().await;
    assert_eq!(changelog.len(), 15);
    assert_eq!(changelog[0][0], "jira-SHOP-1");
    assert_eq!(changelog[0][3], "SHOP | Storefront");
    assert_eq!(changelog[0][6], "created Task");
    assert_eq!(changelog[1][7], "item jira-SHOP-1 moved to: in_progress");
    assert_eq!(changelog[2][7], "item jira-SHOP-1 moved to: done");

    let finished = h.controller.run_once().await.unwrap();
    assert_eq!(finished.stage_before, IngestionStage::Done);
    assert_eq!(finished.stage_after, IngestionStage::Done);
    assert_eq!(finished.items_fetched, 0);
    assert_eq!(finished.rows_written, 0);
    assert_eq!(h.changelog.rows().await.len(), 15);
}

#[tokio::test]
async fn test_fetch_respects_budget_and_resumes() {
    let h = harness(tracker_issues(7), settings(2, 5));

    let report = h.controller.run_once().await.unwrap();
    assert_eq!(report.items_fetched, 5);
    assert_eq!(report.stage_after, IngestionStage::Fetching);
    assert_eq!(report.checkpoint.last_start_offset, 5);
    assert_eq!(report.checkpoint.remaining_item_count, 2);
    assert_eq!(
        h.source.requests().await,
        vec![(0, 0), (0, 2), (2, 2), (4, 1)]
    );

    let report = h.controller.run_once().await.unwrap();
    assert_eq!(report.items_fetched, 2);
    assert_eq!(report.stage_after, IngestionStage::WritingWorkingSet);
    assert_eq!(h.records.read_all().await.unwrap().len(), 7);
}

#[tokio::test]
async fn test_drift_during_fetch_restarts_from_zero() {
    let h = harness(tracker_issues(4), settings(2, 2));
    h.controller.run_once().await.unwrap();
    assert_eq!(h.records.raw_len().await, 2);

    h.source.push_issue(tracker_issue(5)).await;
    let report = h.controller.run_once().await.unwrap();

    assert!(report.drift_detected);
    assert!(report.reset_performed);
    assert_eq!(report.stage_after, IngestionStage::Fetching);
    assert_eq!(report.checkpoint.total_item_count, 5);
    assert_eq!(report.checkpoint.last_start_offset, 2);
    assert_eq!(h.records.raw_len().await, 2);
    assert_eq!(h.source.requests().await.last(), Some(&(0, 2)));
}

#[tokio::test]
async fn test_drift_during_writing_clears_outputs() {
    let h = harness(tracker_issues(4), settings(10, 100));
    h.controller.run_once().await.unwrap();
    h.controller.run_once().await.unwrap();
    assert_eq!(h.working_set.row_count().await.unwrap(), 2);

    h.source.set_issues(tracker_issues(3)).await;
    let report = h.controller.run_once().await.unwrap();

    assert!(report.drift_detected);
    assert_eq!(report.stage_before, IngestionStage::WritingWorkingSet);
    assert_eq!(report.checkpoint.working_set_row, 0);
    assert_eq!(report.checkpoint.total_item_count, 3);
    assert_eq!(h.working_set.row_count().await.unwrap(), 0);
    assert_eq!(h.records.read_all().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_unchanged_total_is_not_drift() {
    let h = harness(tracker_issues(4), settings(2, 2));
    h.controller.run_once().await.unwrap();
    let report = h.controller.run_once().await.unwrap();
    assert!(!report.drift_detected);
    assert!(!report.reset_performed);
    assert_eq!(report.stage_after, IngestionStage::WritingWorkingSet);
}

#[tokio::test]
async fn test_probe_failure_changes_nothing() {
    let h = harness(tracker_issues(4), settings(2, 2));
    h.controller.run_once().await.unwrap();
    let before = h.controller.checkpoint().await.unwrap();

    h.source
        .set_config(MemorySourceConfig {
            fail_probe: true,
            ..Default::default()
        })
        .await;
    let err = h.controller.run_once().await.unwrap_err();
    assert!(matches!(err, IssueFlowError::Source { .. }));
    assert_eq!(h.controller.checkpoint().await.unwrap(), before);
}

#[tokio::test]
async fn test_page_failure_keeps_completed_pages() {
    let h = harness(tracker_issues(4), settings(2, 100));
    h.source
        .set_config(MemorySourceConfig {
            fail_fetch_at_offset: Some(2),
            ..Default::default()
        })
        .await;

    let err = h.controller.run_once().await.unwrap_err();
    assert!(matches!(err, IssueFlowError::Source { .. }));
    let checkpoint = h.controller.checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.last_start_offset, 2);
    assert_eq!(checkpoint.stage, IngestionStage::Fetching);

    h.source.set_config(MemorySourceConfig::default()).await;
    let report = h.controller.run_once().await.unwrap();
    assert!(!report.reset_performed);
    assert_eq!(report.items_fetched, 2);
    assert_eq!(report.stage_after, IngestionStage::WritingWorkingSet);
    assert_eq!(h.records.raw_len().await, 4);
}

#[tokio::test]
async fn test_append_failure_does_not_advance() {
    let h = harness(tracker_issues(3), settings(2, 100));
    h.records
        .set_config(MemoryStoreConfig {
            fail_append: true,
            ..Default::default()
        })
        .await;

    let err = h.controller.run_once().await.unwrap_err();
    assert!(matches!(err, IssueFlowError::Persistence { .. }));
    let checkpoint = h.controller.checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.last_start_offset, 0);
    assert_eq!(checkpoint.remaining_item_count, 3);

    h.records.set_config(MemoryStoreConfig::default()).await;
    let report = h.controller.run_once().await.unwrap();
    assert_eq!(report.items_fetched, 3);
}

#[tokio::test]
async fn test_checkpoint_failure_replays_page_without_duplicates() {
    let h = harness(tracker_issues(4), settings(2, 2));
    h.controller.run_once().await.unwrap();

    h.checkpoints.set_fail_writes(true).await;
    let err = h.controller.run_once().await.unwrap_err();
    assert!(matches!(err, IssueFlowError::Persistence { .. }));
    assert_eq!(h.records.raw_len().await, 4);
    let checkpoint = h.controller.checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.last_start_offset, 2);

    h.checkpoints.set_fail_writes(false).await;
    let report = h.controller.run_once().await.unwrap();
    assert_eq!(report.stage_after, IngestionStage::WritingWorkingSet);
    assert_eq!(h.records.raw_len().await, 6);

    let keys: Vec<String> = h
        .records
        .read_all()
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.key)
        .collect();
    assert_eq!(keys, vec!["SHOP-1", "SHOP-2", "SHOP-3", "SHOP-4"]);

    h.controller.run_once().await.unwrap();
    h.controller.run_once().await.unwrap();
    assert_eq!(h.working_set.row_count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_sink_failure_does_not_advance_offset() {
    let h = harness(tracker_issues(3), settings(10, 100));
    h.controller.run_once().await.unwrap();

    h.working_set.set_fail_writes(true).await;
    assert!(h.controller.run_once().await.is_err());
    let checkpoint = h.controller.checkpoint().await.unwrap().unwrap();
    assert_eq!(checkpoint.working_set_row, 0);
    assert_eq!(checkpoint.stage, IngestionStage::WritingWorkingSet);

    h.working_set.set_fail_writes(false).await;
    let report = h.controller.run_once().await.unwrap();
    assert_eq!(report.rows_written, 2);
    assert_eq!(report.checkpoint.working_set_row, 2);
}

#[tokio::test]
async fn test_reset_then_run_starts_fresh() {
    let h = harness(tracker_issues(2), settings(10, 100));
    h.controller.run_once().await.unwrap();
    h.controller.run_once().await.unwrap();

    h.controller.reset().await.unwrap();
    assert!(h.controller.checkpoint().await.unwrap().is_none());
    assert_eq!(h.records.raw_len().await, 0);
    assert_eq!(h.working_set.row_count().await.unwrap(), 0);

    let report = h.controller.run_once().await.unwrap();
    assert!(report.reset_performed);
    assert!(!report.drift_detected);
    assert_eq!(report.items_fetched, 2);
}

struct FileBackends {
    _dir: TempDir,
    export: std::path::PathBuf,
    checkpoint: std::path::PathBuf,
    records: std::path::PathBuf,
    working_set: std::path::PathBuf,
    changelog: std::path::PathBuf,
}

impl FileBackends {
    fn new(export: serde_json::Value) -> Self {
        let dir = TempDir::new().unwrap();
        let data = dir.path().join("data");
        let export_path = dir.path().join("issues.json");
        std::fs::write(&export_path, serde_json::to_vec(&export).unwrap()).unwrap();
        Self {
            export: export_path,
            checkpoint: data.join("checkpoint.json"),
            records: data.join("records.jsonl"),
            working_set: data.join("working_set.csv"),
            changelog: data.join("changelog.csv"),
            _dir: dir,
        }
    }

    fn controller(&self, settings: ControllerSettings) -> IngestionController {
        IngestionController::new(
            Arc::new(FileSystemIssueSource::new(&self.export)),
            Arc::new(FileSystemCheckpointStore::new(&self.checkpoint)),
            Arc::new(JsonLinesRecordStore::new(&self.records)),
            Arc::new(CsvRowSink::new(&self.working_set)),
            Arc::new(CsvRowSink::new(&self.changelog)),
            extractor(),
            settings,
        )
    }
}

#[tokio::test]
async fn test_file_backends_survive_restarts() {
    let backends = FileBackends::new(serde_json::to_value(tracker_issues(3)).unwrap());

    let mut last = None;
    for _ in 0..10 {
        // A fresh controller per invocation, as separate processes would have
        let report = backends
            .controller(settings(2, 2))
            .run_once()
            .await
            .unwrap();
        let done = report.stage_after == IngestionStage::Done;
        last = Some(report);
        if done {
            break;
        }
    }
    assert_eq!(last.map(|r| r.stage_after), Some(IngestionStage::Done));

    let working_set = std::fs::read_to_string(&backends.working_set).unwrap();
    assert_eq!(working_set.lines().count(), 3);
    let changelog = std::fs::read_to_string(&backends.changelog).unwrap();
    assert_eq!(changelog.lines().count(), 9);
    assert!(changelog.starts_with("jira-SHOP-1,"));

    let checkpoint: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&backends.checkpoint).unwrap()).unwrap();
    assert_eq!(checkpoint["ingestion_checkpoint"]["stage"], "done");
}

#[tokio::test]
async fn test_short_export_stops_on_empty_page() {
    let backends = FileBackends::new(json!({
        "total": 3,
        "issues": [serde_json::to_value(tracker_issue(1)).unwrap()]
    }));
    let controller = backends.controller(settings(2, 100));

    let report = controller.run_once().await.unwrap();
    assert_eq!(report.items_fetched, 1);
    assert_eq!(report.stage_after, IngestionStage::Fetching);
    assert_eq!(report.checkpoint.remaining_item_count, 2);
    assert_eq!(report.checkpoint.last_start_offset, 1);
}

#[tokio::test]
async fn test_corrupt_checkpoint_file_is_reported() {
    let backends = FileBackends::new(serde_json::to_value(tracker_issues(1)).unwrap());
    std::fs::create_dir_all(backends.checkpoint.parent().unwrap()).unwrap();
    std::fs::write(&backends.checkpoint, "{ not json").unwrap();

    let err = backends
        .controller(settings(2, 2))
        .run_once()
        .await
        .unwrap_err();
    assert!(matches!(err, IssueFlowError::Checkpoint(_)));
}
