//! Integration tests for the issueflow binary

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;

const ENV_VARS: [&str; 6] = [
    "ISSUEFLOW_QUERY",
    "ISSUEFLOW_PAGE_SIZE",
    "ISSUEFLOW_FETCH_BUDGET",
    "ISSUEFLOW_DATA_DIR",
    "ISSUEFLOW_RATE_DIVISOR",
    "ISSUEFLOW_SOURCE_PATH",
];

/// A command running in `dir` with no user configuration in reach
fn issueflow(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("issueflow").unwrap();
    cmd.current_dir(dir).env("HOME", dir).env("NO_COLOR", "1");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn export() -> serde_json::Value {
    let issue = |n: u32, kind: &str, parent: Option<&str>| {
        json!({
            "id": n.to_string(),
            "key": format!("SHOP-{}", n),
            "fields": {
                "project": { "key": "SHOP", "name": "Storefront" },
                "issuetype": { "name": kind },
                "created": "2024-03-04T08:00:00.000+0000",
                "parent": parent.map(|p| json!({ "key": p })),
                "reporter": { "displayName": "Ana Souza" },
                "assignee": { "displayName": "Bruno Lima" },
                "timeoriginalestimate": 10800
            },
            "changelog": { "histories": [
                { "created": "2024-03-04T10:00:00.000+0000",
                  "items": [{ "field": "status", "from": "1", "to": "3" }] },
                { "created": "2024-03-04T15:00:00.000+0000",
                  "items": [{ "field": "status", "from": "3", "to": "5" }] }
            ]}
        })
    };
    json!({
        "total": 3,
        "issues": [
            issue(1, "Epic", None),
            issue(2, "Task", Some("SHOP-1")),
            issue(3, "Bug", Some("SHOP-1"))
        ]
    })
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("export.json"),
        serde_json::to_vec_pretty(&export()).unwrap(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("issueflow.yaml"),
        r#"
data_dir: data
source_path: export.json
page_size: 2
calendar:
  elapsed: true
status_categories:
  "1": backlog_time
  "3": in_progress_time
  "5": done_time
squads:
  SHOP: Checkout
income_weights:
  Bruno Lima: 12000
"#,
    )
    .unwrap();
    dir
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    issueflow(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("ingest").and(predicate::str::contains("cost")));
}

#[test]
fn test_no_subcommand_prints_help() {
    let dir = TempDir::new().unwrap();
    issueflow(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_ingest_without_source_fails() {
    let dir = TempDir::new().unwrap();
    issueflow(dir.path())
        .arg("ingest")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("No issue source configured"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("broken.yaml");
    std::fs::write(&config, "page_size: 0\n").unwrap();
    issueflow(dir.path())
        .args(["status", "--config"])
        .arg(&config)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("page_size"));
}

#[test]
fn test_ingest_until_done_then_cost() {
    let dir = workspace();

    let output = issueflow(dir.path())
        .args(["ingest", "--until-done", "--format", "json"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "ingest failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["stage_after"], "done");
    assert_eq!(report["checkpoint"]["total_item_count"], 3);

    let working_set = std::fs::read_to_string(dir.path().join("data/working_set.csv")).unwrap();
    assert_eq!(working_set.lines().count(), 3);
    let changelog = std::fs::read_to_string(dir.path().join("data/changelog.csv")).unwrap();
    assert_eq!(changelog.lines().count(), 9);

    issueflow(dir.path())
        .args(["status", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"stage\": \"done\""));

    issueflow(dir.path())
        .args(["cost", "--output", "out/cost.csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 2 cost rows"));

    let cost = std::fs::read_to_string(dir.path().join("out/cost.csv")).unwrap();
    let lines: Vec<&str> = cost.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("objective,key_result"));
    // 12000 / 200 = 60 per hour; 3h estimate and 5h cycle
    assert!(lines[1].contains(",SHOP-1,"));
    assert!(lines[1].contains("SHOP-2,Checkout,Bruno Lima,task,false"));
    assert!(lines[1].ends_with(",3,5,180,300"));
    assert!(lines[2].contains("SHOP-3,Checkout,Bruno Lima,bug,true"));
}

#[test]
fn test_cost_warns_before_ingestion_is_done() {
    let dir = workspace();
    // one invocation fetches everything but writes no rows yet
    issueflow(dir.path()).arg("ingest").assert().success();

    issueflow(dir.path())
        .args(["cost", "--format", "json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("partial set of issues"))
        .stdout(predicate::str::contains("\"cycle_time\": 5.0"));
}

#[test]
fn test_cost_after_done_has_no_partial_warning() {
    let dir = workspace();
    issueflow(dir.path())
        .args(["ingest", "--until-done"])
        .assert()
        .success();

    issueflow(dir.path())
        .args(["cost", "--format", "json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("partial set of issues").not());
}

#[test]
fn test_reset_clears_state() {
    let dir = workspace();
    issueflow(dir.path()).arg("ingest").assert().success();

    issueflow(dir.path())
        .arg("reset")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ingestion state cleared"));

    issueflow(dir.path())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("No ingestion has run yet."));
}

#[test]
fn test_analyze_payload_table() {
    let dir = workspace();
    issueflow(dir.path())
        .args(["analyze", "export.json"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("SHOP-2")
                .and(predicate::str::contains("in_progress=5"))
                .and(predicate::str::contains("2024-03-04 10:00:00")),
        );
}

#[test]
fn test_analyze_missing_payload() {
    let dir = workspace();
    issueflow(dir.path())
        .args(["analyze", "missing.json"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot read payload"));
}
