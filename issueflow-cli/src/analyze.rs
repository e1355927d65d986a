use crate::cli::OutputFormat;
use crate::error::{CliError, CliResult};
use crate::exit_codes::{EXIT_ERROR, EXIT_WARNING};
use anyhow::Context;
use chrono::{DateTime, Utc};
use issueflow::issues::record::format_timestamp;
use issueflow::issues::{BusinessDuration, IssueRecord, TrackerIssue, TrackerSearchResponse};
use issueflow::Config;
use serde_json::Value;
use std::path::Path;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Tabled)]
struct MetricsRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Type")]
    issue_type: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Done")]
    done: String,
    #[tabled(rename = "Reaction (h)")]
    reaction: String,
    #[tabled(rename = "Cycle (h)")]
    cycle: String,
    #[tabled(rename = "Lead (h)")]
    lead: String,
    #[tabled(rename = "Categories")]
    categories: String,
}

/// Parse a payload holding a search response, an issue array or one issue
pub fn parse_payload(content: &str) -> anyhow::Result<Vec<TrackerIssue>> {
    let value: Value = serde_json::from_str(content).context("payload is not valid JSON")?;

    if value.is_array() {
        return serde_json::from_value(value).context("payload array does not hold tracker issues");
    }
    if value.get("issues").is_some() {
        let response: TrackerSearchResponse =
            serde_json::from_value(value).context("payload is not a tracker search response")?;
        return Ok(response.issues);
    }
    let issue: TrackerIssue =
        serde_json::from_value(value).context("payload is not a tracker issue")?;
    Ok(vec![issue])
}

fn read_payload(path: &Path) -> anyhow::Result<Vec<TrackerIssue>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read payload {}", path.display()))?;
    parse_payload(&content).with_context(|| format!("cannot analyze {}", path.display()))
}

fn hours(duration: Option<BusinessDuration>) -> String {
    duration
        .map(|d| d.to_hours_string())
        .unwrap_or_else(|| "-".to_string())
}

fn date(at: Option<DateTime<Utc>>) -> String {
    at.as_ref()
        .map(format_timestamp)
        .unwrap_or_else(|| "-".to_string())
}

fn metrics_row(record: &IssueRecord) -> MetricsRow {
    let metrics = &record.metrics;
    let categories = metrics
        .category_times
        .iter()
        .map(|(category, time)| format!("{}={}", category.short_name(), time.to_hours_string()))
        .collect::<Vec<_>>()
        .join(" ");

    MetricsRow {
        key: record.key.clone(),
        issue_type: record.issue_type.clone(),
        started: date(metrics.started_at),
        done: date(metrics.done_at),
        reaction: hours(metrics.reaction_time),
        cycle: hours(metrics.cycle_time),
        lead: hours(metrics.lead_time),
        categories,
    }
}

pub fn run_analyze(config: &Config, payload: &Path, format: OutputFormat) -> CliResult<()> {
    let issues = read_payload(payload).map_err(|e| CliError::from_anyhow(e, EXIT_ERROR))?;
    let extractor = config.extractor()?;
    let records = extractor.extract_all(&issues);
    tracing::info!("Analyzed {} issues from {}", records.len(), payload.display());

    if config.status_categories.is_empty() {
        tracing::warn!("No status categories configured; category times will be empty");
    }

    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&records)
                .map_err(|e| CliError::from_error(e, EXIT_ERROR))?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml =
                serde_yaml::to_string(&records).map_err(|e| CliError::from_error(e, EXIT_ERROR))?;
            print!("{}", yaml);
        }
        OutputFormat::Table => {
            if records.is_empty() {
                println!("No issues found in {}", payload.display());
                return Err(CliError::new("payload held no issues", EXIT_WARNING));
            }
            let mut table = Table::new(records.iter().map(metrics_row));
            table.with(Style::modern());
            table.with(Modify::new(Rows::new(1..)).with(Alignment::left()));
            println!("{}", table);
        }
    }
    Ok(())
}
