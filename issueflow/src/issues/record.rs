//! Flattened per-issue records and the rows derived from them
//!
//! An [`IssueRecord`] is what the ingestion stage persists for every fetched
//! issue. It renders to the 33-cell working-set row and to a sequence of
//! [`ChangelogRow`]s, and it is the input of hierarchy resolution and cost
//! attribution.

use super::calendar::BusinessDuration;
use super::category::Category;
use super::types::IssueMetrics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Number of cells in a working-set row
pub const WORKING_SET_COLUMNS: usize = 33;

/// Number of cells in a changelog row
pub const CHANGELOG_COLUMNS: usize = 8;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render a timestamp the way every output row does
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format(DATE_FORMAT).to_string()
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

/// One status change as shown in the changelog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Category short name (`in_progress`), or the raw status name when unmapped
    pub to: String,
    /// When the change happened
    pub occurred_at: DateTime<Utc>,
    /// Resolved name of whoever made the change
    pub author: Option<String>,
}

/// A fully extracted issue
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    /// Tracker-internal id
    pub id: String,
    /// Issue key, e.g. `PAY-42`
    pub key: String,
    /// Project key
    pub project_key: String,
    /// Project display name
    pub project_name: String,
    /// Issue type label as the tracker reports it
    pub issue_type: String,
    /// Squad owning the project
    pub squad: Option<String>,
    /// Story points
    pub story_points: Option<f64>,
    /// Labels
    pub labels: Vec<String>,
    /// Component names
    pub components: Vec<String>,
    /// Parent issue key
    pub parent: Option<String>,
    /// Parent summary, flattened to one line
    pub parent_summary: Option<String>,
    /// Priority name
    pub priority: Option<String>,
    /// Resolved reporter
    pub reporter: Option<String>,
    /// Resolved assignee
    pub assignee: Option<String>,
    /// Resolved tester
    pub tester: Option<String>,
    /// Resolved designer
    pub designer: Option<String>,
    /// Creation time
    pub created_at: Option<DateTime<Utc>>,
    /// Original estimate in whole hours
    pub original_estimate_hours: Option<i64>,
    /// Derived time metrics
    pub metrics: IssueMetrics,
    /// Status changes in chronological order
    pub transitions: Vec<Transition>,
}

impl IssueRecord {
    /// The 33-cell working-set row; absent values render as empty cells
    pub fn to_row(&self) -> Vec<String> {
        let date = |d: Option<DateTime<Utc>>| d.as_ref().map(format_timestamp).unwrap_or_default();
        let hours = |d: Option<BusinessDuration>| {
            d.map(|d| d.to_hours_string()).unwrap_or_default()
        };
        let text = |s: &Option<String>| s.clone().unwrap_or_default();

        let mut row = Vec::with_capacity(WORKING_SET_COLUMNS);
        row.push(self.project_key.clone());
        row.push(self.issue_type.clone());
        row.push(text(&self.squad));
        row.push(self.key.clone());
        row.push(self.story_points.map(format_number).unwrap_or_default());
        row.push(self.labels.join(", "));
        row.push(self.components.join(", "));
        row.push(text(&self.parent));
        row.push(text(&self.parent_summary));
        row.push(text(&self.priority));
        row.push(date(self.created_at));
        row.push(date(self.metrics.started_at));
        row.push(date(self.metrics.done_at));
        row.push(hours(self.metrics.reaction_time));
        row.push(hours(self.metrics.cycle_time));
        row.push(hours(self.metrics.lead_time));
        row.push(date(self.metrics.restarted_at));
        for label in Category::COLUMNS {
            row.push(hours(self.metrics.category_time(label)));
        }
        row.push(text(&self.assignee));
        row.push(text(&self.tester));
        row.push(text(&self.designer));
        row.push(
            self.original_estimate_hours
                .map(|h| h.to_string())
                .unwrap_or_default(),
        );
        row
    }

    /// Changelog rows: one for creation, then one per transition
    pub fn changelog_rows(&self, tool: &str) -> Vec<ChangelogRow> {
        ChangelogRow::for_record(self, tool)
    }
}

/// One line of the activity changelog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelogRow {
    /// Tool-qualified issue key, e.g. `jira-PAY-42`
    pub key: String,
    /// When it happened
    pub date: String,
    /// Source tool name
    pub tool: String,
    /// `KEY | Name` of the project
    pub project: String,
    /// Squad
    pub squad: String,
    /// Who did it
    pub author: String,
    /// What kind of event
    pub action: String,
    /// Human-readable description
    pub detail: String,
}

impl ChangelogRow {
    /// Build the rows for one record
    pub fn for_record(record: &IssueRecord, tool: &str) -> Vec<ChangelogRow> {
        let qualified_key = format!("{}-{}", tool, record.key);
        let project = format!("{} | {}", record.project_key, record.project_name);
        let squad = record.squad.clone().unwrap_or_default();
        let reporter = record.reporter.clone().unwrap_or_default();

        let mut rows = Vec::with_capacity(record.transitions.len() + 1);
        rows.push(ChangelogRow {
            key: qualified_key.clone(),
            date: record
                .created_at
                .as_ref()
                .map(format_timestamp)
                .unwrap_or_default(),
            tool: tool.to_string(),
            project: project.clone(),
            squad: squad.clone(),
            author: reporter.clone(),
            action: format!("created {}", record.issue_type),
            detail: format!("item {} created by {}", record.key, reporter),
        });

        for transition in &record.transitions {
            rows.push(ChangelogRow {
                key: qualified_key.clone(),
                date: format_timestamp(&transition.occurred_at),
                tool: tool.to_string(),
                project: project.clone(),
                squad: squad.clone(),
                author: transition.author.clone().unwrap_or_default(),
                action: format!("moved {}", record.issue_type),
                detail: format!("item {} moved to: {}", qualified_key, transition.to),
            });
        }

        rows
    }

    /// The eight ordered cells
    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.key.clone(),
            self.date.clone(),
            self.tool.clone(),
            self.project.clone(),
            self.squad.clone(),
            self.author.clone(),
            self.action.clone(),
            self.detail.clone(),
        ]
    }
}
