//! Operational cost attribution
//!
//! Every costed work item (task, subtask or bug with an assignee and either a
//! cycle time or an estimate) becomes one [`CostRow`] carrying its
//! organizational ancestry and, when the assignee has a known income weight,
//! the estimated and actual cost.

use super::rates::{hourly_rate, RateDirectory, DEFAULT_RATE_DIVISOR};
use crate::issues::calendar::BusinessDuration;
use crate::issues::hierarchy::{HierarchyLabels, HierarchyResolver};
use crate::issues::record::{format_timestamp, IssueRecord};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Header of the cost export, in column order
pub const COST_COLUMNS: [&str; 16] = [
    "objective",
    "key_result",
    "initiative",
    "epic",
    "story",
    "key",
    "squad",
    "assignee",
    "item_type",
    "opex",
    "started",
    "done",
    "estimate_hours",
    "cycle_time",
    "estimated_cost",
    "actual_cost",
];

/// The kinds of work item cost attribution distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkItemKind {
    /// A task
    Task,
    /// A subtask, costed against its story
    Subtask,
    /// A bug, costed as opex
    Bug,
    /// A story; never costed itself
    Story,
    /// Anything else
    Other,
}

impl WorkItemKind {
    /// Whether items of this kind get a cost row
    pub fn is_costed(&self) -> bool {
        matches!(self, WorkItemKind::Task | WorkItemKind::Subtask | WorkItemKind::Bug)
    }
}

impl fmt::Display for WorkItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WorkItemKind::Task => "task",
            WorkItemKind::Subtask => "subtask",
            WorkItemKind::Bug => "bug",
            WorkItemKind::Story => "story",
            WorkItemKind::Other => "other",
        };
        f.write_str(s)
    }
}

/// Type labels recognized for each work item kind, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkItemLabels {
    /// Task labels
    pub task: Vec<String>,
    /// Subtask labels
    pub subtask: Vec<String>,
    /// Bug labels
    pub bug: Vec<String>,
    /// Story labels
    pub story: Vec<String>,
}

impl Default for WorkItemLabels {
    fn default() -> Self {
        let labels = |values: &[&str]| values.iter().map(|v| v.to_string()).collect();
        Self {
            task: labels(&["task", "tarefa"]),
            subtask: labels(&["subtask", "sub-task", "subtarefa"]),
            bug: labels(&["bug"]),
            story: labels(&["story", "história"]),
        }
    }
}

impl WorkItemLabels {
    /// Classify a type label
    pub fn kind_of(&self, type_label: &str) -> WorkItemKind {
        let needle = type_label.trim().to_lowercase();
        let hit = |candidates: &[String]| candidates.iter().any(|c| c.trim().to_lowercase() == needle);

        if needle.is_empty() {
            WorkItemKind::Other
        } else if hit(&self.task) {
            WorkItemKind::Task
        } else if hit(&self.subtask) {
            WorkItemKind::Subtask
        } else if hit(&self.bug) {
            WorkItemKind::Bug
        } else if hit(&self.story) {
            WorkItemKind::Story
        } else {
            WorkItemKind::Other
        }
    }
}

/// One line of the operational cost export
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostRow {
    /// Nearest objective
    pub objective: Option<String>,
    /// Nearest key result
    pub key_result: Option<String>,
    /// Nearest initiative
    pub initiative: Option<String>,
    /// Epic, for tasks and bugs
    pub epic: Option<String>,
    /// Story, for subtasks
    pub story: Option<String>,
    /// Item key
    pub key: String,
    /// Squad
    pub squad: Option<String>,
    /// Assignee
    pub assignee: String,
    /// Lower-cased type label
    pub item_type: String,
    /// Kind the type label classified as
    #[serde(skip)]
    pub kind: WorkItemKind,
    /// True only for bugs
    pub opex: bool,
    /// Work started
    pub started_at: Option<DateTime<Utc>>,
    /// Work finished
    pub done_at: Option<DateTime<Utc>>,
    /// Original estimate in hours
    pub estimate_hours: Option<i64>,
    /// Cycle time, serialized in hours
    pub cycle_time: Option<BusinessDuration>,
    /// Rate times estimate
    pub estimated_cost: Option<Decimal>,
    /// Rate times cycle time
    pub actual_cost: Option<Decimal>,
}

impl CostRow {
    /// The 16 ordered cells
    pub fn to_row(&self) -> Vec<String> {
        let text = |s: &Option<String>| s.clone().unwrap_or_default();
        let date = |d: &Option<DateTime<Utc>>| d.as_ref().map(format_timestamp).unwrap_or_default();
        let money = |m: &Option<Decimal>| m.map(|m| m.to_string()).unwrap_or_default();

        vec![
            text(&self.objective),
            text(&self.key_result),
            text(&self.initiative),
            text(&self.epic),
            text(&self.story),
            self.key.clone(),
            text(&self.squad),
            self.assignee.clone(),
            self.item_type.clone(),
            self.opex.to_string(),
            date(&self.started_at),
            date(&self.done_at),
            self.estimate_hours
                .map(|h| h.to_string())
                .unwrap_or_default(),
            self.cycle_time
                .map(|c| c.to_hours_string())
                .unwrap_or_default(),
            money(&self.estimated_cost),
            money(&self.actual_cost),
        ]
    }
}

/// Produces [`CostRow`]s from stored records
pub struct CostAttributor {
    rates: Arc<dyn RateDirectory>,
    rate_divisor: Decimal,
    work_items: WorkItemLabels,
    hierarchy: HierarchyLabels,
}

impl CostAttributor {
    /// Create an attributor with the default divisor and labels
    pub fn new(rates: Arc<dyn RateDirectory>) -> Self {
        Self {
            rates,
            rate_divisor: Decimal::from(DEFAULT_RATE_DIVISOR),
            work_items: WorkItemLabels::default(),
            hierarchy: HierarchyLabels::default(),
        }
    }

    /// Use a different rate divisor
    pub fn with_rate_divisor(mut self, divisor: Decimal) -> Self {
        self.rate_divisor = divisor;
        self
    }

    /// Use different work item labels
    pub fn with_work_item_labels(mut self, labels: WorkItemLabels) -> Self {
        self.work_items = labels;
        self
    }

    /// Use different hierarchy labels
    pub fn with_hierarchy_labels(mut self, labels: HierarchyLabels) -> Self {
        self.hierarchy = labels;
        self
    }

    /// Whether `record` gets a cost row
    pub fn is_costed(&self, record: &IssueRecord) -> bool {
        let has_assignee = record
            .assignee
            .as_deref()
            .is_some_and(|a| !a.trim().is_empty());
        let has_effort =
            record.metrics.cycle_time.is_some() || record.original_estimate_hours.is_some();
        self.work_items.kind_of(&record.issue_type).is_costed() && has_assignee && has_effort
    }

    /// Cost rows for every costed record, in record order
    pub fn attribute(&self, records: &[IssueRecord]) -> Vec<CostRow> {
        let resolver = HierarchyResolver::from_records(records).with_labels(self.hierarchy.clone());

        let rows: Vec<CostRow> = records
            .iter()
            .filter(|r| self.is_costed(r))
            .map(|r| self.row_for(r, &resolver))
            .collect();

        debug!(
            "Attributed cost to {} of {} records",
            rows.len(),
            records.len()
        );
        rows
    }

    fn row_for(&self, record: &IssueRecord, resolver: &HierarchyResolver) -> CostRow {
        let kind = self.work_items.kind_of(&record.issue_type);
        let ancestry = resolver.resolve(&record.key);
        let assignee = record.assignee.clone().unwrap_or_default();

        let (epic, story) = match kind {
            WorkItemKind::Task | WorkItemKind::Bug => (ancestry.epic.clone(), None),
            WorkItemKind::Subtask => (None, ancestry.story.clone()),
            _ => (None, None),
        };

        let rate = self
            .rates
            .income_weight(&assignee)
            .map(|weight| hourly_rate(weight, self.rate_divisor))
            .filter(|rate| *rate > Decimal::ZERO);

        let estimated_cost = match (rate, record.original_estimate_hours) {
            (Some(rate), Some(hours)) => {
                Some((rate * Decimal::from(hours)).round_dp(2).normalize())
            }
            _ => None,
        };
        let actual_cost = match (rate, record.metrics.cycle_time) {
            (Some(rate), Some(cycle)) => {
                let hours = Decimal::from(cycle.as_millis()) / Decimal::from(MILLIS_PER_HOUR);
                Some((rate * hours).round_dp(2).normalize())
            }
            _ => None,
        };

        CostRow {
            objective: ancestry.objective,
            key_result: ancestry.key_result,
            initiative: ancestry.initiative,
            epic,
            story,
            key: record.key.clone(),
            squad: record.squad.clone(),
            assignee,
            item_type: record.issue_type.trim().to_lowercase(),
            kind,
            opex: kind == WorkItemKind::Bug,
            started_at: record.metrics.started_at,
            done_at: record.metrics.done_at,
            estimate_hours: record.original_estimate_hours,
            cycle_time: record.metrics.cycle_time,
            estimated_cost,
            actual_cost,
        }
    }
}
