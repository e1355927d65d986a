//! Core event and metric types shared by the analyzer and the record rows

use super::calendar::BusinessDuration;
use super::category::Category;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Type-safe wrapper for a raw workflow status identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusId(String);

impl StatusId {
    /// Wrap a raw status id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw id
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StatusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StatusId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for StatusId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A single status change taken from an issue's audit trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    /// Status the issue left; absent for the initial entry
    pub from_status: Option<StatusId>,
    /// Status the issue entered
    pub to_status: StatusId,
    /// When the change happened
    pub occurred_at: DateTime<Utc>,
}

impl StatusEvent {
    /// Create an event
    pub fn new(
        from_status: Option<&str>,
        to_status: &str,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            from_status: from_status.map(StatusId::from),
            to_status: StatusId::from(to_status),
            occurred_at,
        }
    }
}

/// The half-open span `[started_at, ended_at)` an issue spent in one status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInterval {
    /// The status occupied during the interval
    pub status: StatusId,
    /// Its category, when the status is mapped
    pub category: Option<Category>,
    /// Entry into the status
    pub started_at: DateTime<Utc>,
    /// Entry into the next status
    pub ended_at: DateTime<Utc>,
}

/// Per-issue time metrics derived from the status history
///
/// Every milestone is present only when all of its operands are.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IssueMetrics {
    /// Accumulated business time per category
    pub category_times: BTreeMap<Category, BusinessDuration>,
    /// First entry into the in-progress category
    pub started_at: Option<DateTime<Utc>>,
    /// First entry into the done category
    pub done_at: Option<DateTime<Utc>>,
    /// Last entry into the backlog category, when it was entered more than once
    pub restarted_at: Option<DateTime<Utc>>,
    /// Creation to start
    pub reaction_time: Option<BusinessDuration>,
    /// Creation to done
    pub lead_time: Option<BusinessDuration>,
    /// Start to done
    pub cycle_time: Option<BusinessDuration>,
}

impl IssueMetrics {
    /// Accumulated time for the category labelled `label`
    pub fn category_time(&self, label: &str) -> Option<BusinessDuration> {
        self.category_times
            .iter()
            .find(|(c, _)| c.is(label))
            .map(|(_, d)| *d)
    }

    /// Sum over every category
    pub fn total_category_time(&self) -> BusinessDuration {
        self.category_times.values().sum()
    }

    /// Whether no category time or milestone was derived
    pub fn is_empty(&self) -> bool {
        self.category_times.is_empty()
            && self.started_at.is_none()
            && self.done_at.is_none()
            && self.restarted_at.is_none()
            && self.reaction_time.is_none()
            && self.lead_time.is_none()
            && self.cycle_time.is_none()
    }
}
