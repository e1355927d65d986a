//! Transition time analysis
//!
//! Turns an unordered status history into category durations and the named
//! milestones (started, done, restarted, reaction, lead and cycle time).
//!
//! Events are ordered with a stable sort on their timestamp, so two changes
//! recorded at the same instant keep the order the tracker reported them in.
//! The time between event `i` and event `i + 1` is credited to the category of
//! the status entered at `i`; the status entered by the last event is still
//! open and contributes nothing.

use super::calendar::{BusinessDuration, Calendar};
use super::category::{Category, CategoryMap};
use super::types::{IssueMetrics, StatusEvent, StatusInterval};
use chrono::{DateTime, Utc};

/// Derives [`IssueMetrics`] from status histories using one category map and calendar
pub struct TransitionTimeAnalyzer<'a> {
    categories: &'a CategoryMap,
    calendar: &'a dyn Calendar,
}

impl<'a> TransitionTimeAnalyzer<'a> {
    /// Create an analyzer
    pub fn new(categories: &'a CategoryMap, calendar: &'a dyn Calendar) -> Self {
        Self {
            categories,
            calendar,
        }
    }

    /// Analyze one issue's history
    pub fn analyze(
        &self,
        created_at: Option<DateTime<Utc>>,
        events: &[StatusEvent],
    ) -> IssueMetrics {
        analyze(created_at, events, self.categories, self.calendar)
    }

    /// The ordered intervals of one issue's history
    pub fn intervals(&self, events: &[StatusEvent]) -> Vec<StatusInterval> {
        intervals(events, self.categories)
    }
}

/// Stable chronological ordering; ties keep their source order
fn ordered(events: &[StatusEvent]) -> Vec<&StatusEvent> {
    let mut sorted: Vec<&StatusEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.occurred_at);
    sorted
}

/// Timestamps of every entry into the category labelled `label`, in order
fn entries_into(
    sorted: &[&StatusEvent],
    categories: &CategoryMap,
    label: &str,
) -> Vec<DateTime<Utc>> {
    sorted
        .iter()
        .filter(|e| categories.is_in(e.to_status.as_str(), label))
        .map(|e| e.occurred_at)
        .collect()
}

/// Analyze one issue's history
///
/// Never fails: an empty or single-event history produces empty metrics.
pub fn analyze(
    created_at: Option<DateTime<Utc>>,
    events: &[StatusEvent],
    categories: &CategoryMap,
    calendar: &dyn Calendar,
) -> IssueMetrics {
    let sorted = ordered(events);
    let mut metrics = IssueMetrics::default();
    if sorted.len() < 2 {
        return metrics;
    }

    for pair in sorted.windows(2) {
        let (entered, next) = (pair[0], pair[1]);
        if let Some(category) = categories.category_of(entered.to_status.as_str()) {
            let spent = calendar.duration(entered.occurred_at, next.occurred_at);
            *metrics
                .category_times
                .entry(category.clone())
                .or_insert(BusinessDuration::ZERO) += spent;
        }
    }

    metrics.started_at = entries_into(&sorted, categories, Category::IN_PROGRESS)
        .first()
        .copied();
    metrics.done_at = entries_into(&sorted, categories, Category::DONE)
        .first()
        .copied();

    let backlog_entries = entries_into(&sorted, categories, Category::BACKLOG);
    if backlog_entries.len() > 1 {
        metrics.restarted_at = backlog_entries.last().copied();
    }

    let span = |from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>| match (from, to) {
        (Some(from), Some(to)) => Some(calendar.duration(from, to)),
        _ => None,
    };

    metrics.reaction_time = span(created_at, metrics.started_at);
    metrics.lead_time = span(created_at, metrics.done_at);
    metrics.cycle_time = span(metrics.started_at, metrics.done_at);

    metrics
}

/// The ordered half-open intervals between consecutive events
pub fn intervals(events: &[StatusEvent], categories: &CategoryMap) -> Vec<StatusInterval> {
    ordered(events)
        .windows(2)
        .map(|pair| StatusInterval {
            status: pair[0].to_status.clone(),
            category: categories.category_of(pair[0].to_status.as_str()).cloned(),
            started_at: pair[0].occurred_at,
            ended_at: pair[1].occurred_at,
        })
        .collect()
}
