//! Workflow categories and the status-to-category lookup table
//!
//! Raw tracker statuses are opaque ids ("10001", "3", ...). A [`CategoryMap`]
//! buckets them into the named categories the analyzer accumulates time for.
//! Statuses absent from the map are ignored by every aggregation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Suffix carried by every category label
const CATEGORY_SUFFIX: &str = "_time";

/// A semantic bucket a raw workflow status maps into, e.g. `in_progress_time`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Label of the category whose last entry marks a restart
    pub const BACKLOG: &'static str = "backlog_time";
    /// Label of the category whose first entry marks the start of active work
    pub const IN_PROGRESS: &'static str = "in_progress_time";
    /// Label of the category whose first entry marks completion
    pub const DONE: &'static str = "done_time";

    /// The working-set columns, in output order
    pub const COLUMNS: [&'static str; 12] = [
        "backlog_time",
        "ready_to_start_time",
        "in_progress_time",
        "code_review_time",
        "waiting_qa_time",
        "qa_time",
        "ready_to_staging_time",
        "regression_time",
        "ready_to_deploy_time",
        "ready_for_version_time",
        "distribute_process_time",
        "done_time",
    ];

    /// Create a category from its label
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// The full label, e.g. `in_progress_time`
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The label without its `_time` suffix, e.g. `in_progress`
    pub fn short_name(&self) -> &str {
        self.0.strip_suffix(CATEGORY_SUFFIX).unwrap_or(&self.0)
    }

    /// Whether this is the given well-known category
    pub fn is(&self, label: &str) -> bool {
        self.0 == label
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Category {
    fn from(label: &str) -> Self {
        Self::new(label)
    }
}

/// Lookup from raw status id to [`Category`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryMap {
    by_status: HashMap<String, Category>,
}

impl CategoryMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `status` as belonging to the category labelled `label`
    pub fn insert(&mut self, status: impl Into<String>, label: impl Into<String>) {
        self.by_status.insert(status.into(), Category::new(label));
    }

    /// Builder-style variant of [`CategoryMap::insert`]
    pub fn with(mut self, status: impl Into<String>, label: impl Into<String>) -> Self {
        self.insert(status, label);
        self
    }

    /// The category of `status`, if it is mapped
    pub fn category_of(&self, status: &str) -> Option<&Category> {
        self.by_status.get(status)
    }

    /// Whether `status` maps to the category labelled `label`
    pub fn is_in(&self, status: &str, label: &str) -> bool {
        self.category_of(status).is_some_and(|c| c.is(label))
    }

    /// Number of mapped statuses
    pub fn len(&self) -> usize {
        self.by_status.len()
    }

    /// Whether no status is mapped
    pub fn is_empty(&self) -> bool {
        self.by_status.is_empty()
    }
}

impl<S, L> FromIterator<(S, L)> for CategoryMap
where
    S: Into<String>,
    L: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (S, L)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (status, label) in iter {
            map.insert(status, label);
        }
        map
    }
}

impl From<&HashMap<String, String>> for CategoryMap {
    fn from(table: &HashMap<String, String>) -> Self {
        table.iter().map(|(s, l)| (s.as_str(), l.as_str())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_and_unknown_status() {
        let map = CategoryMap::new()
            .with("3", Category::IN_PROGRESS)
            .with("10001", Category::DONE);

        assert_eq!(map.len(), 2);
        assert_eq!(map.category_of("3").map(Category::as_str), Some("in_progress_time"));
        assert!(map.category_of("Open").is_none());
        assert!(map.is_in("10001", Category::DONE));
        assert!(!map.is_in("3", Category::DONE));
    }

    #[test]
    fn test_short_name_strips_suffix_only_once() {
        assert_eq!(Category::new("ready_to_start_time").short_name(), "ready_to_start");
        assert_eq!(Category::new("custom").short_name(), "custom");
    }

    #[test]
    fn test_from_config_table() {
        let mut table = HashMap::new();
        table.insert("1".to_string(), "backlog_time".to_string());
        let map = CategoryMap::from(&table);
        assert!(map.is_in("1", Category::BACKLOG));
    }

    #[test]
    fn test_columns_are_ordered_and_suffixed() {
        assert_eq!(Category::COLUMNS.len(), 12);
        assert_eq!(Category::COLUMNS[0], Category::BACKLOG);
        assert_eq!(Category::COLUMNS[11], Category::DONE);
        assert!(Category::COLUMNS.iter().all(|c| c.ends_with("_time")));
    }
}
