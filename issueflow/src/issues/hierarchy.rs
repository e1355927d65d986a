//! Organizational hierarchy resolution
//!
//! Stored records form an implicit parent-pointer forest. Walking upward from
//! an item finds its nearest objective, key result, initiative, epic and
//! story. Broken pointers and cycles end the walk early with whatever was
//! found so far.

use super::record::IssueRecord;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

/// One node of the parent-pointer forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    /// Issue key
    pub key: String,
    /// Issue type label
    pub type_label: String,
    /// Parent key, if any
    pub parent_key: Option<String>,
}

impl HierarchyNode {
    /// Create a node
    pub fn new(key: &str, type_label: &str, parent_key: Option<&str>) -> Self {
        Self {
            key: key.to_string(),
            type_label: type_label.to_string(),
            parent_key: parent_key.map(str::to_string),
        }
    }
}

impl From<&IssueRecord> for HierarchyNode {
    fn from(record: &IssueRecord) -> Self {
        Self {
            key: record.key.clone(),
            type_label: record.issue_type.clone(),
            parent_key: record.parent.clone().filter(|p| !p.is_empty()),
        }
    }
}

/// The organizational levels an ancestor can fill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HierarchyLevel {
    /// Objective
    Objective,
    /// Key result
    KeyResult,
    /// Initiative
    Initiative,
    /// Epic
    Epic,
    /// Story
    Story,
}

impl HierarchyLevel {
    /// String form of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLevel::Objective => "objective",
            HierarchyLevel::KeyResult => "key_result",
            HierarchyLevel::Initiative => "initiative",
            HierarchyLevel::Epic => "epic",
            HierarchyLevel::Story => "story",
        }
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type labels recognized for each level, matched case-insensitively
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyLabels {
    /// Labels of objectives
    pub objective: Vec<String>,
    /// Labels of key results
    pub key_result: Vec<String>,
    /// Labels of initiatives
    pub initiative: Vec<String>,
    /// Labels of epics
    pub epic: Vec<String>,
    /// Labels of stories
    pub story: Vec<String>,
}

fn labels(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

impl Default for HierarchyLabels {
    fn default() -> Self {
        Self {
            objective: labels(&["objective", "objetivo"]),
            key_result: labels(&["key result", "key-result", "resultado chave"]),
            initiative: labels(&["initiative", "iniciativa"]),
            epic: labels(&["epic", "épico"]),
            story: labels(&["story", "história"]),
        }
    }
}

impl HierarchyLabels {
    /// The level a type label denotes, if any
    pub fn level_of(&self, type_label: &str) -> Option<HierarchyLevel> {
        let needle = type_label.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        let hit = |candidates: &[String]| candidates.iter().any(|c| c.trim().to_lowercase() == needle);

        if hit(&self.epic) {
            Some(HierarchyLevel::Epic)
        } else if hit(&self.story) {
            Some(HierarchyLevel::Story)
        } else if hit(&self.initiative) {
            Some(HierarchyLevel::Initiative)
        } else if hit(&self.key_result) {
            Some(HierarchyLevel::KeyResult)
        } else if hit(&self.objective) {
            Some(HierarchyLevel::Objective)
        } else {
            None
        }
    }

    /// Whether every level has at least one non-empty label
    pub fn is_complete(&self) -> bool {
        [
            &self.objective,
            &self.key_result,
            &self.initiative,
            &self.epic,
            &self.story,
        ]
        .iter()
        .all(|l| l.iter().any(|s| !s.trim().is_empty()))
    }
}

/// The nearest ancestor key found at each level
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestry {
    /// Nearest objective
    pub objective: Option<String>,
    /// Nearest key result
    pub key_result: Option<String>,
    /// Nearest initiative
    pub initiative: Option<String>,
    /// Nearest epic
    pub epic: Option<String>,
    /// Nearest story
    pub story: Option<String>,
}

impl Ancestry {
    /// The key at `level`
    pub fn get(&self, level: HierarchyLevel) -> Option<&str> {
        match level {
            HierarchyLevel::Objective => self.objective.as_deref(),
            HierarchyLevel::KeyResult => self.key_result.as_deref(),
            HierarchyLevel::Initiative => self.initiative.as_deref(),
            HierarchyLevel::Epic => self.epic.as_deref(),
            HierarchyLevel::Story => self.story.as_deref(),
        }
    }

    fn slot(&mut self, level: HierarchyLevel) -> &mut Option<String> {
        match level {
            HierarchyLevel::Objective => &mut self.objective,
            HierarchyLevel::KeyResult => &mut self.key_result,
            HierarchyLevel::Initiative => &mut self.initiative,
            HierarchyLevel::Epic => &mut self.epic,
            HierarchyLevel::Story => &mut self.story,
        }
    }

    /// Whether no level was filled
    pub fn is_empty(&self) -> bool {
        self.objective.is_none()
            && self.key_result.is_none()
            && self.initiative.is_none()
            && self.epic.is_none()
            && self.story.is_none()
    }
}

/// Resolves ancestors over a parent-pointer forest
#[derive(Debug, Clone, Default)]
pub struct HierarchyResolver {
    nodes: HashMap<String, HierarchyNode>,
    labels: HierarchyLabels,
}

impl HierarchyResolver {
    /// Build from explicit nodes; a later node with the same key replaces an earlier one
    pub fn new<I>(nodes: I) -> Self
    where
        I: IntoIterator<Item = HierarchyNode>,
    {
        let nodes = nodes
            .into_iter()
            .filter(|n| !n.key.is_empty())
            .map(|n| (n.key.clone(), n))
            .collect();
        Self {
            nodes,
            labels: HierarchyLabels::default(),
        }
    }

    /// Build from stored records, skipping rows without a key
    pub fn from_records(records: &[IssueRecord]) -> Self {
        Self::new(records.iter().map(HierarchyNode::from))
    }

    /// Use a custom label table
    pub fn with_labels(mut self, labels: HierarchyLabels) -> Self {
        self.labels = labels;
        self
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether there are no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Look up a node
    pub fn node(&self, key: &str) -> Option<&HierarchyNode> {
        self.nodes.get(key)
    }

    /// The nearest ancestor at every level above `key`
    ///
    /// The item itself never fills a slot. Terminates after at most one visit
    /// per node even when the parent pointers form a cycle.
    pub fn resolve(&self, key: &str) -> Ancestry {
        let mut ancestry = Ancestry::default();
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(key);

        let mut parent_key = self.nodes.get(key).and_then(|n| n.parent_key.as_deref());

        while let Some(current) = parent_key {
            if !visited.insert(current) {
                debug!("Cycle detected resolving {} at {}", key, current);
                break;
            }
            let Some(node) = self.nodes.get(current) else {
                debug!("Missing ancestor {} while resolving {}", current, key);
                break;
            };

            if let Some(level) = self.labels.level_of(&node.type_label) {
                let slot = ancestry.slot(level);
                if slot.is_none() {
                    *slot = Some(node.key.clone());
                }
            }
            parent_key = node.parent_key.as_deref();
        }

        ancestry
    }
}
