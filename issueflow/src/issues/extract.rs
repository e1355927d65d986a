//! Typed extraction of tracker search payloads
//!
//! Raw search results are deserialized into [`TrackerIssue`] and then mapped
//! into [`IssueRecord`]s. Nothing downstream of this module looks at loosely
//! typed JSON: unknown fields are ignored, missing ones become `None`, and
//! custom fields are located through [`CustomFieldIds`].
//!
//! History entries with an unparseable timestamp, or status items without a
//! target status, are dropped here with a warning before the analyzer runs.

use super::calendar::Calendar;
use super::category::CategoryMap;
use super::record::{IssueRecord, Transition};
use super::transitions::analyze;
use super::types::StatusEvent;
use super::usernames::{resolve_person, DictionaryUsernameDirectory, UsernameDirectory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

const STATUS_FIELD: &str = "status";
const SECONDS_PER_HOUR: f64 = 3600.0;

/// Ids of the tracker custom fields that carry extracted values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomFieldIds {
    /// Story points
    pub story_points: String,
    /// Tester person
    pub tester: String,
    /// Designer person
    pub designer: String,
}

impl Default for CustomFieldIds {
    fn default() -> Self {
        Self {
            story_points: "customfield_10004".to_string(),
            tester: "customfield_10200".to_string(),
            designer: "customfield_11523".to_string(),
        }
    }
}

/// One issue as returned by the tracker search endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerIssue {
    /// Tracker-internal id
    #[serde(default)]
    pub id: String,
    /// Issue key
    pub key: String,
    /// Field values
    #[serde(default)]
    pub fields: TrackerFields,
    /// Expanded history, when requested
    #[serde(default)]
    pub changelog: Option<TrackerChangelog>,
}

/// The `fields` object of a tracker issue
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerFields {
    /// Owning project
    pub project: Option<NamedRef>,
    /// Issue type
    pub issuetype: Option<NamedRef>,
    /// Creation timestamp
    pub created: Option<String>,
    /// Labels
    pub labels: Option<Vec<String>>,
    /// Components
    pub components: Option<Vec<NamedRef>>,
    /// Parent pointer
    pub parent: Option<ParentRef>,
    /// Priority
    pub priority: Option<NamedRef>,
    /// Reporter
    pub reporter: Option<TrackerUser>,
    /// Assignee
    pub assignee: Option<TrackerUser>,
    /// Original estimate in seconds
    pub timeoriginalestimate: Option<Value>,
    /// Every other field, custom fields included
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}

/// A reference carrying an id, key and name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NamedRef {
    /// Id
    pub id: Option<String>,
    /// Key, for projects
    pub key: Option<String>,
    /// Display name
    pub name: Option<String>,
}

/// Parent pointer with its summary
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParentRef {
    /// Parent issue key
    pub key: String,
    /// Selected parent fields
    pub fields: Option<ParentFields>,
}

/// Parent fields the extraction reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParentFields {
    /// Parent summary
    pub summary: Option<String>,
}

/// A person as the tracker reports them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerUser {
    /// Display name
    #[serde(rename = "displayName")]
    pub display_name: Option<String>,
    /// Email address
    #[serde(rename = "emailAddress")]
    pub email_address: Option<String>,
    /// Whether the account is active
    pub active: Option<bool>,
}

/// Expanded changelog
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerChangelog {
    /// History entries, one per edit
    #[serde(default)]
    pub histories: Vec<TrackerHistory>,
}

/// A single edit touching one or more fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerHistory {
    /// When the edit happened
    pub created: Option<String>,
    /// Who made it
    pub author: Option<TrackerUser>,
    /// Changed fields
    #[serde(default)]
    pub items: Vec<TrackerHistoryItem>,
}

/// One field change inside a history entry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerHistoryItem {
    /// Field name
    #[serde(default)]
    pub field: String,
    /// Previous raw value
    pub from: Option<String>,
    /// New raw value
    pub to: Option<String>,
    /// Previous display value
    #[serde(rename = "fromString")]
    pub from_name: Option<String>,
    /// New display value
    #[serde(rename = "toString")]
    pub to_name: Option<String>,
}

/// A page of search results
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrackerSearchResponse {
    /// Total matches of the query
    #[serde(default)]
    pub total: u64,
    /// Issues in this page
    #[serde(default)]
    pub issues: Vec<TrackerIssue>,
}

/// Parse a tracker timestamp (`2024-01-15T10:30:00.000+0000` or RFC 3339)
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|d| d.with_timezone(&Utc))
        .ok()
}

fn number_from(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Maps [`TrackerIssue`]s to [`IssueRecord`]s
#[derive(Clone)]
pub struct IssueExtractor {
    categories: CategoryMap,
    calendar: Arc<dyn Calendar>,
    usernames: Arc<dyn UsernameDirectory>,
    squads: HashMap<String, String>,
    fields: CustomFieldIds,
}

impl IssueExtractor {
    /// Create an extractor with an empty username dictionary and no squads
    pub fn new(categories: CategoryMap, calendar: Arc<dyn Calendar>) -> Self {
        Self {
            categories,
            calendar,
            usernames: Arc::new(DictionaryUsernameDirectory::new()),
            squads: HashMap::new(),
            fields: CustomFieldIds::default(),
        }
    }

    /// Use the given username directory
    pub fn with_usernames(mut self, usernames: Arc<dyn UsernameDirectory>) -> Self {
        self.usernames = usernames;
        self
    }

    /// Use the given project key to squad table
    pub fn with_squads(mut self, squads: HashMap<String, String>) -> Self {
        self.squads = squads;
        self
    }

    /// Use the given custom field ids
    pub fn with_custom_fields(mut self, fields: CustomFieldIds) -> Self {
        self.fields = fields;
        self
    }

    /// The category map in use
    pub fn categories(&self) -> &CategoryMap {
        &self.categories
    }

    fn person(&self, user: Option<&TrackerUser>) -> Option<String> {
        let user = user?;
        resolve_person(
            self.usernames.as_ref(),
            user.display_name.as_deref(),
            user.email_address.as_deref(),
        )
    }

    fn custom_person(&self, field_id: &str, fields: &TrackerFields) -> Option<String> {
        let value = fields.extra.get(field_id)?;
        if value.is_null() {
            return None;
        }
        match serde_json::from_value::<TrackerUser>(value.clone()) {
            Ok(user) => self.person(Some(&user)),
            Err(e) => {
                debug!("Custom field {} is not a person: {}", field_id, e);
                None
            }
        }
    }

    /// Status events in source order, dropping malformed entries
    pub fn status_events(&self, issue: &TrackerIssue) -> Vec<StatusEvent> {
        let Some(changelog) = issue.changelog.as_ref() else {
            return Vec::new();
        };

        let mut events = Vec::new();
        for history in &changelog.histories {
            let status_items: Vec<&TrackerHistoryItem> = history
                .items
                .iter()
                .filter(|item| item.field == STATUS_FIELD)
                .collect();
            if status_items.is_empty() {
                continue;
            }

            let Some(occurred_at) = history.created.as_deref().and_then(parse_timestamp) else {
                warn!(
                    "Skipping history entry of {} with unparseable timestamp {:?}",
                    issue.key, history.created
                );
                continue;
            };

            for item in status_items {
                match item.to.as_deref() {
                    Some(to) if !to.is_empty() => events.push(StatusEvent::new(
                        item.from.as_deref(),
                        to,
                        occurred_at,
                    )),
                    _ => warn!(
                        "Skipping status change of {} at {} without a target status",
                        issue.key, occurred_at
                    ),
                }
            }
        }
        events
    }

    fn transitions(&self, issue: &TrackerIssue) -> Vec<Transition> {
        let Some(changelog) = issue.changelog.as_ref() else {
            return Vec::new();
        };

        let mut transitions: Vec<Transition> = changelog
            .histories
            .iter()
            .filter_map(|history| {
                let item = history
                    .items
                    .iter()
                    .find(|item| item.field == STATUS_FIELD)?;
                let occurred_at = history.created.as_deref().and_then(parse_timestamp)?;
                let to = match item.to.as_deref().and_then(|s| self.categories.category_of(s)) {
                    Some(category) => category.short_name().to_string(),
                    None => item
                        .to_name
                        .clone()
                        .or_else(|| item.to.clone())
                        .unwrap_or_default(),
                };
                Some(Transition {
                    to,
                    occurred_at,
                    author: self.person(history.author.as_ref()),
                })
            })
            .collect();
        transitions.sort_by_key(|t| t.occurred_at);
        transitions
    }

    /// Extract one issue
    pub fn extract(&self, issue: &TrackerIssue) -> IssueRecord {
        let fields = &issue.fields;
        let created_at = match fields.created.as_deref() {
            Some(raw) => {
                let parsed = parse_timestamp(raw);
                if parsed.is_none() {
                    warn!("Issue {} has unparseable creation time {:?}", issue.key, raw);
                }
                parsed
            }
            None => None,
        };

        let events = self.status_events(issue);
        let metrics = analyze(created_at, &events, &self.categories, self.calendar.as_ref());

        let project_key = fields
            .project
            .as_ref()
            .and_then(|p| p.key.clone())
            .unwrap_or_default();
        let project_name = fields
            .project
            .as_ref()
            .and_then(|p| p.name.clone())
            .unwrap_or_default();
        let squad = self.squads.get(&project_key).cloned();

        let story_points = fields
            .extra
            .get(&self.fields.story_points)
            .and_then(number_from);

        let original_estimate_hours = fields
            .timeoriginalestimate
            .as_ref()
            .and_then(number_from)
            .filter(|seconds| *seconds > 0.0)
            .map(|seconds| (seconds / SECONDS_PER_HOUR).ceil() as i64);

        let parent = fields.parent.as_ref().map(|p| p.key.clone());
        let parent_summary = fields
            .parent
            .as_ref()
            .and_then(|p| p.fields.as_ref())
            .and_then(|f| f.summary.as_ref())
            .map(|s| s.replace(['\r', '\n'], " "));

        IssueRecord {
            id: issue.id.clone(),
            key: issue.key.clone(),
            project_key,
            project_name,
            issue_type: fields
                .issuetype
                .as_ref()
                .and_then(|t| t.name.clone())
                .unwrap_or_default(),
            squad,
            story_points,
            labels: fields.labels.clone().unwrap_or_default(),
            components: fields
                .components
                .as_ref()
                .map(|cs| cs.iter().filter_map(|c| c.name.clone()).collect())
                .unwrap_or_default(),
            parent,
            parent_summary,
            priority: fields.priority.as_ref().and_then(|p| p.name.clone()),
            reporter: self.person(fields.reporter.as_ref()),
            assignee: self.person(fields.assignee.as_ref()),
            tester: self.custom_person(&self.fields.tester, fields),
            designer: self.custom_person(&self.fields.designer, fields),
            created_at,
            original_estimate_hours,
            metrics,
            transitions: self.transitions(issue),
        }
    }

    /// Extract a batch of issues
    pub fn extract_all(&self, issues: &[TrackerIssue]) -> Vec<IssueRecord> {
        issues.iter().map(|issue| self.extract(issue)).collect()
    }
}
