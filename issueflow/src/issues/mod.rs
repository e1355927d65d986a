/// Business-time arithmetic and calendars
pub mod calendar;
/// Status-to-category mapping
pub mod category;
/// Typed extraction of tracker payloads
pub mod extract;
/// Parent-pointer hierarchy resolution
pub mod hierarchy;
/// Flattened records and output rows
pub mod record;
/// Transition time analysis
pub mod transitions;
/// Status events, intervals and metrics
pub mod types;
/// Display-identity normalization
pub mod usernames;

pub use calendar::{BusinessDuration, Calendar, ElapsedCalendar, WorkingHoursCalendar};
pub use category::{Category, CategoryMap};
pub use extract::{CustomFieldIds, IssueExtractor, TrackerIssue, TrackerSearchResponse};
pub use hierarchy::{Ancestry, HierarchyLabels, HierarchyLevel, HierarchyNode, HierarchyResolver};
pub use record::{ChangelogRow, IssueRecord, Transition};
pub use transitions::{analyze, intervals, TransitionTimeAnalyzer};
pub use types::{IssueMetrics, StatusEvent, StatusId, StatusInterval};
pub use usernames::{DictionaryUsernameDirectory, UsernameDirectory};
