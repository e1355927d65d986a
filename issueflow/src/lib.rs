//! # issueflow
//!
//! Analytics over issue-tracker event histories.
//!
//! ## Features
//!
//! - **Transition times**: Business time spent per status category, plus reaction, lead and cycle time
//! - **Hierarchy**: Nearest objective, key result, initiative, epic and story of every item
//! - **Resumable ingestion**: A checkpointed state machine that works within per-invocation budgets and restarts on drift
//! - **Cost rollup**: Estimated and actual cost of work items from income weights
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use issueflow::issues::{analyze, CategoryMap, ElapsedCalendar, StatusEvent};
//!
//! let categories = CategoryMap::new()
//!     .with("1", "backlog_time")
//!     .with("3", "in_progress_time")
//!     .with("5", "done_time");
//! let at = |h| Utc.with_ymd_and_hms(2024, 3, 4, h, 0, 0).unwrap();
//! let events = vec![
//!     StatusEvent::new(None, "1", at(8)),
//!     StatusEvent::new(Some("1"), "3", at(10)),
//!     StatusEvent::new(Some("3"), "5", at(15)),
//! ];
//!
//! let metrics = analyze(Some(at(8)), &events, &categories, &ElapsedCalendar);
//! assert_eq!(metrics.cycle_time.map(|c| c.as_hours()), Some(5.0));
//! ```

#![warn(missing_docs)]

/// Shared utilities
pub mod common;

/// Layered configuration
pub mod config;

/// Operational cost attribution
pub mod cost;

/// Error types used throughout the library
pub mod error;

/// Resumable ingestion
pub mod ingest;

/// Issue histories, categories, hierarchy and records
pub mod issues;

pub use config::{Config, ConfigError};
pub use cost::{CostAttributor, CostRow};
pub use error::{IssueFlowError, Result};
pub use ingest::{IngestionCheckpoint, IngestionController, IngestionStage, InvocationReport};
pub use issues::{
    BusinessDuration, CategoryMap, HierarchyResolver, IssueMetrics, IssueRecord,
    TransitionTimeAnalyzer,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
