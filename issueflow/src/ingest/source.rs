//! Paged access to the tracked issue universe

use crate::error::{IssueFlowError, Result};
use crate::issues::extract::{TrackerIssue, TrackerSearchResponse};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// One page of search results
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Issues in this page
    pub issues: Vec<TrackerIssue>,
    /// Total matches of the query, independent of paging
    pub total: u64,
}

/// Paged read of the issues matching a query
#[async_trait::async_trait]
pub trait IssueSource: Send + Sync {
    /// Fetch up to `page_size` issues starting at `offset`
    ///
    /// A `page_size` of zero is a count probe: the page is empty and only
    /// `total` is meaningful.
    async fn search(&self, query: &str, offset: u64, page_size: u64) -> Result<SearchPage>;
}

fn slice_page(issues: &[TrackerIssue], offset: u64, page_size: u64) -> Vec<TrackerIssue> {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(issues.len());
    let len = usize::try_from(page_size).unwrap_or(usize::MAX);
    let end = start.saturating_add(len).min(issues.len());
    issues[start..end].to_vec()
}

/// Failure switches for [`MemoryIssueSource`]
#[derive(Debug, Clone, Default)]
pub struct MemorySourceConfig {
    /// Fail count probes
    pub fail_probe: bool,
    /// Fail page fetches starting at this offset
    pub fail_fetch_at_offset: Option<u64>,
}

/// In-memory issue source
#[derive(Debug, Clone, Default)]
pub struct MemoryIssueSource {
    issues: Arc<RwLock<Vec<TrackerIssue>>>,
    config: Arc<RwLock<MemorySourceConfig>>,
    requests: Arc<RwLock<Vec<(u64, u64)>>>,
}

impl MemoryIssueSource {
    /// Create a source serving `issues`
    pub fn new(issues: Vec<TrackerIssue>) -> Self {
        Self {
            issues: Arc::new(RwLock::new(issues)),
            ..Self::default()
        }
    }

    /// Replace the universe
    pub async fn set_issues(&self, issues: Vec<TrackerIssue>) {
        *self.issues.write().await = issues;
    }

    /// Add one issue to the universe
    pub async fn push_issue(&self, issue: TrackerIssue) {
        self.issues.write().await.push(issue);
    }

    /// Change the failure switches
    pub async fn set_config(&self, config: MemorySourceConfig) {
        *self.config.write().await = config;
    }

    /// Every `(offset, page_size)` requested so far, probes included
    pub async fn requests(&self) -> Vec<(u64, u64)> {
        self.requests.read().await.clone()
    }
}

#[async_trait::async_trait]
impl IssueSource for MemoryIssueSource {
    async fn search(&self, _query: &str, offset: u64, page_size: u64) -> Result<SearchPage> {
        self.requests.write().await.push((offset, page_size));
        let config = self.config.read().await.clone();

        if page_size == 0 {
            if config.fail_probe {
                return Err(IssueFlowError::source_failed(
                    "count probe",
                    "simulated source failure",
                ));
            }
        } else if config.fail_fetch_at_offset == Some(offset) {
            return Err(IssueFlowError::source_failed(
                "page fetch",
                format!("simulated source failure at offset {}", offset),
            ));
        }

        let issues = self.issues.read().await;
        Ok(SearchPage {
            issues: slice_page(&issues, offset, page_size),
            total: issues.len() as u64,
        })
    }
}

/// Issue source reading an exported search result from disk
///
/// The file holds either a JSON array of issues or a search response object
/// with `total` and `issues`. It is re-read on every call so that a fresh
/// export is picked up by the next invocation. The query is not interpreted.
#[derive(Debug, Clone)]
pub struct FileSystemIssueSource {
    path: PathBuf,
}

impl FileSystemIssueSource {
    /// Read from the export at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the export
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self, operation: &str) -> Result<(Vec<TrackerIssue>, u64)> {
        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            IssueFlowError::source_failed(
                operation,
                format!("cannot read {}: {}", self.path.display(), e),
            )
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            IssueFlowError::source_failed(
                operation,
                format!("{} is not valid JSON: {}", self.path.display(), e),
            )
        })?;

        let parse_error = |e: serde_json::Error| {
            IssueFlowError::source_failed(
                operation,
                format!("{} does not hold tracker issues: {}", self.path.display(), e),
            )
        };

        if value.is_array() {
            let issues: Vec<TrackerIssue> = serde_json::from_value(value).map_err(parse_error)?;
            let total = issues.len() as u64;
            Ok((issues, total))
        } else {
            let response: TrackerSearchResponse =
                serde_json::from_value(value).map_err(parse_error)?;
            let total = response.total.max(response.issues.len() as u64);
            Ok((response.issues, total))
        }
    }
}

#[async_trait::async_trait]
impl IssueSource for FileSystemIssueSource {
    async fn search(&self, query: &str, offset: u64, page_size: u64) -> Result<SearchPage> {
        let operation = if page_size == 0 {
            "count probe"
        } else {
            "page fetch"
        };
        debug!(
            "Reading {} for query {:?} (offset {}, page size {})",
            self.path.display(),
            query,
            offset,
            page_size
        );
        let (issues, total) = self.load(operation)?;
        Ok(SearchPage {
            issues: slice_page(&issues, offset, page_size),
            total,
        })
    }
}
