//! Unified error handling for the IssueFlow library
//!
//! I/O-level failures (tracker reads, store writes) surface here so the caller can
//! stop the current invocation and retry on the next one. Analysis-level anomalies
//! such as malformed history entries or dangling parent pointers never become errors;
//! they are logged and absorbed where they occur.

use std::fmt;
use std::io;
use thiserror::Error;

/// The main error type for the IssueFlow library
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum IssueFlowError {
    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A page fetch or count probe against the issue source failed
    #[error("Issue source error during {operation}: {message}")]
    Source {
        /// The source operation that failed (e.g. "count probe", "page fetch")
        operation: String,
        /// Description of the failure
        message: String,
    },

    /// Writing to a record store, row sink or checkpoint store failed
    #[error("Persistence failure during {operation}: {message}")]
    Persistence {
        /// The storage operation that failed
        operation: String,
        /// Description of the failure
        message: String,
    },

    /// The stored checkpoint could not be interpreted
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// YAML serialization/deserialization error
    #[error("Serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing or reading error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Other errors
    #[error("{0}")]
    Other(String),

    /// Generic error with context
    #[error("{message}")]
    Context {
        /// Context message
        message: String,
        /// Underlying error
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl IssueFlowError {
    /// Create a source error for the given operation
    pub fn source_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Source {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create a persistence error for the given operation
    pub fn persistence_failed(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Persistence {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Whether the next scheduled invocation can be expected to retry this failure
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            IssueFlowError::Source { .. } | IssueFlowError::Persistence { .. } | IssueFlowError::Io(_)
        )
    }
}

/// Result type alias for IssueFlow operations
pub type Result<T> = std::result::Result<T, IssueFlowError>;

/// Extension trait for adding context to errors
pub trait ErrorContext<T> {
    /// Add context to an error
    fn context<S: Into<String>>(self, msg: S) -> Result<T>;

    /// Add context with a closure that's only called on error
    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>;
}

impl<T, E> ErrorContext<T> for std::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn context<S: Into<String>>(self, msg: S) -> Result<T> {
        self.map_err(|e| IssueFlowError::Context {
            message: msg.into(),
            source: Box::new(e),
        })
    }

    fn with_context<F, S>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> S,
        S: Into<String>,
    {
        self.map_err(|e| IssueFlowError::Context {
            message: f().into(),
            source: Box::new(e),
        })
    }
}

/// Error chain formatter for detailed error reporting
pub struct ErrorChain<'a>(&'a dyn std::error::Error);

impl<'a> fmt::Display for ErrorChain<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", self.0)?;

        let mut current = self.0.source();
        let mut level = 1;

        while let Some(err) = current {
            writeln!(f, "{:indent$}Caused by: {}", "", err, indent = level * 2)?;
            current = err.source();
            level += 1;
        }

        Ok(())
    }
}

/// Extension trait for error types to format the full error chain
pub trait ErrorChainExt {
    /// Format the full error chain
    fn error_chain(&self) -> ErrorChain<'_>;
}

impl<E: std::error::Error> ErrorChainExt for E {
    fn error_chain(&self) -> ErrorChain<'_> {
        ErrorChain(self)
    }
}
