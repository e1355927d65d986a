//! Process exit codes
//!
//! A scheduler driving `issueflow ingest` retries on [`EXIT_WARNING`] and
//! alerts on [`EXIT_ERROR`].

/// The command completed
pub const EXIT_SUCCESS: i32 = 0;

/// A failure the next invocation can retry, or nothing to report
pub const EXIT_WARNING: i32 = 1;

/// Invalid configuration or a failure that needs an operator
pub const EXIT_ERROR: i32 = 2;
