//! issueflow CLI library
//!
//! Exposes the command-line definitions and exit codes for use in tests.

/// Command-line interface definitions and argument parsing
pub mod cli;
/// Exit codes used by the CLI application
pub mod exit_codes;
