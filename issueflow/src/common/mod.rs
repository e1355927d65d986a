//! Common utilities module
//!
//! Shared helpers used by configuration loading and the storage backends.

/// Environment variable loading utilities
pub mod env_loader;

/// Filesystem helpers shared by the file-backed stores
pub mod fs_utils;

pub use env_loader::EnvLoader;
pub use fs_utils::{atomic_write, ensure_parent_dir};
