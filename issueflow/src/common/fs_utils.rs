//! Filesystem helpers for the file-backed checkpoint, record and row stores

use crate::error::{IssueFlowError, Result};
use std::fs;
use std::io;
use std::path::Path;

/// Create the parent directory of `path` if it does not exist yet
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                IssueFlowError::Io(io::Error::new(
                    e.kind(),
                    format!("Failed to create directory '{}': {}", parent.display(), e),
                ))
            })?;
        }
    }
    Ok(())
}

/// Replace the contents of `path` in one step
///
/// The bytes are written to a sibling temp file which is then renamed over the
/// target, so a reader never observes a half-written file.
pub fn atomic_write(path: &Path, contents: &[u8]) -> Result<()> {
    ensure_parent_dir(path)?;

    let temp_path = path.with_extension(format!(
        "{}.tmp",
        path.extension().and_then(|s| s.to_str()).unwrap_or("")
    ));

    fs::write(&temp_path, contents).map_err(|e| {
        IssueFlowError::Io(io::Error::new(
            e.kind(),
            format!("Failed to write temp file '{}': {}", temp_path.display(), e),
        ))
    })?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        IssueFlowError::Io(io::Error::new(
            e.kind(),
            format!(
                "Failed to rename temp file '{}' to '{}': {}",
                temp_path.display(),
                path.display(),
                e
            ),
        ))
    })
}
