//! Output emission
//!
//! Writes the rendered artifact once. There is no temp-file-then-rename
//! step; a crash mid-write can leave a truncated file.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::GencrudError;

/// Write `contents` to `path`, creating parent directories as needed
pub fn write_artifact(path: &Path, contents: &str) -> Result<PathBuf, GencrudError> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(path, contents)?;
    debug!(path = ?path, bytes = contents.len(), "Wrote artifact");

    Ok(path.to_path_buf())
}
