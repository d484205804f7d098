//! Client-supplied path sanitizing.

use std::path::{Path, PathBuf};

use crate::error::CoreError;

/// Normalize a client path into a clean, relative, forward-slash form.
///
/// Leading slashes and `.` segments are dropped; any `..` segment or an
/// empty result is rejected.
pub fn normalize_relative(requested: &str) -> Result<String, CoreError> {
    let unified = requested.replace('\\', "/");
    let mut parts = Vec::new();
    for segment in unified.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                return Err(CoreError::InvalidPath(format!(
                    "'{requested}' escapes the project directory"
                )))
            }
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return Err(CoreError::InvalidPath("path must not be empty".into()));
    }
    Ok(parts.join("/"))
}

/// Join a client path onto `root`, refusing anything outside it.
pub fn safe_join(root: &Path, requested: &str) -> Result<PathBuf, CoreError> {
    let relative = normalize_relative(requested)?;
    Ok(root.join(relative))
}
