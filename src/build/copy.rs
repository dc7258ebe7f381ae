//! Static asset copying.
//!
//! Files under the static directory are copied byte-for-byte into the output
//! directory, keeping their paths relative to the static root.

use super::error::BuildError;
use glob::Pattern;
use std::fs;
use std::path::{Path, PathBuf};

/// List every file under `dir`, relative to `dir`, sorted.
pub fn list_static_files(dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    if !dir.is_dir() {
        return Err(BuildError::missing_input(dir, "static directory"));
    }

    let pattern = format!("{}/**/*", Pattern::escape(&dir.to_string_lossy()));
    let entries = glob::glob(&pattern).map_err(|e| {
        BuildError::InvalidDeclaration(format!("cannot enumerate '{}': {}", dir.display(), e))
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            BuildError::filesystem(path, e.into_error())
        })?;
        if path.is_file() {
            if let Ok(relative) = path.strip_prefix(dir) {
                files.push(relative.to_path_buf());
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Copy the contents of `from` into `to`, returning the copied relative paths.
pub fn copy_static(from: &Path, to: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let files = list_static_files(from)?;

    for relative in &files {
        let target = to.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::filesystem(parent, e))?;
        }
        fs::copy(from.join(relative), &target).map_err(|e| BuildError::filesystem(&target, e))?;
    }

    tracing::debug!(from = %from.display(), to = %to.display(), files = files.len(), "copied static assets");
    Ok(files)
}
