//! Workspace root resolution.
use crate::workflow::RunError;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Resolve a workspace root to its absolute, canonical form.
///
/// Nothing is created; a missing or non-directory path is an error.
pub fn resolve_workspace_root(path: &Path) -> Result<PathBuf, RunError> {
    let root = match path.canonicalize() {
        Ok(root) => root,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            return Err(RunError::WorkspaceMissing(path.to_path_buf()));
        }
        Err(err) => {
            return Err(RunError::WorkspaceUnreadable {
                path: path.to_path_buf(),
                source: err,
            });
        }
    };
    if !root.is_dir() {
        return Err(RunError::WorkspaceNotDirectory(root));
    }
    Ok(root)
}

/// Canonical workspace identifier handed to the store.
///
/// Reset and import both derive paths from this string, so it must be exact.
pub fn workspace_id(root: &Path) -> Result<String, RunError> {
    match root.to_str() {
        Some(id) => Ok(id.to_string()),
        None => Err(RunError::WorkspaceNotUtf8(root.to_path_buf())),
    }
}
