//! Reset-and-import workflow.
//!
//! One run resolves the workspace, optionally wipes its store directory, then
//! hands a single import request to the importer and returns its summary
//! untouched.
use crate::cli::RootArgs;
use crate::store::{ImportRequest, MarkdownImporter, StorageConfig, Summary};
use crate::workspace::{resolve_workspace_root, workspace_id};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use thiserror::Error;

/// Default export location, relative to the workspace root.
pub const DEFAULT_INPUT_PATH: &str = "memory-bank/conport_export";

/// Immutable settings for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub workspace: PathBuf,
    pub input: String,
    pub storage: StorageConfig,
    pub reset: bool,
}

impl RunConfig {
    /// Empty `--db-dir` / `--db-file` values mean no override.
    pub fn from_args(args: &RootArgs) -> Self {
        let db_dir = args
            .db_dir
            .clone()
            .filter(|dir| !dir.as_os_str().is_empty());
        let db_file = args.db_file.clone().filter(|name| !name.is_empty());
        Self {
            workspace: args.workspace.clone(),
            input: args.input.clone(),
            storage: StorageConfig::new(db_dir, db_file),
            reset: args.reset,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            input: DEFAULT_INPUT_PATH.to_string(),
            storage: StorageConfig::default(),
            reset: false,
        }
    }
}

/// Fatal outcomes of a run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("workspace not found: {}", .0.display())]
    WorkspaceMissing(PathBuf),

    #[error("workspace is not a directory: {}", .0.display())]
    WorkspaceNotDirectory(PathBuf),

    #[error("workspace path is not valid UTF-8: {}", .0.display())]
    WorkspaceNotUtf8(PathBuf),

    #[error("resolve workspace {}", .path.display())]
    WorkspaceUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    InvalidConfig(String),

    #[error("reset store {}", .path.display())]
    Reset {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("import failed: {0:#}")]
    Import(anyhow::Error),
}

/// Run the workflow against `importer` and return its summary unchanged.
pub fn run(config: &RunConfig, importer: &dyn MarkdownImporter) -> Result<Summary, RunError> {
    let root = resolve_workspace_root(&config.workspace)?;
    let workspace_id = workspace_id(&root)?;
    tracing::info!(workspace = %workspace_id, "resolved workspace");

    config
        .storage
        .validate()
        .map_err(|err| RunError::InvalidConfig(err.to_string()))?;

    if config.reset {
        match reset_store(&config.storage, &workspace_id)? {
            Some(path) => tracing::info!(path = %path.display(), "removed existing store"),
            None => tracing::debug!("no existing store to remove"),
        }
    }

    let request = ImportRequest {
        workspace_id,
        input_path: config.input.clone(),
    };
    tracing::debug!(input = %request.input_path, "starting import");
    let summary = importer
        .import_markdown(&request)
        .map_err(RunError::Import)?;
    tracing::info!(keys = summary.len(), "import returned summary");
    Ok(summary)
}

/// Delete the store directory for `workspace_id`.
///
/// Returns the removed path, or `None` when there was nothing to remove.
pub fn reset_store(
    storage: &StorageConfig,
    workspace_id: &str,
) -> Result<Option<PathBuf>, RunError> {
    let dir = storage.db_dir(workspace_id);
    match fs::remove_dir_all(&dir) {
        Ok(()) => Ok(Some(dir)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RunError::Reset { path: dir, source }),
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
