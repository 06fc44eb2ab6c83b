//! Storage addressing for per-workspace databases.
//!
//! A `StorageConfig` is passed explicitly to the store rather than set as
//! process-wide state, so reset and import always derive the same paths.
use super::StoreError;
use std::path::{Path, PathBuf};

/// Directory created under the workspace root when no base path is set.
pub const DEFAULT_DB_DIR_NAME: &str = "context_portal";

/// Database filename used when no override is set.
pub const DEFAULT_DB_FILENAME: &str = "context.db";

/// Where a workspace's database lives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// Base directory shared by all workspaces' stores.
    pub base_path: Option<PathBuf>,
    /// Database filename inside the workspace's store directory.
    pub db_filename: Option<String>,
}

impl StorageConfig {
    pub fn new(base_path: Option<PathBuf>, db_filename: Option<String>) -> Self {
        Self {
            base_path,
            db_filename,
        }
    }

    /// Reject an empty base path and filename overrides that would escape
    /// the store directory.
    pub fn validate(&self) -> Result<(), StoreError> {
        if matches!(&self.base_path, Some(base) if base.as_os_str().is_empty()) {
            return Err(StoreError::InvalidConfig(
                "storage root must be non-empty".to_string(),
            ));
        }
        let Some(name) = self.db_filename.as_deref() else {
            return Ok(());
        };
        if name.trim().is_empty() {
            return Err(StoreError::InvalidConfig(
                "database filename must be non-empty".to_string(),
            ));
        }
        if name.contains('/') || name.contains('\\') || name == "." || name == ".." {
            return Err(StoreError::InvalidConfig(format!(
                "database filename must be a plain file name (got {name:?})"
            )));
        }
        Ok(())
    }

    /// Return the store directory for a workspace.
    ///
    /// With a base path this is `base/<sanitized workspace id>`, otherwise
    /// `<workspace>/context_portal`.
    pub fn db_dir(&self, workspace_id: &str) -> PathBuf {
        match self.base_path.as_deref() {
            Some(base) => expand_home(base).join(sanitize_workspace_id(workspace_id)),
            None => Path::new(workspace_id).join(DEFAULT_DB_DIR_NAME),
        }
    }

    /// Return the database file path for a workspace.
    pub fn db_path(&self, workspace_id: &str) -> PathBuf {
        self.db_dir(workspace_id).join(self.db_filename())
    }

    pub fn db_filename(&self) -> &str {
        self.db_filename.as_deref().unwrap_or(DEFAULT_DB_FILENAME)
    }
}

/// Map a workspace path onto a single directory name.
///
/// Both separator styles collapse to `_`, so `/a/b` and `\a\b` share a name.
pub fn sanitize_workspace_id(workspace_id: &str) -> String {
    workspace_id.replace(['/', '\\'], "_")
}

/// Expand a leading `~` to the current user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(std::path::Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_every_separator() {
        assert_eq!(sanitize_workspace_id("/home/u/proj"), "_home_u_proj");
        assert_eq!(sanitize_workspace_id(r"C:\work\proj"), "C:_work_proj");
        assert_eq!(
            sanitize_workspace_id("/a/b"),
            sanitize_workspace_id(r"\a\b")
        );
    }

    #[test]
    fn default_layout_lives_under_workspace() {
        let config = StorageConfig::default();
        assert_eq!(
            config.db_dir("/home/u/proj"),
            PathBuf::from("/home/u/proj/context_portal")
        );
        assert_eq!(
            config.db_path("/home/u/proj"),
            PathBuf::from("/home/u/proj/context_portal/context.db")
        );
    }

    #[test]
    fn base_path_layout_uses_sanitized_id() {
        let config = StorageConfig::new(
            Some(PathBuf::from("/tmp/stores")),
            Some("alt.sqlite".to_string()),
        );
        assert_eq!(
            config.db_dir("/home/u/proj"),
            PathBuf::from("/tmp/stores/_home_u_proj")
        );
        assert_eq!(
            config.db_path("/home/u/proj"),
            PathBuf::from("/tmp/stores/_home_u_proj/alt.sqlite")
        );
    }

    #[test]
    fn expand_home_only_touches_leading_tilde() {
        let plain = PathBuf::from("/tmp/~/stores");
        assert_eq!(expand_home(&plain), plain);
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home(Path::new("~/stores")), home.join("stores"));
        }
    }

    #[test]
    fn validate_rejects_nested_filenames() {
        assert!(StorageConfig::default().validate().is_ok());
        for bad in ["", "  ", "a/b.db", r"a\b.db", ".."] {
            let config = StorageConfig::new(None, Some(bad.to_string()));
            assert!(config.validate().is_err(), "accepted {bad:?}");
        }
        let config = StorageConfig::new(None, Some("mine.db".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_base_path() {
        let config = StorageConfig::new(Some(PathBuf::new()), None);
        assert!(config.validate().is_err());
        let config = StorageConfig::new(Some(PathBuf::from("/tmp/stores")), None);
        assert!(config.validate().is_ok());
    }
}
