//! ConPort knowledge store.
//!
//! The store owns the per-workspace SQLite database and the markdown import
//! into it. Callers see one operation, `import_markdown`, behind the
//! `MarkdownImporter` trait, and treat its summary as opaque.
mod config;
pub mod db;
mod error;
mod import;
pub mod markdown;

pub use config::{
    expand_home, sanitize_workspace_id, StorageConfig, DEFAULT_DB_DIR_NAME, DEFAULT_DB_FILENAME,
};
pub use error::{Result, StoreError};
pub use import::{
    ACTIVE_CONTEXT_FILE, CUSTOM_DATA_DIR, DECISION_LOG_FILE, PRODUCT_CONTEXT_FILE,
    PROGRESS_LOG_FILE, SYSTEM_PATTERNS_FILE,
};

/// Opaque import result, passed through to output unchanged.
pub type Summary = serde_json::Map<String, serde_json::Value>;

/// Arguments of a single import call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRequest {
    /// Canonical workspace path, as a string.
    pub workspace_id: String,
    /// Location of the export, relative to the workspace unless absolute.
    pub input_path: String,
}

/// The delegated import operation.
pub trait MarkdownImporter {
    fn import_markdown(&self, request: &ImportRequest) -> anyhow::Result<Summary>;
}

/// SQLite-backed store addressed through an explicit `StorageConfig`.
#[derive(Debug, Clone, Default)]
pub struct ConportStore {
    storage: StorageConfig,
}

impl ConportStore {
    pub fn new(storage: StorageConfig) -> Self {
        Self { storage }
    }
}

impl MarkdownImporter for ConportStore {
    fn import_markdown(&self, request: &ImportRequest) -> anyhow::Result<Summary> {
        Ok(import::import_markdown(&self.storage, request)?)
    }
}
