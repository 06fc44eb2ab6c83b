//! Markdown export import into the knowledge store.
//!
//! Each export file is parsed and written in its own transaction. A bad file
//! is rolled back and reported in the summary; it never aborts the import.
use super::db::{self, ContextKind};
use super::markdown::{self, EntryError};
use super::{ImportRequest, StorageConfig, StoreError, Summary};
use rusqlite::Connection;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const PRODUCT_CONTEXT_FILE: &str = "product_context.md";
pub const ACTIVE_CONTEXT_FILE: &str = "active_context.md";
pub const DECISION_LOG_FILE: &str = "decision_log.md";
pub const SYSTEM_PATTERNS_FILE: &str = "system_patterns.md";
pub const PROGRESS_LOG_FILE: &str = "progress_log.md";
pub const CUSTOM_DATA_DIR: &str = "custom_data";

/// Which table family an export file feeds.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ExportKind {
    Context(ContextKind),
    Decisions,
    SystemPatterns,
    Progress,
    CustomData { category: String },
}

impl ExportKind {
    fn item_key(&self) -> &'static str {
        match self {
            ExportKind::Context(kind) => kind.table(),
            ExportKind::Decisions => "decisions",
            ExportKind::SystemPatterns => "system_patterns",
            ExportKind::Progress => "progress_entries",
            ExportKind::CustomData { .. } => "custom_data",
        }
    }
}

#[derive(Debug, Clone)]
struct ExportFile {
    /// Path relative to the import directory, as reported in the summary.
    label: String,
    path: PathBuf,
    kind: ExportKind,
}

#[derive(Debug, Serialize)]
struct FailedFile {
    file: String,
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
enum ImportStatus {
    Success,
    PartialSuccess,
    NothingImported,
}

#[derive(Debug, Serialize)]
struct ImportReport {
    status: ImportStatus,
    message: String,
    imported_files: Vec<String>,
    failed_files: Vec<FailedFile>,
    items_imported: serde_json::Map<String, serde_json::Value>,
    database_path: String,
}

/// Import every known export file under `workspace_id/input_path`.
pub fn import_markdown(storage: &StorageConfig, request: &ImportRequest) -> super::Result<Summary> {
    storage.validate()?;
    let import_dir = Path::new(&request.workspace_id).join(&request.input_path);
    if !import_dir.is_dir() {
        return Err(StoreError::ImportDirNotFound(import_dir));
    }
    let files = discover_export_files(&import_dir)?;
    debug!(count = files.len(), dir = %import_dir.display(), "discovered export files");

    let db_path = storage.db_path(&request.workspace_id);
    let mut conn = db::open_store(&db_path)?;
    info!(database = %db_path.display(), "opened knowledge store");

    let mut imported_files = Vec::new();
    let mut failed_files = Vec::new();
    let mut items_imported = serde_json::Map::new();
    for file in &files {
        match import_file(&mut conn, file) {
            Ok(count) => {
                info!(file = %file.label, items = count, "imported");
                imported_files.push(file.label.clone());
                let key = file.kind.item_key();
                let total = items_imported
                    .get(key)
                    .and_then(serde_json::Value::as_u64)
                    .unwrap_or(0)
                    + count as u64;
                items_imported.insert(key.to_string(), total.into());
            }
            Err(err) => {
                warn!(file = %file.label, error = %err, "import failed");
                failed_files.push(FailedFile {
                    file: file.label.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    let status = if !failed_files.is_empty() {
        ImportStatus::PartialSuccess
    } else if imported_files.is_empty() {
        ImportStatus::NothingImported
    } else {
        ImportStatus::Success
    };
    let report = ImportReport {
        status,
        message: format!(
            "Import process completed. Imported: {}, Failed: {}",
            imported_files.len(),
            failed_files.len()
        ),
        imported_files,
        failed_files,
        items_imported,
        database_path: db_path.display().to_string(),
    };
    let summary = serde_json::from_value(serde_json::to_value(report)?)?;
    Ok(summary)
}

fn discover_export_files(import_dir: &Path) -> super::Result<Vec<ExportFile>> {
    let fixed = [
        (
            PRODUCT_CONTEXT_FILE,
            ExportKind::Context(ContextKind::Product),
        ),
        (
            ACTIVE_CONTEXT_FILE,
            ExportKind::Context(ContextKind::Active),
        ),
        (DECISION_LOG_FILE, ExportKind::Decisions),
        (SYSTEM_PATTERNS_FILE, ExportKind::SystemPatterns),
        (PROGRESS_LOG_FILE, ExportKind::Progress),
    ];
    let mut files = Vec::new();
    for (name, kind) in fixed {
        let path = import_dir.join(name);
        if path.is_file() {
            files.push(ExportFile {
                label: name.to_string(),
                path,
                kind,
            });
        }
    }

    let custom_dir = import_dir.join(CUSTOM_DATA_DIR);
    if custom_dir.is_dir() {
        let mut custom = Vec::new();
        let context = format!("read {}", custom_dir.display());
        let read_err = |err| StoreError::io(context.clone(), err);
        for entry in fs::read_dir(&custom_dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let path = entry.path();
            let is_markdown = path.extension().and_then(|ext| ext.to_str()) == Some("md");
            let Some(category) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if !path.is_file() || !is_markdown {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            custom.push(ExportFile {
                label: format!("{CUSTOM_DATA_DIR}/{file_name}"),
                kind: ExportKind::CustomData {
                    category: category.to_string(),
                },
                path,
            });
        }
        custom.sort_by(|a, b| a.label.cmp(&b.label));
        files.extend(custom);
    }
    Ok(files)
}

fn import_file(conn: &mut Connection, file: &ExportFile) -> super::Result<usize> {
    let source = fs::read_to_string(&file.path)
        .map_err(|err| StoreError::io(format!("read {}", file.path.display()), err))?;
    let parse_err = |err: EntryError| StoreError::parse(file.label.clone(), err.to_string());

    let tx = conn.transaction()?;
    let count = match &file.kind {
        ExportKind::Context(kind) => {
            let content = markdown::parse_context(&source).map_err(parse_err)?;
            db::replace_context(&tx, *kind, &content)?;
            1
        }
        ExportKind::Decisions => {
            let decisions = markdown::parse_decision_log(&source).map_err(parse_err)?;
            for decision in &decisions {
                db::insert_decision(&tx, decision)?;
            }
            decisions.len()
        }
        ExportKind::SystemPatterns => {
            let patterns = markdown::parse_system_patterns(&source).map_err(parse_err)?;
            for pattern in &patterns {
                db::upsert_pattern(&tx, pattern)?;
            }
            patterns.len()
        }
        ExportKind::Progress => {
            let items = markdown::parse_progress_log(&source).map_err(parse_err)?;
            let mut written = 0;
            for item in &items {
                written += db::insert_progress(&tx, item, None)?;
            }
            written
        }
        ExportKind::CustomData { category } => {
            let entries = markdown::parse_custom_data(&source).map_err(parse_err)?;
            for entry in &entries {
                db::upsert_custom(&tx, category, entry)?;
            }
            entries.len()
        }
    };
    tx.commit()?;
    Ok(count)
}

#[cfg(test)]
#[path = "import_tests.rs"]
mod tests;
