use super::*;
use crate::store::db::{count_rows, load_context};
use crate::store::sanitize_workspace_id;
use serde_json::json;
use tempfile::TempDir;

const EXPORT_REL: &str = "memory-bank/conport_export";

fn write_file(path: &Path, contents: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent directory");
    }
    fs::write(path, contents.as_bytes()).expect("write file");
}

fn workspace_with_export(files: &[(&str, &str)]) -> TempDir {
    let workspace = tempfile::tempdir().expect("create workspace");
    let export = workspace.path().join(EXPORT_REL);
    fs::create_dir_all(&export).expect("create export dir");
    for (rel, contents) in files {
        write_file(&export.join(rel), contents);
    }
    workspace
}

fn request(workspace: &TempDir) -> ImportRequest {
    ImportRequest {
        workspace_id: workspace.path().display().to_string(),
        input_path: EXPORT_REL.to_string(),
    }
}

fn open(path: &Path) -> Connection {
    Connection::open(path).expect("open imported db")
}

#[test]
fn imports_every_export_file_into_default_store() {
    let workspace = workspace_with_export(&[
        (
            PRODUCT_CONTEXT_FILE,
            "# Product Context\n\n## Goal\n\nImport context.\n",
        ),
        (ACTIVE_CONTEXT_FILE, "# Active Context\n\nShipping v1.\n"),
        (
            DECISION_LOG_FILE,
            "# Decision Log\n\n---\n## Decision\n*   [2024-03-01 10:15:00] Use SQLite\n\n**Tags:** storage\n\n---\n## Decision\n*   [2024-03-02 10:15:00] Use tracing\n",
        ),
        (
            SYSTEM_PATTERNS_FILE,
            "# System Patterns\n\n## Layered CLI\nThin CLI over a store.\n",
        ),
        (
            PROGRESS_LOG_FILE,
            "# Progress Log\n\n* DONE: Parser\n  * DONE: Tests\n",
        ),
        (
            "custom_data/glossary.md",
            "### Workspace\nA project directory.\n",
        ),
        ("custom_data/notes.txt", "ignored"),
    ]);
    let storage = StorageConfig::default();

    let summary = import_markdown(&storage, &request(&workspace)).expect("import");

    assert_eq!(summary.get("status"), Some(&json!("success")));
    assert_eq!(
        summary.get("imported_files"),
        Some(&json!([
            "product_context.md",
            "active_context.md",
            "decision_log.md",
            "system_patterns.md",
            "progress_log.md",
            "custom_data/glossary.md"
        ]))
    );
    assert_eq!(summary.get("failed_files"), Some(&json!([])));
    assert_eq!(
        summary.get("items_imported"),
        Some(&json!({
            "product_context": 1,
            "active_context": 1,
            "decisions": 2,
            "system_patterns": 1,
            "progress_entries": 2,
            "custom_data": 1
        }))
    );
    assert_eq!(
        summary.get("message"),
        Some(&json!("Import process completed. Imported: 6, Failed: 0"))
    );

    let db_path = workspace.path().join("context_portal").join("context.db");
    assert!(db_path.is_file());
    assert_eq!(
        summary.get("database_path"),
        Some(&json!(db_path.display().to_string()))
    );
    let conn = open(&db_path);
    assert_eq!(count_rows(&conn, "decisions").expect("count"), 2);
    assert_eq!(count_rows(&conn, "progress_entries").expect("count"), 2);
    let product = load_context(&conn, ContextKind::Product)
        .expect("load")
        .expect("present");
    assert_eq!(product.get("goal"), Some(&json!("Import context.")));
    let category: String = conn
        .query_row("SELECT category FROM custom_data", [], |row| row.get(0))
        .expect("custom row");
    assert_eq!(category, "glossary");
}

#[test]
fn malformed_file_is_rolled_back_and_reported() {
    let workspace = workspace_with_export(&[
        (
            DECISION_LOG_FILE,
            "## Decision\n* [2024-01-01 00:00:00] Good one\n\n## Decision\n\n**Rationale:** no summary\n",
        ),
        (SYSTEM_PATTERNS_FILE, "## Pattern A\nDescribed.\n"),
    ]);
    let storage = StorageConfig::default();

    let summary = import_markdown(&storage, &request(&workspace)).expect("import");

    assert_eq!(summary.get("status"), Some(&json!("partial_success")));
    assert_eq!(
        summary.get("imported_files"),
        Some(&json!(["system_patterns.md"]))
    );
    let failed = summary
        .get("failed_files")
        .and_then(|value| value.as_array())
        .expect("failed files");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0]["file"], json!("decision_log.md"));
    assert!(failed[0]["error"]
        .as_str()
        .is_some_and(|msg| msg.contains("missing summary")));

    let conn = open(&storage.db_path(&request(&workspace).workspace_id));
    assert_eq!(count_rows(&conn, "decisions").expect("count"), 0);
    assert_eq!(count_rows(&conn, "system_patterns").expect("count"), 1);
}

#[test]
fn reimport_upserts_patterns_and_custom_data() {
    let workspace = workspace_with_export(&[
        (SYSTEM_PATTERNS_FILE, "## Pattern A\nFirst.\n"),
        ("custom_data/config.md", "### limit\n```json\n10\n```\n"),
    ]);
    let storage = StorageConfig::default();
    import_markdown(&storage, &request(&workspace)).expect("first import");

    let export = workspace.path().join(EXPORT_REL);
    write_file(
        &export.join(SYSTEM_PATTERNS_FILE),
        "## Pattern A\nSecond.\n",
    );
    write_file(
        &export.join("custom_data/config.md"),
        "### limit\n```json\n20\n```\n",
    );
    import_markdown(&storage, &request(&workspace)).expect("second import");

    let conn = open(&storage.db_path(&request(&workspace).workspace_id));
    assert_eq!(count_rows(&conn, "system_patterns").expect("count"), 1);
    let description: String = conn
        .query_row("SELECT description FROM system_patterns", [], |row| {
            row.get(0)
        })
        .expect("pattern row");
    assert_eq!(description, "Second.");
    let value: String = conn
        .query_row("SELECT value FROM custom_data WHERE key = 'limit'", [], |row| {
            row.get(0)
        })
        .expect("custom row");
    assert_eq!(value, "20");
}

#[test]
fn custom_base_path_and_filename_address_the_store() {
    let workspace = workspace_with_export(&[(ACTIVE_CONTEXT_FILE, "## Focus\n\nImporter\n")]);
    let stores = tempfile::tempdir().expect("create store root");
    let storage = StorageConfig::new(
        Some(stores.path().to_path_buf()),
        Some("custom.sqlite".to_string()),
    );
    let request = request(&workspace);

    import_markdown(&storage, &request).expect("import");

    let expected = stores
        .path()
        .join(sanitize_workspace_id(&request.workspace_id))
        .join("custom.sqlite");
    assert!(expected.is_file(), "missing {}", expected.display());
    assert!(!workspace.path().join("context_portal").exists());
}

#[test]
fn missing_import_directory_is_fatal() {
    let workspace = tempfile::tempdir().expect("create workspace");
    let storage = StorageConfig::default();

    let err = import_markdown(&storage, &request(&workspace)).expect_err("missing dir");

    assert!(matches!(err, StoreError::ImportDirNotFound(_)));
    assert!(!workspace.path().join("context_portal").exists());
}

#[test]
fn empty_export_reports_nothing_imported() {
    let workspace = workspace_with_export(&[]);
    let summary = import_markdown(&StorageConfig::default(), &request(&workspace)).expect("import");
    assert_eq!(summary.get("status"), Some(&json!("nothing_imported")));
    assert_eq!(summary.get("imported_files"), Some(&json!([])));
}
