//! SQLite access for the knowledge store.
//!
//! Every connection goes through `open_store` so pragmas and schema setup
//! stay uniform.
use super::markdown::{CustomEntry, DecisionEntry, PatternEntry, ProgressItem};
use super::{Result, StoreError};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Schema statements, applied idempotently on open.
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Version recorded in `schema_version` for stores created by this tool.
pub const SCHEMA_VERSION: i64 = 1;

pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Single-row context documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Product,
    Active,
}

impl ContextKind {
    pub fn table(self) -> &'static str {
        match self {
            ContextKind::Product => "product_context",
            ContextKind::Active => "active_context",
        }
    }
}

/// Open (creating if needed) the database at `path` and ensure the schema.
pub fn open_store(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| StoreError::io(format!("create {}", parent.display()), err))?;
    }
    let conn = Connection::open(path)?;
    configure_connection(&conn)?;
    ensure_schema(&conn)?;
    Ok(conn)
}

pub fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

fn ensure_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    if read_schema_version(conn)?.is_none() {
        conn.execute(
            "INSERT INTO schema_version (version, applied_at) VALUES (?1, ?2)",
            params![SCHEMA_VERSION, now_timestamp()],
        )?;
    }
    Ok(())
}

pub fn read_schema_version(conn: &Connection) -> Result<Option<i64>> {
    let version: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
            row.get(0)
        })?;
    Ok(version)
}

/// Replace a context document wholesale.
pub fn replace_context(
    conn: &Connection,
    kind: ContextKind,
    content: &Map<String, Value>,
) -> Result<()> {
    let text = serde_json::to_string(content)?;
    let sql = format!(
        "INSERT INTO {} (id, content, updated_at) VALUES (1, ?1, ?2)
         ON CONFLICT(id) DO UPDATE SET content = excluded.content, updated_at = excluded.updated_at",
        kind.table()
    );
    conn.execute(&sql, params![text, now_timestamp()])?;
    Ok(())
}

pub fn load_context(conn: &Connection, kind: ContextKind) -> Result<Option<Map<String, Value>>> {
    let sql = format!("SELECT content FROM {} WHERE id = 1", kind.table());
    let text: Option<String> = conn.query_row(&sql, [], |row| row.get(0)).optional()?;
    match text {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

pub fn insert_decision(conn: &Connection, entry: &DecisionEntry) -> Result<i64> {
    conn.execute(
        "INSERT INTO decisions (timestamp, summary, rationale, implementation_details, tags)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            format_timestamp(entry.timestamp),
            entry.summary,
            entry.rationale,
            entry.implementation_details,
            tags_json(&entry.tags)?,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn upsert_pattern(conn: &Connection, entry: &PatternEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO system_patterns (timestamp, name, description, tags) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name) DO UPDATE SET
             timestamp = excluded.timestamp,
             description = excluded.description,
             tags = excluded.tags",
        params![
            format_timestamp(entry.timestamp),
            entry.name,
            entry.description,
            tags_json(&entry.tags)?,
        ],
    )?;
    Ok(())
}

/// Insert a progress item and its children, returning the number of rows written.
pub fn insert_progress(
    conn: &Connection,
    item: &ProgressItem,
    parent_id: Option<i64>,
) -> Result<usize> {
    conn.execute(
        "INSERT INTO progress_entries (timestamp, status, description, parent_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            format_timestamp(item.timestamp),
            item.status,
            item.description,
            parent_id,
        ],
    )?;
    let id = conn.last_insert_rowid();
    let mut written = 1;
    for child in &item.children {
        written += insert_progress(conn, child, Some(id))?;
    }
    Ok(written)
}

pub fn upsert_custom(conn: &Connection, category: &str, entry: &CustomEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO custom_data (timestamp, category, key, value) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(category, key) DO UPDATE SET
             timestamp = excluded.timestamp,
             value = excluded.value",
        params![
            format_timestamp(entry.timestamp),
            category,
            entry.key,
            serde_json::to_string(&entry.value)?,
        ],
    )?;
    Ok(())
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })?;
    Ok(count)
}

fn tags_json(tags: &[String]) -> Result<Option<String>> {
    if tags.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::to_string(tags)?))
}

fn format_timestamp(timestamp: Option<NaiveDateTime>) -> String {
    match timestamp {
        Some(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        None => now_timestamp(),
    }
}

fn now_timestamp() -> String {
    chrono::Utc::now()
        .naive_utc()
        .format(TIMESTAMP_FORMAT)
        .to_string()
}
