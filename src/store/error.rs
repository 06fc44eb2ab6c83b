use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the knowledge store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("import directory not found: {}", .0.display())]
    ImportDirNotFound(PathBuf),

    #[error("invalid storage configuration: {0}")]
    InvalidConfig(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{file}: {message}")]
    Parse { file: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        StoreError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn parse(file: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Parse {
            file: file.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
