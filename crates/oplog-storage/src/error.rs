//! Storage error types

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Schema conflict: {0}")]
    SchemaConflict(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Failure to open or configure the database file.
    pub(crate) fn unavailable(err: rusqlite::Error) -> Self {
        if is_busy(&err) {
            return Self::SchemaConflict(err.to_string());
        }
        Self::StorageUnavailable(err.to_string())
    }

    /// Anything that goes wrong between begin and commit of a write.
    pub(crate) fn write_failed(self) -> Self {
        match self {
            Self::Sqlite(err) => Self::WriteFailed(err.to_string()),
            other => other,
        }
    }
}

/// Another connection holds the lock we need.
pub(crate) fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}
