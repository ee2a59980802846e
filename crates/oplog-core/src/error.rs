//! Core error types

use oplog_storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Coarse classification callers can match on without caring which backend
/// produced the error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    StorageUnavailable,
    WriteFailed,
    SchemaConflict,
    InvalidRecord,
    Internal,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Storage(StorageError::StorageUnavailable(_)) => {
                ErrorKind::StorageUnavailable
            }
            CoreError::Storage(StorageError::WriteFailed(_)) => ErrorKind::WriteFailed,
            CoreError::Storage(StorageError::SchemaConflict(_)) => ErrorKind::SchemaConflict,
            CoreError::Storage(StorageError::Sqlite(_)) => ErrorKind::Internal,
            CoreError::InvalidRecord(_) => ErrorKind::InvalidRecord,
            CoreError::Serialization(_)
            | CoreError::Task(_)
            | CoreError::Config(_) => ErrorKind::Internal,
        }
    }
}

impl From<tokio::task::JoinError> for CoreError {
    fn from(err: tokio::task::JoinError) -> Self {
        CoreError::Task(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_follows_storage_taxonomy() {
        let err = CoreError::from(StorageError::WriteFailed("disk full".into()));
        assert_eq!(err.kind(), ErrorKind::WriteFailed);

        let err = CoreError::from(StorageError::SchemaConflict("v2".into()));
        assert_eq!(err.kind(), ErrorKind::SchemaConflict);

        let err = CoreError::InvalidRecord("missing field `id`".into());
        assert_eq!(err.kind(), ErrorKind::InvalidRecord);
        assert_eq!(err.to_string(), "Invalid record: missing field `id`");
    }
}
