//! Error types for the SQLite medium.

use std::path::PathBuf;
use sync_engine::MediumError;

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

impl From<StorageError> for MediumError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Database(sqlx::Error::PoolTimedOut)
            | StorageError::Database(sqlx::Error::PoolClosed)
            | StorageError::Database(sqlx::Error::Io(_)) => MediumError::Unavailable(err.to_string()),
            other => MediumError::Storage(other.to_string()),
        }
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
