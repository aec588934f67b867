//! Engine error type.

use sync_types::TypesError;
use thiserror::Error;

use crate::lock::LockError;
use crate::medium::MediumError;
use crate::store::StoreError;
use crate::watch::WatchError;

/// Errors raised by resource logic and orchestrators.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Persistent store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Transfer medium failure.
    #[error("medium error: {0}")]
    Medium(#[from] MediumError),

    /// Distributed lock failure.
    #[error("lock error: {0}")]
    Lock(#[from] LockError),

    /// Change source failure.
    #[error("watch error: {0}")]
    Watch(#[from] WatchError),

    /// Payload encoding or decoding failure.
    #[error("codec error: {0}")]
    Codec(#[from] TypesError),

    /// Required metadata is missing from the store.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// The operation is not available for this role or resource.
    #[error("not supported: {0}")]
    NotSupported(String),
}

impl SyncError {
    /// Whether retrying the same step may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Store(e) => e.is_retryable(),
            SyncError::Medium(_) | SyncError::Lock(_) => true,
            SyncError::Watch(WatchError::Unavailable(_)) => true,
            SyncError::Watch(WatchError::CursorExpired(_)) => false,
            SyncError::Codec(_) | SyncError::Metadata(_) | SyncError::NotSupported(_) => false,
        }
    }
}
