//! Error types for the transfer service.

use crate::config::ConfigError;
use sync_engine::SyncError;
use sync_medium::StorageError;

/// Main error type for transfer service operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Sync engine error.
    #[error("sync error: {0}")]
    Sync(#[from] SyncError),

    /// Medium storage error.
    #[error("medium error: {0}")]
    Medium(#[from] StorageError),

    /// The operation does not exist for this role.
    #[error("{operation} is not available on a {role} environment")]
    WrongRole {
        /// Requested operation.
        operation: &'static str,
        /// Role of the local environment.
        role: sync_types::SyncRole,
    },

    /// The service was soft-disabled at startup.
    #[error("sync is disabled: {reason}")]
    Disabled {
        /// Why the service did not start its loops.
        reason: String,
    },
}

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
