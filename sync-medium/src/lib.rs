//! # sync-medium
//!
//! Durable transfer medium for cmdb-sync, backed by SQLite.
//!
//! ## Features
//!
//! - **FIFO queues**: one per `(resource, sub-resource, full|incremental)`
//! - **Ack on next pull**: a payload leaves the queue only once the
//!   consumer confirms it on its following pull
//! - **Expiry**: payloads expire after a TTL and are purged by a
//!   background task
//!
//! ## Example
//!
//! ```ignore
//! use sync_medium::{spawn_cleanup_task, CleanupConfig, SqliteMedium};
//!
//! let medium = Arc::new(SqliteMedium::new(Path::new("medium.db"), ttl).await?);
//! spawn_cleanup_task(medium.clone(), CleanupConfig::default());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cleanup;
pub mod error;
pub mod sqlite;

pub use cleanup::{spawn_cleanup_task, CleanupConfig};
pub use error::{StorageError, StorageResult};
pub use sqlite::{SqliteMedium, DEFAULT_PAYLOAD_TTL};
