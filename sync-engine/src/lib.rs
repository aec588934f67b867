//! # sync-engine
//!
//! Resource logic and sync orchestrators for cmdb-sync.
//!
//! This crate performs the I/O around the pure algorithms of `sync-core`:
//! it lists and writes local records, pushes and pulls payloads through the
//! transfer medium and keeps durable checkpoints.
//!
//! ## Features
//!
//! - **Generic resource engine**: one [`ResourceLogic`] for all eleven kinds
//! - **Full sync**: paginated cross-environment reconciliation
//! - **Incremental sync**: change capture with collapse and watch tokens
//! - **Pluggable collaborators**: store, medium, lock, leadership and change
//!   source are traits with in-memory implementations for tests
//!
//! ## Example
//!
//! ```ignore
//! use sync_engine::{ResourceRegistry, SourceFullSync};
//!
//! let registry = Arc::new(ResourceRegistry::new(deps));
//! let (job, trigger) = SourceFullSync::new(ctx, registry);
//! tokio::spawn(job.run());
//!
//! // Sweep hosts now instead of waiting for the next tick
//! trigger.trigger(Some(vec![ResType::Host]))?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod context;
pub mod error;
pub mod full_sync;
pub mod incr_sync;
pub mod leader;
pub mod lock;
pub mod medium;
pub mod metadata;
pub mod resource;
pub mod retry;
pub mod store;
pub mod tables;
pub mod token;
pub mod watch;

#[cfg(test)]
pub(crate) mod testutil;

pub use context::{SyncContext, SyncSettings, FULL_SYNC_LOCK_KEY};
pub use error::SyncError;
pub use full_sync::{ApplyOutcome, DestFullSync, FullSyncTrigger, SourceFullSync, SweepOutcome, SweepReport};
pub use incr_sync::{unix_now, IncrementalPoller, IncrementalWatcher};
pub use leader::{Leadership, StaticLeadership};
pub use lock::{DistributedLock, KvLock, KvStore, LockError, MemoryKv};
pub use medium::{MediumError, MemoryMedium, PullResponse, TransferMedium};
pub use metadata::{HostPool, InnerIds, Metadata};
pub use resource::{
    EntityKind, ListPage, LogicDeps, RelationKind, ResourceKind, ResourceLogic, ResourceRegistry, SyncResource,
};
pub use retry::with_retry;
pub use store::{Filter, FindQuery, MemoryStore, Store, StoreError};
pub use token::{SweepCursorStore, TokenStore};
pub use watch::{ChangeEvent, ChangeSource, MemoryChangeSource, WatchError, WatchTarget};
