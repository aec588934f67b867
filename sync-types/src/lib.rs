//! # sync-types
//!
//! Data model and wire format for cross-environment CMDB synchronization.
//!
//! This crate provides the foundational types used across all cmdb-sync crates:
//! - [`ResType`] - The eleven synchronized resource kinds
//! - [`SortKey`], [`RelationKey`], [`SyncInterval`] - Pagination keys and windows
//! - [`SyncRecord`], [`RelationRecord`] - Keyed records compared by the cross-diff
//! - [`IdRule`] - Id-space ownership rules for source environments
//! - [`FullSyncBatch`], [`IncrementalBatch`] - Payloads relayed through the transfer medium
//! - [`EventInfo`], [`WatchToken`] - Change-capture events and checkpoints
//! - [`TypesError`] - Error types

#![warn(missing_docs)]
#![warn(clippy::all)]

mod batch;
mod error;
mod event;
mod ids;
mod record;
mod resource;
mod rule;

pub use batch::{FullSyncBatch, IncrementalBatch};
pub use error::TypesError;
pub use event::{EventInfo, EventType, WatchToken};
pub use ids::{RelationKey, SortKey, SyncInterval};
pub use record::{RelationRecord, SyncRecord};
pub use resource::{ResType, SyncRole};
pub use rule::IdRule;

/// A stored document: a JSON object keyed by field name.
pub type Document = serde_json::Map<String, serde_json::Value>;
