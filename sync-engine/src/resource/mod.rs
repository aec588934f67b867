//! Resource logic.
//!
//! One generic reconciliation engine, [`ResourceLogic`], serves all eleven
//! resource kinds. What differs between kinds (collection, key fields,
//! related ids) is described by a [`ResourceKind`]; the two key shapes are
//! [`EntityKind`] (numeric id) and [`RelationKind`] (id pair).
//!
//! Orchestrators work with resources through the object-safe
//! [`SyncResource`] trait, looked up in a [`ResourceRegistry`].

mod kinds;
mod logic;
mod registry;

pub use kinds::{record_ids, sub_res_from_collection, EntityKind, RelationKind, Table};
pub use logic::{ListPage, LogicDeps, ResourceLogic};
pub use registry::ResourceRegistry;

use async_trait::async_trait;
use sync_types::{Document, IncrementalBatch, ResType, SortKey, SyncInterval};

use crate::context::SyncContext;
use crate::full_sync::{ApplyOutcome, SweepOutcome};
use crate::store::Filter;
use crate::token::SweepCursorStore;
use crate::SyncError;

/// Shape of one resource kind.
pub trait ResourceKind: Send + Sync + 'static {
    /// Sort key of the kind's records.
    type Key: SortKey;

    /// Resource kind described.
    fn res_type(&self) -> ResType;

    /// Collection holding the records of a sub-resource.
    fn collection(&self, sub_res: &str) -> String;

    /// Extract the key of a document.
    fn key_of(&self, doc: &Document) -> Option<Self::Key>;

    /// Ids besides the key that decide ownership (e.g. the business id).
    fn related_ids(&self, doc: &Document) -> Vec<i64>;

    /// Filter selecting the keys inside `interval`.
    fn interval_filter(&self, interval: &SyncInterval<Self::Key>) -> Filter;

    /// Filter selecting exactly the given keys.
    fn keys_filter(&self, keys: &[Self::Key]) -> Filter;

    /// Fields to sort by so that documents come in key order.
    fn sort_fields(&self) -> Vec<&'static str>;
}

/// Object-safe view of a resource used by the orchestrators.
#[async_trait]
pub trait SyncResource: Send + Sync {
    /// Resource kind.
    fn res_type(&self) -> ResType;

    /// Sub-resources to sync; a single empty string if the kind has none.
    async fn sub_resources(&self) -> Result<Vec<String>, SyncError>;

    /// Source side: page through one sub-resource and push every page.
    async fn push_full_sync(
        &self,
        ctx: &SyncContext,
        cursors: &SweepCursorStore,
        sub_res: &str,
    ) -> Result<SweepOutcome, SyncError>;

    /// Destination side: reconcile the local store against one pushed window.
    async fn apply_full_sync(
        &self,
        ctx: &SyncContext,
        sub_res: &str,
        payload: &[u8],
    ) -> Result<ApplyOutcome, SyncError>;

    /// Destination side: apply one incremental batch.
    async fn apply_incremental(
        &self,
        ctx: &SyncContext,
        batch: IncrementalBatch,
    ) -> Result<ApplyOutcome, SyncError>;
}
