//! Keyed records handled by the reconciliation engine.

use serde::{Deserialize, Serialize};

use crate::{Document, RelationKey};

/// A record identified by its sort key, carrying an opaque payload.
///
/// Single-key entities use `K = i64`; relations use [`RelationKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRecord<K, T = Document> {
    /// Sort key of the record.
    pub key: K,
    /// Record payload.
    pub data: T,
}

impl<K, T> SyncRecord<K, T> {
    /// Create a record.
    pub fn new(key: K, data: T) -> Self {
        Self { key, data }
    }
}

/// A relation record: keyed by an id pair and immutable once written.
pub type RelationRecord<T = Document> = SyncRecord<RelationKey, T>;
