//! Persistent store abstraction.
//!
//! The sync engine reads and writes documents only through [`Store`]. A
//! document is a JSON object; collections are addressed by name and
//! documents are selected with a [`Filter`].
//!
//! # Example
//!
//! ```ignore
//! let store = MemoryStore::new();
//! store.insert("cc_HostBase", doc).await?;
//! let hosts = store.find("cc_HostBase", &FindQuery::new(Filter::gte("bk_host_id", 10))).await?;
//! ```

mod filter;
mod memory;

pub use filter::{compare_values, Filter};
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde_json::Value;
use sync_types::Document;
use thiserror::Error;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique index rejected the document.
    #[error("duplicate key in {collection}: {detail}")]
    DuplicateKey {
        /// Collection written to.
        collection: String,
        /// Conflicting key description.
        detail: String,
    },

    /// The store could not be reached or timed out.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A document could not be encoded or decoded.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// A find request: filter, ascending sort fields and an optional limit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FindQuery {
    /// Documents must match this filter.
    pub filter: Filter,
    /// Fields to sort by, ascending, in priority order.
    pub sort: Vec<String>,
    /// Maximum number of documents to return.
    pub limit: Option<usize>,
}

impl FindQuery {
    /// Query all documents matching `filter`.
    pub fn new(filter: Filter) -> Self {
        Self {
            filter,
            sort: Vec::new(),
            limit: None,
        }
    }

    /// Sort ascending by the given fields.
    pub fn sort_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sort = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Return at most `limit` documents.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Document store used by every sync component.
///
/// Implementations must be safe to share between tasks.
#[async_trait]
pub trait Store: Send + Sync {
    /// Find documents.
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError>;

    /// Find the first document matching `filter`.
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let query = FindQuery::new(filter.clone()).limit(1);
        Ok(self.find(collection, &query).await?.into_iter().next())
    }

    /// Count documents matching `filter`.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Insert one document. Fails with [`StoreError::DuplicateKey`] on a
    /// unique index conflict.
    async fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError>;

    /// Replace every document matching `filter` with `doc`. Returns the
    /// number of replaced documents.
    async fn update(&self, collection: &str, filter: &Filter, doc: Document) -> Result<u64, StoreError>;

    /// Replace the first document matching `filter`, or insert `doc`.
    async fn upsert(&self, collection: &str, filter: &Filter, doc: Document) -> Result<(), StoreError>;

    /// Delete every document matching `filter`. Returns the number deleted.
    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Distinct values of `field` among documents matching `filter`.
    async fn distinct(&self, collection: &str, field: &str, filter: &Filter) -> Result<Vec<Value>, StoreError>;
}
