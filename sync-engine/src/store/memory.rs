//! In-memory store for tests and local runs.
//!
//! Collections keep insertion order. Unique indexes are declared per
//! collection; `_id` is always unique.

use super::{compare_values, Filter, FindQuery, Store, StoreError};
use async_trait::async_trait;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use sync_types::Document;

/// In-memory [`Store`].
///
/// Clones share the same data.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
    collections: HashMap<String, Vec<Document>>,
    unique_indexes: HashMap<String, Vec<Vec<String>>>,
    fail_next_read: Option<String>,
    fail_next_write: Option<String>,
    writes: u64,
}

impl MemoryStoreInner {
    fn check_fail_read(&mut self) -> Result<(), StoreError> {
        match self.fail_next_read.take() {
            Some(error) => Err(StoreError::Unavailable(error)),
            None => Ok(()),
        }
    }

    fn check_fail_write(&mut self) -> Result<(), StoreError> {
        match self.fail_next_write.take() {
            Some(error) => Err(StoreError::Unavailable(error)),
            None => {
                self.writes += 1;
                Ok(())
            }
        }
    }

    /// Find a document other than `skip` that conflicts with `doc`.
    fn conflict(&self, collection: &str, doc: &Document, skip: Option<usize>) -> Option<String> {
        let docs = self.collections.get(collection)?;
        let id_index = vec!["_id".to_string()];
        let indexes = self
            .unique_indexes
            .get(collection)
            .into_iter()
            .flatten()
            .chain(std::iter::once(&id_index));

        for fields in indexes {
            let Some(key) = fields.iter().map(|f| doc.get(f)).collect::<Option<Vec<_>>>() else {
                continue;
            };
            let clash = docs.iter().enumerate().any(|(i, other)| {
                Some(i) != skip
                    && fields
                        .iter()
                        .zip(&key)
                        .all(|(f, v)| other.get(f).is_some_and(|o| o == *v))
            });
            if clash {
                return Some(format!("{:?} = {:?}", fields, key));
            }
        }
        None
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStoreInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Declare a unique index over `fields` of `collection`.
    pub fn create_unique_index(&self, collection: &str, fields: &[&str]) {
        let mut inner = self.lock();
        inner
            .unique_indexes
            .entry(collection.to_string())
            .or_default()
            .push(fields.iter().map(|f| f.to_string()).collect());
    }

    /// All documents of a collection, in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        let inner = self.lock();
        inner.collections.get(collection).cloned().unwrap_or_default()
    }

    /// Insert documents bypassing unique indexes and failure injection.
    pub fn seed(&self, collection: &str, docs: impl IntoIterator<Item = Document>) {
        let mut inner = self.lock();
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
    }

    /// Number of successful write calls so far.
    pub fn write_count(&self) -> u64 {
        self.lock().writes
    }

    /// Cause the next read (find, count, distinct) to fail.
    pub fn fail_next_read(&self, error: &str) {
        self.lock().fail_next_read = Some(error.to_string());
    }

    /// Cause the next write (insert, update, upsert, delete) to fail.
    pub fn fail_next_write(&self, error: &str) {
        self.lock().fail_next_write = Some(error.to_string());
    }
}

fn sort_documents(docs: &mut [Document], fields: &[String]) {
    docs.sort_by(|a, b| {
        for field in fields {
            let ord = match (a.get(field), b.get(field)) {
                (Some(x), Some(y)) => compare_values(x, y).unwrap_or(Ordering::Equal),
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl Store for MemoryStore {
    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let mut inner = self.lock();
        inner.check_fail_read()?;

        let mut docs: Vec<Document> = inner
            .collections
            .get(collection)
            .into_iter()
            .flatten()
            .filter(|doc| query.filter.matches(doc))
            .cloned()
            .collect();
        sort_documents(&mut docs, &query.sort);
        if let Some(limit) = query.limit {
            docs.truncate(limit);
        }
        Ok(docs)
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        inner.check_fail_read()?;
        Ok(inner
            .collections
            .get(collection)
            .into_iter()
            .flatten()
            .filter(|doc| filter.matches(doc))
            .count() as u64)
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_fail_write()?;

        if let Some(detail) = inner.conflict(collection, &doc, None) {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                detail,
            });
        }
        inner
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(())
    }

    async fn update(&self, collection: &str, filter: &Filter, doc: Document) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        inner.check_fail_write()?;

        let targets: Vec<usize> = inner
            .collections
            .get(collection)
            .into_iter()
            .flatten()
            .enumerate()
            .filter(|(_, d)| filter.matches(d))
            .map(|(i, _)| i)
            .collect();

        for &i in &targets {
            if let Some(detail) = inner.conflict(collection, &doc, Some(i)) {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    detail,
                });
            }
        }

        if let Some(docs) = inner.collections.get_mut(collection) {
            for &i in &targets {
                docs[i] = doc.clone();
            }
        }
        Ok(targets.len() as u64)
    }

    async fn upsert(&self, collection: &str, filter: &Filter, doc: Document) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.check_fail_write()?;

        let docs = inner.collections.entry(collection.to_string()).or_default();
        match docs.iter_mut().find(|d| filter.matches(d)) {
            Some(existing) => *existing = doc,
            None => docs.push(doc),
        }
        Ok(())
    }

    async fn delete(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let mut inner = self.lock();
        inner.check_fail_write()?;

        let Some(docs) = inner.collections.get_mut(collection) else {
            return Ok(0);
        };
        let before = docs.len();
        docs.retain(|d| !filter.matches(d));
        Ok((before - docs.len()) as u64)
    }

    async fn distinct(&self, collection: &str, field: &str, filter: &Filter) -> Result<Vec<Value>, StoreError> {
        let mut inner = self.lock();
        inner.check_fail_read()?;

        let mut values: Vec<Value> = Vec::new();
        for doc in inner.collections.get(collection).into_iter().flatten() {
            if !filter.matches(doc) {
                continue;
            }
            if let Some(value) = doc.get(field) {
                if !values.contains(value) {
                    values.push(value.clone());
                }
            }
        }
        Ok(values)
    }
}
