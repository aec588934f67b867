//! Payloads relayed through the transfer medium.
//!
//! Records travel as raw JSON values so that the receiving side can parse
//! them one by one and drop only the records that fail, never the batch.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::TypesError;

/// One full-sync window pushed by a source environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FullSyncBatch<K> {
    /// Name of the source environment.
    pub env: String,
    /// Inclusive start of the window.
    pub start: K,
    /// Exclusive end of the window, `None` when the source reached the end.
    pub end: Option<K>,
    /// Raw records inside the window, in key order.
    pub data: Vec<Value>,
}

impl<K: Serialize + DeserializeOwned> FullSyncBatch<K> {
    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypesError> {
        rmp_serde::to_vec_named(self).map_err(TypesError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        rmp_serde::from_slice(bytes).map_err(TypesError::Deserialization)
    }
}

/// Final-state changes of one resource collected during one watch cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncrementalBatch {
    /// Name of the source environment.
    pub env: String,
    /// Records to create or update, grouped by sub-resource.
    #[serde(default)]
    pub upsert: BTreeMap<String, Vec<Value>>,
    /// Records to delete, grouped by sub-resource.
    #[serde(default)]
    pub delete: BTreeMap<String, Vec<Value>>,
}

impl IncrementalBatch {
    /// Create an empty batch for an environment.
    pub fn new(env: impl Into<String>) -> Self {
        Self {
            env: env.into(),
            ..Self::default()
        }
    }

    /// Whether the batch carries no change at all.
    pub fn is_empty(&self) -> bool {
        self.upsert.values().all(Vec::is_empty) && self.delete.values().all(Vec::is_empty)
    }

    /// Total number of records in the batch.
    pub fn len(&self) -> usize {
        self.upsert.values().chain(self.delete.values()).map(Vec::len).sum()
    }

    /// Serialize to MessagePack bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, TypesError> {
        rmp_serde::to_vec_named(self).map_err(TypesError::Serialization)
    }

    /// Deserialize from MessagePack bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        rmp_serde::from_slice(bytes).map_err(TypesError::Deserialization)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelationKey;
    use serde_json::json;

    #[test]
    fn full_batch_keeps_nested_documents() {
        let batch = FullSyncBatch {
            env: "env-a".into(),
            start: 0i64,
            end: Some(500),
            data: vec![json!({"bk_host_id": 3, "tags": ["a", "b"], "attrs": {"cpu": -2}})],
        };
        let decoded = FullSyncBatch::<i64>::from_bytes(&batch.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn relation_batch_keeps_open_end() {
        let batch = FullSyncBatch {
            env: "env-b".into(),
            start: RelationKey::new(4, 1),
            end: None,
            data: vec![],
        };
        let decoded = FullSyncBatch::<RelationKey>::from_bytes(&batch.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded.end, None);
        assert_eq!(decoded.start, RelationKey::new(4, 1));
    }

    #[test]
    fn incremental_batch_counts_records() {
        let mut batch = IncrementalBatch::new("env-a");
        assert!(batch.is_empty());
        batch.upsert.entry(String::new()).or_default().push(json!({"bk_biz_id": 2}));
        batch.delete.entry(String::new()).or_default().push(json!({"bk_biz_id": 3}));
        assert!(!batch.is_empty());
        assert_eq!(batch.len(), 2);
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(IncrementalBatch::from_bytes(b"\xc1\xc1").is_err());
    }
}
