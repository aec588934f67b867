//! Cross-diff of a source window against the destination's own records.
//!
//! Both sides paginate independently. The destination lists its records
//! for the window the source pushed and compares the two slices:
//!
//! - equal on both sides: nothing to do
//! - present on the destination only, or different: delete the destination copy
//! - pending on the source side: insert, unless the key lies past the end of
//!   the destination's own page, in which case it is carried over to the next
//!   step as `remaining_source`
//!
//! Differences are never patched field by field. A changed record is deleted
//! and inserted again as a whole document.
//!
//! A key sent twice by the source keeps its last record; the earlier keys
//! are reported in `duplicate_source`.

use std::collections::BTreeMap;
use sync_types::{Document, SortKey, SyncRecord};

/// Output of one cross-diff step.
#[derive(Debug, Clone, PartialEq)]
pub struct CompareResult<K, T = Document> {
    /// Source records missing on the destination.
    pub insert: Vec<SyncRecord<K, T>>,
    /// Records to update in place. The cross-diff itself never fills this;
    /// it exists for callers that classify upserts by existence.
    pub update: Vec<SyncRecord<K, T>>,
    /// Destination records to remove.
    pub delete: Vec<SyncRecord<K, T>>,
    /// Source records past the destination window, kept for the next step.
    pub remaining_source: Vec<SyncRecord<K, T>>,
    /// Keys the source batch held more than once.
    pub duplicate_source: Vec<K>,
}

impl<K, T> Default for CompareResult<K, T> {
    fn default() -> Self {
        Self {
            insert: Vec::new(),
            update: Vec::new(),
            delete: Vec::new(),
            remaining_source: Vec::new(),
            duplicate_source: Vec::new(),
        }
    }
}

impl<K, T> CompareResult<K, T> {
    /// Whether applying this result would change nothing.
    pub fn is_noop(&self) -> bool {
        self.insert.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

/// Compare source records against destination records of the same window.
///
/// `dest_end` is the exclusive end of the destination's listed page, or
/// `None` when the destination listed everything up to the window end.
/// Output vectors are ordered by key.
pub fn compare_data<K, T>(
    source: Vec<SyncRecord<K, T>>,
    dest: Vec<SyncRecord<K, T>>,
    dest_end: Option<&K>,
) -> CompareResult<K, T>
where
    K: SortKey,
    T: PartialEq,
{
    let mut result = CompareResult::default();

    let mut pending: BTreeMap<K, SyncRecord<K, T>> = BTreeMap::new();
    for record in source {
        if let Some(earlier) = pending.insert(record.key.clone(), record) {
            result.duplicate_source.push(earlier.key);
        }
    }

    for record in dest {
        match pending.get(&record.key) {
            Some(src) if src.data == record.data => {
                pending.remove(&record.key);
            }
            _ => result.delete.push(record),
        }
    }
    result.delete.sort_by(|a, b| a.key.cmp(&b.key));

    for (key, record) in pending {
        if dest_end.is_some_and(|end| key >= *end) {
            result.remaining_source.push(record);
        } else {
            result.insert.push(record);
        }
    }

    result
}
