//! Generic reconciliation engine shared by all resource kinds.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use sync_core::{CompareResult, IdRuleSet};
use sync_types::{Document, IncrementalBatch, ResType, SortKey, SyncInterval, SyncRecord};

use super::{ResourceKind, SyncResource};
use crate::context::SyncContext;
use crate::full_sync::{self, ApplyOutcome, SweepOutcome};
use crate::incr_sync;
use crate::metadata::{InnerIds, Metadata};
use crate::store::{FindQuery, Store, StoreError};
use crate::token::SweepCursorStore;
use crate::SyncError;

/// Collaborators of every [`ResourceLogic`].
#[derive(Clone)]
pub struct LogicDeps {
    /// Name of the local environment.
    pub env: String,
    /// Local persistent store.
    pub store: Arc<dyn Store>,
    /// Exclusion rules and local inner ids.
    pub metadata: Arc<Metadata>,
    /// Id ownership rules of every source environment.
    pub rules: Arc<IdRuleSet>,
    /// Inner ids of the other environments, by environment name.
    pub peer_inner_ids: Arc<HashMap<String, InnerIds>>,
    /// Records per listed page.
    pub page_size: usize,
}

/// One listed page of local records.
#[derive(Debug, Clone, PartialEq)]
pub struct ListPage<K> {
    /// Parsed records in key order.
    pub records: Vec<SyncRecord<K>>,
    /// Whether the page was the last one.
    pub is_all: bool,
    /// Where the next page starts; always past the listed interval's start.
    pub next_start: K,
}

/// Reconciliation engine for one resource kind.
pub struct ResourceLogic<R: ResourceKind> {
    kind: R,
    deps: LogicDeps,
}

impl<R: ResourceKind> ResourceLogic<R> {
    /// Create the engine for `kind`.
    pub fn new(kind: R, deps: LogicDeps) -> Self {
        Self { kind, deps }
    }

    /// Shape of the resource kind.
    pub fn kind(&self) -> &R {
        &self.kind
    }

    /// Collaborators.
    pub fn deps(&self) -> &LogicDeps {
        &self.deps
    }

    /// Resource kind served.
    pub fn res_type(&self) -> ResType {
        self.kind.res_type()
    }

    fn is_owned(&self, env: &str, key: &R::Key, doc: &Document) -> bool {
        let mut ids = key.ids();
        ids.extend(self.kind.related_ids(doc));
        self.deps.rules.matches(env, self.res_type(), &ids)
    }

    /// Sub-resources currently present in the local environment.
    pub async fn sub_resource_list(&self) -> Result<Vec<String>, SyncError> {
        let metadata = &self.deps.metadata;
        match self.res_type() {
            ResType::ObjectInstance => Ok(metadata.common_obj_ids().await?.0),
            ResType::QuotedInstance => Ok(metadata.common_obj_ids().await?.1),
            ResType::InstAsst => metadata.asst_obj_ids().await,
            _ => Ok(vec![String::new()]),
        }
    }

    /// Parse records received from `src_env`.
    ///
    /// Container ids of `src_env` are remapped to local ones, then every
    /// record must be owned by `src_env`. Records that fail either step are
    /// logged and dropped; the rest of the batch is kept.
    pub fn parse_data_arr(&self, src_env: &str, sub_res: &str, raw: Vec<Value>) -> Vec<SyncRecord<R::Key>> {
        let res = self.res_type();
        let local = self.deps.metadata.inner_ids();
        let foreign = if src_env == self.deps.env {
            None
        } else {
            self.deps.peer_inner_ids.get(src_env)
        };

        let mut records = Vec::with_capacity(raw.len());
        for value in raw {
            let Value::Object(mut doc) = value else {
                tracing::warn!("Dropping non-object {} record of {:?} from {}", res, sub_res, src_env);
                continue;
            };
            doc.remove("_id");
            if let Some(foreign) = foreign {
                local.remap_from(foreign, &mut doc);
            }
            let Some(key) = self.kind.key_of(&doc) else {
                tracing::warn!("Dropping {} record of {:?} from {}: no valid key", res, sub_res, src_env);
                continue;
            };
            if !self.is_owned(src_env, &key, &doc) {
                tracing::warn!("Dropping {} {:?} from {}: id not owned by that environment", res, key, src_env);
                continue;
            }
            records.push(SyncRecord::new(key, doc));
        }
        records
    }

    /// List one page of local records inside `interval`.
    ///
    /// With `owner` set, records not owned by that environment are left out
    /// of the page; they still advance `next_start`.
    pub async fn list_data(
        &self,
        sub_res: &str,
        interval: &SyncInterval<R::Key>,
        owner: Option<&str>,
    ) -> Result<ListPage<R::Key>, SyncError> {
        let res = self.res_type();
        let collection = self.kind.collection(sub_res);
        let filter = self
            .deps
            .metadata
            .add_list_cond(res, self.kind.interval_filter(interval))
            .await;
        let query = FindQuery::new(filter)
            .sort_by(self.kind.sort_fields())
            .limit(self.deps.page_size);
        let docs = self.deps.store.find(&collection, &query).await?;
        let is_all = docs.len() < self.deps.page_size;

        let mut last = None;
        let mut records = Vec::with_capacity(docs.len());
        for mut doc in docs {
            doc.remove("_id");
            let Some(key) = self.kind.key_of(&doc) else {
                tracing::warn!("Skipping {} record in {} without a valid key", res, collection);
                continue;
            };
            last = Some(key.clone());
            if let Some(env) = owner {
                if !self.is_owned(env, &key, &doc) {
                    continue;
                }
            }
            records.push(SyncRecord::new(key, doc));
        }

        let next_start = match last {
            Some(key) if key > interval.start => key.successor(),
            _ => interval.start.successor(),
        };
        Ok(ListPage {
            records,
            is_all,
            next_start,
        })
    }

    /// Cross-diff a source batch against the destination's page.
    pub fn compare_data(
        &self,
        source: Vec<SyncRecord<R::Key>>,
        dest: Vec<SyncRecord<R::Key>>,
        dest_end: Option<&R::Key>,
    ) -> CompareResult<R::Key> {
        let result = sync_core::compare_data(source, dest, dest_end);
        for key in &result.duplicate_source {
            tracing::warn!("Dropping duplicate {} {:?} in source batch, keeping the last copy", self.res_type(), key);
        }
        result
    }

    /// Split upsert candidates into inserts and updates by probing the store.
    ///
    /// Relations that already exist are neither inserted nor updated.
    pub async fn classify_upsert_data(
        &self,
        sub_res: &str,
        records: Vec<SyncRecord<R::Key>>,
    ) -> Result<(Vec<SyncRecord<R::Key>>, Vec<SyncRecord<R::Key>>), SyncError> {
        if records.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }
        let keys: Vec<R::Key> = records.iter().map(|r| r.key.clone()).collect();
        let query = FindQuery::new(self.kind.keys_filter(&keys));
        let existing: BTreeSet<R::Key> = self
            .deps
            .store
            .find(&self.kind.collection(sub_res), &query)
            .await?
            .iter()
            .filter_map(|doc| self.kind.key_of(doc))
            .collect();

        let mut insert = Vec::new();
        let mut update = Vec::new();
        for record in records {
            if !existing.contains(&record.key) {
                insert.push(record);
            } else if R::Key::IMMUTABLE {
                tracing::debug!("{} {:?} already exists, skipping", self.res_type(), record.key);
            } else {
                update.push(record);
            }
        }
        Ok((insert, update))
    }

    /// Insert records. A record that already exists counts as inserted.
    pub async fn insert_data(&self, sub_res: &str, records: &[SyncRecord<R::Key>]) -> Result<(), SyncError> {
        let collection = self.kind.collection(sub_res);
        for record in records {
            match self.deps.store.insert(&collection, record.data.clone()).await {
                Ok(()) => {}
                Err(StoreError::DuplicateKey { detail, .. }) => {
                    tracing::debug!("{} {:?} already inserted ({})", self.res_type(), record.key, detail);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Replace records as whole documents, inserting the ones that vanished.
    pub async fn update_data(&self, sub_res: &str, records: &[SyncRecord<R::Key>]) -> Result<(), SyncError> {
        let collection = self.kind.collection(sub_res);
        for record in records {
            let filter = self.kind.keys_filter(std::slice::from_ref(&record.key));
            let matched = self.deps.store.update(&collection, &filter, record.data.clone()).await?;
            if matched == 0 {
                self.insert_data(sub_res, std::slice::from_ref(record)).await?;
            }
        }
        Ok(())
    }

    /// Delete records by key.
    pub async fn delete_data(&self, sub_res: &str, keys: &[R::Key]) -> Result<(), SyncError> {
        if keys.is_empty() {
            return Ok(());
        }
        let deleted = self
            .deps
            .store
            .delete(&self.kind.collection(sub_res), &self.kind.keys_filter(keys))
            .await?;
        tracing::debug!("Deleted {} {} records", deleted, self.res_type());
        Ok(())
    }
}

#[async_trait]
impl<R: ResourceKind> SyncResource for ResourceLogic<R> {
    fn res_type(&self) -> ResType {
        self.kind.res_type()
    }

    async fn sub_resources(&self) -> Result<Vec<String>, SyncError> {
        self.sub_resource_list().await
    }

    async fn push_full_sync(
        &self,
        ctx: &SyncContext,
        cursors: &SweepCursorStore,
        sub_res: &str,
    ) -> Result<SweepOutcome, SyncError> {
        full_sync::push_sweep(self, ctx, cursors, sub_res).await
    }

    async fn apply_full_sync(
        &self,
        ctx: &SyncContext,
        sub_res: &str,
        payload: &[u8],
    ) -> Result<ApplyOutcome, SyncError> {
        full_sync::apply_window(self, ctx, sub_res, payload).await
    }

    async fn apply_incremental(
        &self,
        ctx: &SyncContext,
        batch: IncrementalBatch,
    ) -> Result<ApplyOutcome, SyncError> {
        incr_sync::apply_batch(self, ctx, batch).await
    }
}
