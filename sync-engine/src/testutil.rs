//! Shared fixtures for unit tests.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sync_core::{IdRuleSet, RetryPolicy};
use sync_types::{Document, IdRule, ResType, SyncRole};

use crate::context::{SyncContext, SyncSettings};
use crate::leader::StaticLeadership;
use crate::lock::{KvLock, MemoryKv};
use crate::medium::MemoryMedium;
use crate::metadata::{HostPool, InnerIds, Metadata};
use crate::resource::{LogicDeps, ResourceRegistry};
use crate::store::{Filter, FindQuery, MemoryStore, Store, StoreError};

pub(crate) fn pool(biz: i64, set: i64, module: i64) -> InnerIds {
    InnerIds {
        host_pool: HostPool { biz, set, module },
    }
}

/// `src-a` owns every id of every kind, `src-b` owns even host ids.
pub(crate) fn rules() -> IdRuleSet {
    let mut rules = IdRuleSet::new();
    for res in ResType::ALL {
        rules.add("src-a", res, IdRule::unbounded(1, 1)).unwrap();
    }
    rules.add("src-b", ResType::Host, IdRule::unbounded(2, 2)).unwrap();
    rules
}

pub(crate) fn deps_for(env: &str, role: SyncRole, store: &MemoryStore, inner: InnerIds, page_size: usize) -> LogicDeps {
    let shared: Arc<dyn Store> = Arc::new(store.clone());
    let metadata = Metadata::new(role, shared.clone(), inner);
    LogicDeps {
        env: env.into(),
        store: shared,
        metadata: Arc::new(metadata),
        rules: Arc::new(rules()),
        peer_inner_ids: Arc::new(HashMap::from([
            ("src-a".to_string(), pool(10, 20, 30)),
            ("dest".to_string(), pool(1, 2, 3)),
        ])),
        page_size,
    }
}

/// Destination-side dependencies with host pool `(1, 2, 3)`.
pub(crate) fn deps(store: &MemoryStore, page_size: usize) -> LogicDeps {
    deps_for("dest", SyncRole::Dest, store, pool(1, 2, 3), page_size)
}

/// One environment wired to in-memory collaborators.
pub(crate) struct Node {
    pub store: MemoryStore,
    pub medium: MemoryMedium,
    pub leader: StaticLeadership,
    pub kv: MemoryKv,
    pub ctx: SyncContext,
    pub registry: Arc<ResourceRegistry>,
}

impl Node {
    pub(crate) fn new(env: &str, role: SyncRole, medium: &MemoryMedium, page_size: usize) -> Self {
        let inner = match role {
            SyncRole::Src => pool(10, 20, 30),
            SyncRole::Dest => pool(1, 2, 3),
        };
        let store = MemoryStore::new();
        let leader = StaticLeadership::new(true);
        let kv = MemoryKv::new();

        let mut settings = SyncSettings::new(env, role);
        settings.page_size = page_size;
        settings.poll_interval = Duration::from_millis(5);
        settings.retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2));

        let deps = deps_for(env, role, &store, inner, page_size);
        let ctx = SyncContext {
            settings: Arc::new(settings),
            store: deps.store.clone(),
            medium: Arc::new(medium.clone()),
            leadership: Arc::new(leader.clone()),
            lock: Arc::new(KvLock::new(Arc::new(kv.clone()))),
        };
        Self {
            store,
            medium: medium.clone(),
            leader,
            kv,
            ctx,
            registry: Arc::new(ResourceRegistry::new(deps)),
        }
    }
}

/// A store whose every call fails as unavailable.
pub(crate) struct DownStore;

#[async_trait]
impl Store for DownStore {
    async fn find(&self, _: &str, _: &FindQuery) -> Result<Vec<Document>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }

    async fn count(&self, _: &str, _: &Filter) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }

    async fn insert(&self, _: &str, _: Document) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }

    async fn update(&self, _: &str, _: &Filter, _: Document) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }

    async fn upsert(&self, _: &str, _: &Filter, _: Document) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }

    async fn delete(&self, _: &str, _: &Filter) -> Result<u64, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }

    async fn distinct(&self, _: &str, _: &str, _: &Filter) -> Result<Vec<Value>, StoreError> {
        Err(StoreError::Unavailable("down".into()))
    }
}
