//! Two-environment harness.
//!
//! Wires one or more source environments and one destination through a
//! shared in-memory transfer medium. Every environment has its own store,
//! leadership flag and lock, like separate deployments would. Loops are
//! driven one round at a time so scenarios stay deterministic.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use sync_core::{IdRuleSet, RetryPolicy};
use sync_engine::{
    tables, ChangeSource, DestFullSync, Filter, HostPool, IncrementalPoller, IncrementalWatcher, InnerIds, KvLock,
    LogicDeps, MemoryChangeSource, MemoryKv, MemoryMedium, MemoryStore, Metadata, ResourceRegistry,
    SourceFullSync, StaticLeadership, Store, SweepReport, SyncContext, SyncError, SyncSettings, WatchTarget,
};
use sync_types::{Document, EventType, IdRule, ResType, SyncRole};

/// Page size of every environment. Small, so windows split often.
pub const PAGE_SIZE: usize = 3;

/// Name of the destination environment.
pub const DEST: &str = "dest";

/// Build a document from a JSON object literal.
pub fn doc(value: Value) -> Document {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {}", other),
    }
}

/// Host pool ids of an environment.
pub fn host_pool(env: &str) -> InnerIds {
    let (biz, set, module) = match env {
        "env-a" => (10, 20, 30),
        "env-b" => (12, 22, 32),
        _ => (1, 2, 3),
    };
    InnerIds {
        host_pool: HostPool { biz, set, module },
    }
}

/// `env-a` owns odd ids and `env-b` even ids, for every resource kind.
pub fn rules() -> IdRuleSet {
    let mut rules = IdRuleSet::new();
    for res in ResType::ALL {
        rules.add("env-a", res, IdRule::unbounded(1, 2)).expect("valid rule");
        rules.add("env-b", res, IdRule::unbounded(2, 2)).expect("valid rule");
    }
    rules
}

/// One deployment: store, leadership, lock and resource registry.
pub struct Environment {
    /// Environment name.
    pub name: String,
    /// Local configuration database.
    pub store: MemoryStore,
    /// Leadership flag of the local replica.
    pub leader: StaticLeadership,
    /// Shared loop context.
    pub ctx: SyncContext,
    /// Resource logic of the environment.
    pub registry: Arc<ResourceRegistry>,
    /// Exclusion filter of the environment.
    pub metadata: Arc<Metadata>,
}

impl Environment {
    fn new(name: &str, role: SyncRole, medium: &MemoryMedium, peers: &[&str]) -> Self {
        let store = MemoryStore::new();
        let inner = host_pool(name);
        let pool = inner.host_pool;
        store.seed(tables::BIZ, [doc(serde_json::json!({"bk_biz_id": pool.biz, "default": 1}))]);
        store.seed(
            tables::SET,
            [doc(serde_json::json!({"bk_set_id": pool.set, "bk_biz_id": pool.biz, "default": 1}))],
        );
        store.seed(
            tables::MODULE,
            [doc(serde_json::json!({
                "bk_module_id": pool.module,
                "bk_set_id": pool.set,
                "bk_biz_id": pool.biz,
                "default": 1
            }))],
        );

        let leader = StaticLeadership::new(true);
        let mut settings = SyncSettings::new(name, role);
        settings.page_size = PAGE_SIZE;
        settings.poll_interval = Duration::from_millis(1);
        settings.retry = RetryPolicy::new(3, Duration::from_millis(1), Duration::from_millis(2));

        let shared: Arc<dyn Store> = Arc::new(store.clone());
        let metadata = Arc::new(Metadata::new(role, shared.clone(), inner));
        let peer_inner_ids: HashMap<String, InnerIds> =
            peers.iter().map(|peer| (peer.to_string(), host_pool(peer))).collect();
        let registry = Arc::new(ResourceRegistry::new(LogicDeps {
            env: name.to_string(),
            store: shared.clone(),
            metadata: metadata.clone(),
            rules: Arc::new(rules()),
            peer_inner_ids: Arc::new(peer_inner_ids),
            page_size: PAGE_SIZE,
        }));
        let ctx = SyncContext {
            settings: Arc::new(settings),
            store: shared,
            medium: Arc::new(medium.clone()),
            leadership: Arc::new(leader.clone()),
            lock: Arc::new(KvLock::new(Arc::new(MemoryKv::new()))),
        };

        Self {
            name: name.to_string(),
            store,
            leader,
            ctx,
            registry,
            metadata,
        }
    }

    /// Documents of a collection.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.store.documents(collection)
    }
}

/// A source environment with its full-sync job and change watcher.
pub struct Source {
    /// The deployment.
    pub env: Environment,
    /// Change capture of the local store.
    pub changes: MemoryChangeSource,
    full: SourceFullSync,
    watcher: IncrementalWatcher,
}

impl Source {
    fn new(name: &str, medium: &MemoryMedium) -> Self {
        let env = Environment::new(name, SyncRole::Src, medium, &[]);
        let changes = MemoryChangeSource::new();
        let (full, _trigger) = SourceFullSync::new(env.ctx.clone(), env.registry.clone());
        let source: Arc<dyn ChangeSource> = Arc::new(changes.clone());
        let watcher = IncrementalWatcher::new(env.ctx.clone(), source, env.metadata.clone(), Arc::new(rules()))
            .with_clock(|| 0);
        Self {
            env,
            changes,
            full,
            watcher,
        }
    }

    /// Run one full-sync sweep over every resource.
    pub async fn sweep(&self) -> SweepReport {
        self.full.sweep(None).await
    }

    /// Relay pending changes of every resource. Returns the changes read.
    pub async fn watch(&self) -> Result<usize, SyncError> {
        let mut read = 0;
        for res in ResType::ALL {
            read += self.watcher.watch_once(res).await?;
        }
        Ok(read)
    }

    fn emit(&self, res: ResType, event_type: EventType, collection: &str, oid: &str, detail: Document) {
        match WatchTarget::for_resource(res) {
            WatchTarget::Events { cursor_kind } => {
                self.changes.emit(&cursor_kind, event_type, collection, oid, detail)
            }
            WatchTarget::ChangeFeed { .. } => self.changes.emit_change(event_type, collection, oid, detail),
        }
    }

    /// Create or replace a record and record the change.
    pub async fn write(&self, res: ResType, collection: &str, key: Filter, detail: Document) {
        let oid = oid_of(collection, &key);
        let existing = self.env.store.find_one(collection, &key).await.unwrap_or_default();
        let event_type = if existing.is_some() {
            EventType::Update
        } else {
            EventType::Create
        };
        // harness stores never fail
        let _ = self.env.store.upsert(collection, &key, detail.clone()).await;
        self.emit(res, event_type, collection, &oid, detail);
    }

    /// Delete a record and record the change.
    pub async fn remove(&self, res: ResType, collection: &str, key: Filter) {
        let oid = oid_of(collection, &key);
        let Ok(Some(old)) = self.env.store.find_one(collection, &key).await else {
            return;
        };
        let _ = self.env.store.delete(collection, &key).await;
        self.emit(res, EventType::Delete, collection, &oid, old);
    }

    /// Create or replace a host.
    pub async fn put_host(&self, id: i64, name: &str) {
        let detail = doc(serde_json::json!({"bk_host_id": id, "bk_host_name": name}));
        self.write(ResType::Host, tables::HOST, Filter::eq(tables::BK_HOST_ID, id), detail)
            .await;
    }

    /// Delete a host.
    pub async fn drop_host(&self, id: i64) {
        self.remove(ResType::Host, tables::HOST, Filter::eq(tables::BK_HOST_ID, id))
            .await;
    }
}

fn oid_of(collection: &str, key: &Filter) -> String {
    format!("{}:{:?}", collection, key)
}

/// The destination environment with its full-sync puller and poller.
pub struct Destination {
    /// The deployment.
    pub env: Environment,
    full: DestFullSync,
    poller: IncrementalPoller,
}

impl Destination {
    fn new(medium: &MemoryMedium, peers: &[&str]) -> Self {
        let env = Environment::new(DEST, SyncRole::Dest, medium, peers);
        let full = DestFullSync::new(env.ctx.clone(), env.registry.clone());
        let poller = IncrementalPoller::new(env.ctx.clone(), env.registry.clone());
        Self { env, full, poller }
    }

    /// Apply every queued full-sync window. Returns the windows applied.
    pub async fn pull_full(&mut self) -> usize {
        self.full.poll_once().await
    }

    /// Apply every queued incremental batch. Returns the batches applied.
    pub async fn pull_incremental(&mut self) -> usize {
        self.poller.poll_once().await
    }
}

/// Sources and one destination sharing a transfer medium.
pub struct Topology {
    /// The shared medium.
    pub medium: MemoryMedium,
    /// Source environments, in creation order.
    pub sources: Vec<Source>,
    /// The destination.
    pub dest: Destination,
}

impl Topology {
    /// Create a topology with the named sources.
    pub fn new(sources: &[&str]) -> Self {
        let medium = MemoryMedium::new();
        let dest = Destination::new(&medium, sources);
        let sources = sources.iter().map(|name| Source::new(name, &medium)).collect();
        Self { medium, sources, dest }
    }

    /// The source with the given name.
    pub fn source(&self, name: &str) -> &Source {
        match self.sources.iter().find(|s| s.env.name == name) {
            Some(source) => source,
            None => panic!("no source named {}", name),
        }
    }

    /// Sweep every source, then apply everything at the destination.
    pub async fn full_sync(&mut self) -> usize {
        for source in &self.sources {
            let report = source.sweep().await;
            tracing::debug!("{} sweep: {:?}", source.env.name, report);
        }
        self.dest.pull_full().await
    }

    /// Relay every source's changes, then apply them at the destination.
    pub async fn incremental_sync(&mut self) -> usize {
        for source in &self.sources {
            if let Err(e) = source.watch().await {
                tracing::warn!("{} watch failed: {}", source.env.name, e);
            }
        }
        self.dest.pull_incremental().await
    }
}
