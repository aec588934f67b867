//! Settings and collaborators shared by every sync loop.

use std::sync::Arc;
use std::time::Duration;
use sync_core::RetryPolicy;
use sync_types::SyncRole;

use crate::leader::Leadership;
use crate::lock::DistributedLock;
use crate::medium::TransferMedium;
use crate::store::Store;

/// Key of the cluster lock guarding full-sync sweeps.
pub const FULL_SYNC_LOCK_KEY: &str = "cmdb_sync:full_sync";

/// Tunables of the sync loops.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Name of the local environment.
    pub env: String,
    /// Role of the local environment.
    pub role: SyncRole,
    /// Records per listed page.
    pub page_size: usize,
    /// Time between two scheduled full-sync sweeps.
    pub full_sync_interval: Duration,
    /// TTL of the full-sync cluster lock.
    pub lock_ttl: Duration,
    /// Pause between polls when there is nothing to do.
    pub poll_interval: Duration,
    /// Maximum events fetched per watch cycle.
    pub watch_batch_size: usize,
    /// Retry policy of single steps.
    pub retry: RetryPolicy,
}

impl SyncSettings {
    /// Settings with defaults for the given environment and role.
    pub fn new(env: impl Into<String>, role: SyncRole) -> Self {
        Self {
            env: env.into(),
            role,
            page_size: 500,
            full_sync_interval: Duration::from_secs(86400),
            lock_ttl: Duration::from_secs(3600),
            poll_interval: Duration::from_millis(1000),
            watch_batch_size: 200,
            retry: RetryPolicy::default(),
        }
    }
}

/// Collaborators of the sync loops.
#[derive(Clone)]
pub struct SyncContext {
    /// Loop settings.
    pub settings: Arc<SyncSettings>,
    /// Local persistent store.
    pub store: Arc<dyn Store>,
    /// Transfer medium client.
    pub medium: Arc<dyn TransferMedium>,
    /// Leadership flag.
    pub leadership: Arc<dyn Leadership>,
    /// Cluster lock.
    pub lock: Arc<dyn DistributedLock>,
}

impl SyncContext {
    /// Whether this replica currently leads.
    pub fn is_master(&self) -> bool {
        self.leadership.is_master()
    }

    /// Name of the local environment.
    pub fn env(&self) -> &str {
        &self.settings.env
    }
}
