//! Service assembly: capability gate, loop spawning and the full-sync trigger.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use sync_engine::{
    tables, ChangeSource, DestFullSync, DistributedLock, Filter, FullSyncTrigger, IncrementalPoller,
    IncrementalWatcher, Leadership, LogicDeps, Metadata, ResourceRegistry, SourceFullSync, Store, SyncContext,
    TransferMedium,
};
use sync_medium::SqliteMedium;
use sync_types::{ResType, SyncRole};
use tokio::task::JoinHandle;

use crate::config::{Config, MediumConfig};
use crate::error::{Result, ServiceError};

/// External systems the service runs against.
#[derive(Clone)]
pub struct Collaborators {
    /// Local configuration database.
    pub store: Arc<dyn Store>,
    /// Transfer medium client.
    pub medium: Arc<dyn TransferMedium>,
    /// Leadership discovery.
    pub leadership: Arc<dyn Leadership>,
    /// Cluster lock.
    pub lock: Arc<dyn DistributedLock>,
    /// Change capture, only used by a source.
    pub change_source: Arc<dyn ChangeSource>,
}

/// Whether the service runs its loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    /// Loops are running.
    Running,
    /// Startup found the environment unfit for sync; no loop was started.
    Disabled {
        /// Why the loops were not started.
        reason: String,
    },
}

/// A running (or soft-disabled) transfer service.
pub struct TransferService {
    role: SyncRole,
    state: ServiceState,
    trigger: Option<FullSyncTrigger>,
    tasks: Vec<JoinHandle<()>>,
}

/// Open the SQLite transfer medium described by the configuration.
pub async fn open_medium(config: &MediumConfig) -> Result<SqliteMedium> {
    let ttl = Duration::from_secs(config.payload_ttl_secs);
    Ok(SqliteMedium::new(&config.database, ttl).await?)
}

/// Whether the platform setting allows externally assigned ids.
///
/// A destination writes records under the ids chosen by the source, which
/// requires the id generator to be enabled.
pub async fn id_generator_enabled(store: &dyn Store) -> Result<bool> {
    let setting = store
        .find_one(tables::SYSTEM, &Filter::eq("_id", tables::PLATFORM_SETTING_ID))
        .await
        .map_err(sync_engine::SyncError::from)?;
    let enabled = setting
        .as_ref()
        .and_then(|doc| doc.get("id_generator"))
        .and_then(|generator| generator.get("enabled"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Ok(enabled)
}

impl TransferService {
    /// Validate the configuration and start the loops of the local role.
    pub async fn start(config: &Config, deps: Collaborators) -> Result<Self> {
        config.validate()?;
        let settings = config.settings();
        let role = settings.role;
        tracing::info!("Starting transfer service for {} ({})", settings.env, role);

        if role == SyncRole::Dest && !id_generator_enabled(deps.store.as_ref()).await? {
            let reason = "id generator is not enabled in the platform setting".to_string();
            tracing::warn!("Transfer service disabled: {}", reason);
            return Ok(Self {
                role,
                state: ServiceState::Disabled { reason },
                trigger: None,
                tasks: Vec::new(),
            });
        }

        let rules = Arc::new(config.rule_set()?);
        let metadata = Arc::new(Metadata::load(role, deps.store.clone()).await?);
        let ctx = SyncContext {
            settings: Arc::new(settings),
            store: deps.store.clone(),
            medium: deps.medium,
            leadership: deps.leadership,
            lock: deps.lock,
        };
        let registry = Arc::new(ResourceRegistry::new(LogicDeps {
            env: ctx.env().to_string(),
            store: deps.store,
            metadata: metadata.clone(),
            rules: rules.clone(),
            peer_inner_ids: Arc::new(config.inner_ids.clone()),
            page_size: ctx.settings.page_size,
        }));

        let mut tasks = Vec::new();
        let mut trigger = None;
        match role {
            SyncRole::Src => {
                if config.sync.enable_full_sync {
                    let (job, handle) = SourceFullSync::new(ctx.clone(), registry.clone());
                    tasks.push(tokio::spawn(job.run()));
                    trigger = Some(handle);
                }
                if config.sync.enable_incr_sync {
                    let watcher = Arc::new(IncrementalWatcher::new(ctx.clone(), deps.change_source, metadata, rules));
                    for res in ResType::ALL {
                        tasks.push(tokio::spawn(watcher.clone().run(res)));
                    }
                }
            }
            SyncRole::Dest => {
                if config.sync.enable_full_sync {
                    tasks.push(tokio::spawn(DestFullSync::new(ctx.clone(), registry.clone()).run()));
                }
                if config.sync.enable_incr_sync {
                    tasks.push(tokio::spawn(IncrementalPoller::new(ctx.clone(), registry).run()));
                }
            }
        }
        tracing::info!("Transfer service running {} loops", tasks.len());

        Ok(Self {
            role,
            state: ServiceState::Running,
            trigger,
            tasks,
        })
    }

    /// Current state.
    pub fn state(&self) -> &ServiceState {
        &self.state
    }

    /// Whether startup soft-disabled the service.
    pub fn is_disabled(&self) -> bool {
        matches!(self.state, ServiceState::Disabled { .. })
    }

    /// Start a full sync now, for every resource or only the given ones.
    ///
    /// Only a source pushes full-sync data; on a destination this fails.
    pub fn trigger_full_sync(&self, resources: Option<Vec<ResType>>) -> Result<()> {
        if self.role != SyncRole::Src {
            return Err(ServiceError::WrongRole {
                operation: "full sync trigger",
                role: self.role,
            });
        }
        if let ServiceState::Disabled { reason } = &self.state {
            return Err(ServiceError::Disabled { reason: reason.clone() });
        }
        let Some(trigger) = &self.trigger else {
            return Err(ServiceError::Disabled {
                reason: "full sync is turned off".to_string(),
            });
        };
        trigger.trigger(resources)?;
        Ok(())
    }

    /// Stop every loop.
    pub fn shutdown(self) {
        tracing::info!("Stopping {} transfer service loops", self.tasks.len());
        for task in self.tasks {
            task.abort();
        }
    }
}
