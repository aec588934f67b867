//! Source side of full sync.

use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use sync_core::{SweepAction, SweepEvent, SweepState};
use sync_types::{FullSyncBatch, ResType, SortKey, SyncInterval};
use tokio::sync::mpsc;

use super::{FullSyncTrigger, SweepOutcome};
use crate::context::{SyncContext, FULL_SYNC_LOCK_KEY};
use crate::resource::{ListPage, ResourceKind, ResourceLogic, ResourceRegistry, SyncResource};
use crate::token::SweepCursorStore;
use crate::SyncError;

/// Counts of one sweep across resources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// The sweep did not run (not master, or lock held elsewhere).
    pub skipped: bool,
    /// Sub-resources pushed completely.
    pub completed: usize,
    /// Sub-resources abandoned after retries.
    pub abandoned: usize,
    /// Leadership was lost during the sweep.
    pub interrupted: bool,
}

impl SweepReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Periodic full-sync job of a source environment.
pub struct SourceFullSync {
    ctx: SyncContext,
    registry: Arc<ResourceRegistry>,
    cursors: SweepCursorStore,
    requests: mpsc::Receiver<Option<Vec<ResType>>>,
}

impl SourceFullSync {
    /// Create the job and the handle that triggers it on demand.
    pub fn new(ctx: SyncContext, registry: Arc<ResourceRegistry>) -> (Self, FullSyncTrigger) {
        let (trigger, requests) = FullSyncTrigger::channel();
        let cursors = SweepCursorStore::new(ctx.store.clone());
        let job = Self {
            ctx,
            registry,
            cursors,
            requests,
        };
        (job, trigger)
    }

    /// Sweep on every tick of the configured interval and on every trigger.
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.ctx.settings.full_sync_interval);
        let mut triggers_open = true;
        tracing::info!(
            "Source full sync started (every {:?})",
            self.ctx.settings.full_sync_interval
        );

        loop {
            let only = tokio::select! {
                _ = ticker.tick() => None,
                request = self.requests.recv(), if triggers_open => match request {
                    Some(only) => only,
                    None => {
                        triggers_open = false;
                        continue;
                    }
                },
            };
            let report = self.sweep(only.as_deref()).await;
            tracing::debug!("Full sync sweep finished: {:?}", report);
        }
    }

    /// Run one sweep over all resources, or only over `only`.
    pub async fn sweep(&self, only: Option<&[ResType]>) -> SweepReport {
        if !self.ctx.is_master() {
            tracing::debug!("Not master, skipping full sync");
            return SweepReport::skipped();
        }
        match self.ctx.lock.lock(FULL_SYNC_LOCK_KEY, self.ctx.settings.lock_ttl).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Full sync lock held elsewhere, skipping");
                return SweepReport::skipped();
            }
            Err(e) => {
                tracing::warn!("Failed to take full sync lock: {}", e);
                return SweepReport::skipped();
            }
        }

        tracing::info!("Full sync sweep started");
        let mut report = SweepReport::default();
        'resources: for resource in self.registry.iter(only) {
            let res = resource.res_type();
            let subs = match resource.sub_resources().await {
                Ok(subs) => subs,
                Err(e) => {
                    tracing::warn!("Failed to list sub-resources of {}: {}", res, e);
                    report.abandoned += 1;
                    continue;
                }
            };
            for sub in subs {
                if !self.ctx.is_master() {
                    report.interrupted = true;
                    break 'resources;
                }
                match resource.push_full_sync(&self.ctx, &self.cursors, &sub).await {
                    Ok(SweepOutcome::Completed) => report.completed += 1,
                    Ok(SweepOutcome::Abandoned) => report.abandoned += 1,
                    Ok(SweepOutcome::Interrupted) => {
                        report.interrupted = true;
                        break 'resources;
                    }
                    Err(e) => {
                        tracing::warn!("Full sync of {} {:?} failed: {}", res, sub, e);
                        report.abandoned += 1;
                    }
                }
            }
        }

        if let Err(e) = self.ctx.lock.unlock().await {
            tracing::warn!("Failed to release full sync lock: {}", e);
        }
        tracing::info!(
            "Full sync sweep done: {} completed, {} abandoned",
            report.completed,
            report.abandoned
        );
        report
    }
}

async fn resume_point<K: SortKey>(cursors: &SweepCursorStore, res: ResType, sub_res: &str) -> K {
    match cursors.get(res, sub_res).await {
        Ok(Some(value)) => serde_json::from_value(value).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable full sync cursor of {}: {}", res, e);
            K::min_key()
        }),
        Ok(None) => K::min_key(),
        Err(e) => {
            tracing::warn!("Failed to read full sync cursor of {}: {}", res, e);
            K::min_key()
        }
    }
}

async fn save_cursor<K: SortKey>(cursors: &SweepCursorStore, res: ResType, sub_res: &str, next: &K) {
    let value = match serde_json::to_value(next) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Failed to encode full sync cursor of {}: {}", res, e);
            return;
        }
    };
    if let Err(e) = cursors.set(res, sub_res, value).await {
        tracing::warn!("Failed to save full sync cursor of {}: {}", res, e);
    }
}

/// Page through one sub-resource from its saved cursor and push every page.
pub(crate) async fn push_sweep<R: ResourceKind>(
    logic: &ResourceLogic<R>,
    ctx: &SyncContext,
    cursors: &SweepCursorStore,
    sub_res: &str,
) -> Result<SweepOutcome, SyncError> {
    let res = logic.res_type();
    let policy = ctx.settings.retry;
    let from: R::Key = resume_point(cursors, res, sub_res).await;

    let (mut state, actions) = SweepState::new().on_event(SweepEvent::Start { from }, &policy);
    let mut queue: VecDeque<SweepAction<R::Key>> = actions.into();
    let mut page: Option<(R::Key, ListPage<R::Key>)> = None;
    let mut payload: Option<Vec<u8>> = None;
    let mut pushed = 0usize;

    while let Some(action) = queue.pop_front() {
        let event = match action {
            SweepAction::List { start } => {
                if !ctx.is_master() {
                    tracing::info!("Lost leadership during full sync of {}", res);
                    return Ok(SweepOutcome::Interrupted);
                }
                match logic.list_data(sub_res, &SyncInterval::open(start.clone()), None).await {
                    Ok(listed) => {
                        let event = SweepEvent::Listed {
                            is_all: listed.is_all,
                            next_start: listed.next_start.clone(),
                        };
                        page = Some((start, listed));
                        event
                    }
                    Err(e) => SweepEvent::Failed { error: e.to_string() },
                }
            }
            SweepAction::Compare => match &page {
                Some((start, listed)) => {
                    let batch = FullSyncBatch {
                        env: ctx.env().to_string(),
                        start: start.clone(),
                        end: (!listed.is_all).then(|| listed.next_start.clone()),
                        data: listed
                            .records
                            .iter()
                            .map(|r| Value::Object(r.data.clone()))
                            .collect(),
                    };
                    match batch.to_bytes() {
                        Ok(bytes) => {
                            payload = Some(bytes);
                            SweepEvent::Compared
                        }
                        Err(e) => SweepEvent::Failed { error: e.to_string() },
                    }
                }
                None => SweepEvent::Failed {
                    error: "no listed page".into(),
                },
            },
            SweepAction::Apply => match &payload {
                Some(bytes) => match ctx.medium.push(res, sub_res, false, bytes.clone()).await {
                    Ok(()) => {
                        pushed += 1;
                        SweepEvent::Applied
                    }
                    Err(e) => SweepEvent::Failed { error: e.to_string() },
                },
                None => SweepEvent::Failed {
                    error: "no assembled batch".into(),
                },
            },
            SweepAction::Sleep { delay } => {
                tokio::time::sleep(delay).await;
                continue;
            }
            SweepAction::Checkpoint { next } => {
                save_cursor(cursors, res, sub_res, &next).await;
                continue;
            }
            SweepAction::Complete => {
                if let Err(e) = cursors.clear(res, sub_res).await {
                    tracing::warn!("Failed to clear full sync cursor of {}: {}", res, e);
                }
                tracing::info!("Pushed {} full sync pages of {} {:?}", pushed, res, sub_res);
                return Ok(SweepOutcome::Completed);
            }
            SweepAction::Abandon { resume_from, error } => {
                tracing::warn!(
                    "Abandoning full sync of {} {:?} at {:?}: {}",
                    res,
                    sub_res,
                    resume_from,
                    error
                );
                save_cursor(cursors, res, sub_res, &resume_from).await;
                return Ok(SweepOutcome::Abandoned);
            }
        };

        let (next, actions) = state.on_event(event, &policy);
        state = next;
        queue.extend(actions);
    }

    Ok(SweepOutcome::Completed)
}
