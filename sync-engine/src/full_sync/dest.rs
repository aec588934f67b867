//! Destination side of full sync.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use sync_core::{CompareResult, SweepAction, SweepEvent, SweepState};
use sync_types::{FullSyncBatch, ResType, SyncInterval, SyncRecord};

use super::ApplyOutcome;
use crate::context::SyncContext;
use crate::resource::{ListPage, ResourceKind, ResourceLogic, ResourceRegistry, SyncResource};
use crate::SyncError;

/// Poll loop applying pushed full-sync windows.
pub struct DestFullSync {
    ctx: SyncContext,
    registry: Arc<ResourceRegistry>,
    /// Per queue: the last pulled payload was applied and must be acked.
    acks: HashMap<(ResType, String), bool>,
}

impl DestFullSync {
    /// Create the loop.
    pub fn new(ctx: SyncContext, registry: Arc<ResourceRegistry>) -> Self {
        Self {
            ctx,
            registry,
            acks: HashMap::new(),
        }
    }

    /// Poll forever.
    pub async fn run(mut self) {
        tracing::info!("Destination full sync started");
        loop {
            if self.ctx.is_master() {
                let applied = self.poll_once().await;
                if applied > 0 {
                    tracing::debug!("Applied {} full sync windows", applied);
                    continue;
                }
            }
            tokio::time::sleep(self.ctx.settings.poll_interval).await;
        }
    }

    /// Drain every queue once. Returns the number of payloads handled.
    pub async fn poll_once(&mut self) -> usize {
        let resources: Vec<Arc<dyn SyncResource>> = self.registry.iter(None).cloned().collect();
        let mut handled = 0;
        for resource in resources {
            let subs = match resource.sub_resources().await {
                Ok(subs) => subs,
                Err(e) => {
                    tracing::warn!("Failed to list sub-resources of {}: {}", resource.res_type(), e);
                    continue;
                }
            };
            for sub in subs {
                handled += self.drain(resource.as_ref(), &sub).await;
            }
        }
        handled
    }

    async fn drain(&mut self, resource: &dyn SyncResource, sub_res: &str) -> usize {
        let res = resource.res_type();
        let key = (res, sub_res.to_string());
        let mut handled = 0;

        while self.ctx.is_master() {
            let ack = self.acks.get(&key).copied().unwrap_or(false);
            let response = match self.ctx.medium.pull(res, sub_res, false, ack).await {
                Ok(response) => response,
                Err(e) => {
                    // the ack flag stays set so the next pull retries it
                    tracing::warn!("Failed to pull full sync of {} {:?}: {}", res, sub_res, e);
                    break;
                }
            };
            self.acks.insert(key.clone(), false);
            let Some(payload) = response.payload else {
                break;
            };

            match resource.apply_full_sync(&self.ctx, sub_res, &payload).await {
                Ok(outcome) if outcome.is_done() => {
                    self.acks.insert(key.clone(), true);
                    handled += 1;
                }
                Ok(_) => break,
                Err(e) => {
                    tracing::warn!("Failed to apply full sync of {} {:?}: {}", res, sub_res, e);
                    break;
                }
            }
        }
        handled
    }
}

/// Reconcile local records against one pushed window.
///
/// The local side is paged through `[start, end)` of the window; source
/// records past the end of a local page are carried to the next page.
pub(crate) async fn apply_window<R: ResourceKind>(
    logic: &ResourceLogic<R>,
    ctx: &SyncContext,
    sub_res: &str,
    payload: &[u8],
) -> Result<ApplyOutcome, SyncError> {
    let res = logic.res_type();
    let batch = match FullSyncBatch::<R::Key>::from_bytes(payload) {
        Ok(batch) => batch,
        Err(e) => {
            tracing::warn!("Skipping malformed full sync payload of {} {:?}: {}", res, sub_res, e);
            return Ok(ApplyOutcome::Skipped);
        }
    };
    let FullSyncBatch { env, start, end, data } = batch;
    let mut pending: Vec<SyncRecord<R::Key>> = logic.parse_data_arr(&env, sub_res, data);

    let policy = ctx.settings.retry;
    let (mut state, actions) = SweepState::new().on_event(SweepEvent::Start { from: start }, &policy);
    let mut queue: VecDeque<SweepAction<R::Key>> = actions.into();
    let mut page: Option<ListPage<R::Key>> = None;
    let mut diff: Option<CompareResult<R::Key>> = None;
    let mut stats = (0usize, 0usize);

    while let Some(action) = queue.pop_front() {
        let event = match action {
            SweepAction::List { start } => {
                let window = SyncInterval {
                    start,
                    end: end.clone(),
                };
                match logic.list_data(sub_res, &window, Some(&env)).await {
                    Ok(listed) => {
                        let event = SweepEvent::Listed {
                            is_all: listed.is_all,
                            next_start: listed.next_start.clone(),
                        };
                        page = Some(listed);
                        event
                    }
                    Err(e) => SweepEvent::Failed { error: e.to_string() },
                }
            }
            SweepAction::Compare => match page.take() {
                Some(listed) => {
                    let page_end = (!listed.is_all).then_some(listed.next_start);
                    let mut result = logic.compare_data(std::mem::take(&mut pending), listed.records, page_end.as_ref());
                    pending = std::mem::take(&mut result.remaining_source);
                    diff = Some(result);
                    SweepEvent::Compared
                }
                None => SweepEvent::Failed {
                    error: "no listed page".into(),
                },
            },
            SweepAction::Apply => match &diff {
                Some(result) => match apply_diff(logic, sub_res, result).await {
                    Ok(()) => {
                        stats.0 += result.insert.len();
                        stats.1 += result.delete.len();
                        SweepEvent::Applied
                    }
                    Err(e) => SweepEvent::Failed { error: e.to_string() },
                },
                None => SweepEvent::Failed {
                    error: "nothing compared".into(),
                },
            },
            SweepAction::Sleep { delay } => {
                tokio::time::sleep(delay).await;
                continue;
            }
            // the medium ack is the checkpoint of a window
            SweepAction::Checkpoint { .. } => continue,
            SweepAction::Complete => {
                tracing::debug!(
                    "Applied {} window from {}: {} inserted, {} deleted",
                    res,
                    env,
                    stats.0,
                    stats.1
                );
                return Ok(ApplyOutcome::Applied);
            }
            SweepAction::Abandon { resume_from, error } => {
                tracing::warn!(
                    "Abandoning {} window from {} at {:?}: {}",
                    res,
                    env,
                    resume_from,
                    error
                );
                return Ok(ApplyOutcome::Abandoned);
            }
        };

        let (next, actions) = state.on_event(event, &policy);
        state = next;
        queue.extend(actions);
    }

    Ok(ApplyOutcome::Applied)
}

async fn apply_diff<R: ResourceKind>(
    logic: &ResourceLogic<R>,
    sub_res: &str,
    result: &CompareResult<R::Key>,
) -> Result<(), SyncError> {
    let deletes: Vec<R::Key> = result.delete.iter().map(|r| r.key.clone()).collect();
    logic.delete_data(sub_res, &deletes).await?;
    logic.update_data(sub_res, &result.update).await?;
    logic.insert_data(sub_res, &result.insert).await?;
    Ok(())
}
