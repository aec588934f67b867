//! Destination-side incremental poller.

use std::collections::HashMap;
use std::sync::Arc;
use sync_types::{IncrementalBatch, ResType};

use crate::context::SyncContext;
use crate::full_sync::ApplyOutcome;
use crate::resource::{ResourceKind, ResourceLogic, ResourceRegistry, SyncResource};
use crate::retry::with_retry;
use crate::SyncError;

/// Applies incremental batches pulled from the medium.
pub struct IncrementalPoller {
    ctx: SyncContext,
    registry: Arc<ResourceRegistry>,
    acks: HashMap<ResType, bool>,
}

impl IncrementalPoller {
    /// Create the poller.
    pub fn new(ctx: SyncContext, registry: Arc<ResourceRegistry>) -> Self {
        Self {
            ctx,
            registry,
            acks: HashMap::new(),
        }
    }

    /// Poll forever.
    pub async fn run(mut self) {
        tracing::info!("Incremental poller started");
        loop {
            if self.ctx.is_master() && self.poll_once().await > 0 {
                continue;
            }
            tokio::time::sleep(self.ctx.settings.poll_interval).await;
        }
    }

    /// Drain every resource queue once. Returns the number of batches applied.
    pub async fn poll_once(&mut self) -> usize {
        let resources: Vec<Arc<dyn SyncResource>> = self.registry.iter(None).cloned().collect();
        let mut applied = 0;
        for resource in resources {
            applied += self.drain(resource.as_ref()).await;
        }
        applied
    }

    async fn drain(&mut self, resource: &dyn SyncResource) -> usize {
        let res = resource.res_type();
        let mut applied = 0;

        while self.ctx.is_master() {
            let ack = self.acks.get(&res).copied().unwrap_or(false);
            let response = match self.ctx.medium.pull(res, "", true, ack).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::warn!("Failed to pull incremental changes of {}: {}", res, e);
                    break;
                }
            };
            self.acks.insert(res, false);
            let Some(payload) = response.payload else {
                break;
            };

            let batch = match IncrementalBatch::from_bytes(&payload) {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!("Skipping malformed incremental payload of {}: {}", res, e);
                    self.acks.insert(res, true);
                    continue;
                }
            };
            match resource.apply_incremental(&self.ctx, batch).await {
                Ok(outcome) if outcome.is_done() => {
                    self.acks.insert(res, true);
                    applied += 1;
                }
                Ok(_) => break,
                Err(e) => {
                    tracing::warn!("Failed to apply incremental changes of {}: {}", res, e);
                    break;
                }
            }
        }
        applied
    }
}

/// Apply one incremental batch: all deletes, then the upserts.
pub(crate) async fn apply_batch<R: ResourceKind>(
    logic: &ResourceLogic<R>,
    ctx: &SyncContext,
    batch: IncrementalBatch,
) -> Result<ApplyOutcome, SyncError> {
    let policy = &ctx.settings.retry;
    let IncrementalBatch { env, upsert, delete } = batch;

    for (sub_res, raw) in delete {
        let keys: Vec<R::Key> = logic
            .parse_data_arr(&env, &sub_res, raw)
            .into_iter()
            .map(|r| r.key)
            .collect();
        let (sub_res, keys) = (sub_res.as_str(), &keys);
        with_retry(policy, "incremental delete", move || logic.delete_data(sub_res, keys)).await?;
    }

    for (sub_res, raw) in upsert {
        let records = logic.parse_data_arr(&env, &sub_res, raw);
        let (sub_res, records) = (sub_res.as_str(), &records);
        let (insert, update) = with_retry(policy, "incremental classify", move || {
            logic.classify_upsert_data(sub_res, records.clone())
        })
        .await?;
        let (insert, update) = (&insert, &update);
        with_retry(policy, "incremental insert", move || logic.insert_data(sub_res, insert)).await?;
        with_retry(policy, "incremental update", move || logic.update_data(sub_res, update)).await?;
    }

    Ok(ApplyOutcome::Applied)
}
