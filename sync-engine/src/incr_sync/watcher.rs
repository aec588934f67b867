//! Source-side change watcher.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use sync_core::{collapse_events, group_events, IdRuleSet};
use sync_types::{EventInfo, ResType};

use crate::context::SyncContext;
use crate::metadata::Metadata;
use crate::resource::{record_ids, sub_res_from_collection};
use crate::retry::with_retry;
use crate::token::TokenStore;
use crate::watch::{ChangeSource, WatchError, WatchTarget};
use crate::SyncError;

/// Current unix time in seconds.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Watches local changes and relays them to the medium.
pub struct IncrementalWatcher {
    ctx: SyncContext,
    source: Arc<dyn ChangeSource>,
    metadata: Arc<Metadata>,
    rules: Arc<IdRuleSet>,
    tokens: TokenStore,
    clock: fn() -> i64,
}

impl IncrementalWatcher {
    /// Create a watcher using the wall clock.
    pub fn new(
        ctx: SyncContext,
        source: Arc<dyn ChangeSource>,
        metadata: Arc<Metadata>,
        rules: Arc<IdRuleSet>,
    ) -> Self {
        let tokens = TokenStore::new(ctx.store.clone());
        Self {
            ctx,
            source,
            metadata,
            rules,
            tokens,
            clock: unix_now,
        }
    }

    /// Replace the clock used for fresh watch tokens.
    pub fn with_clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Watch one resource forever.
    pub async fn run(self: Arc<Self>, res_type: ResType) {
        tracing::info!("Incremental watcher started for {}", res_type);
        loop {
            match self.watch_once(res_type).await {
                Ok(0) => tokio::time::sleep(self.ctx.settings.poll_interval).await,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Incremental watch of {} failed: {}", res_type, e);
                    tokio::time::sleep(self.ctx.settings.poll_interval).await;
                }
            }
        }
    }

    fn is_owned(&self, event: &EventInfo) -> bool {
        match record_ids(event.res_type, &event.detail) {
            Some(ids) => self.rules.matches(self.ctx.env(), event.res_type, &ids),
            None => false,
        }
    }

    /// Relay one batch of changes of a resource.
    ///
    /// Returns the number of changes read. The token is advanced only after
    /// every batch was pushed, and only while this replica still leads.
    pub async fn watch_once(&self, res_type: ResType) -> Result<usize, SyncError> {
        if !self.ctx.is_master() {
            return Ok(0);
        }

        let target = WatchTarget::for_resource(res_type);
        let mut token = self.tokens.load_or_init(res_type, (self.clock)()).await?;
        let cursor = token.cursor(target.cursor_key()).map(str::to_string);
        let changes = match self
            .source
            .watch(
                &target,
                cursor.as_deref(),
                token.start_at,
                self.ctx.settings.watch_batch_size,
            )
            .await
        {
            Ok(changes) => changes,
            Err(WatchError::CursorExpired(e)) => {
                let now = (self.clock)();
                tracing::warn!("Watch cursor of {} expired ({}), restarting at {}", res_type, e, now);
                self.tokens.reset(res_type, now).await?;
                return Ok(0);
            }
            Err(e) => return Err(e.into()),
        };
        let Some(last_cursor) = changes.last().map(|c| c.cursor.clone()) else {
            return Ok(0);
        };
        let read = changes.len();

        let mut events = Vec::with_capacity(read);
        for change in changes {
            let mut event = EventInfo::new(change.event_type, res_type, change.oid, change.detail);
            if let Some(sub_res) = sub_res_from_collection(res_type, &change.collection) {
                event.sub_res = vec![sub_res];
            }
            let Some(event) = self.metadata.parse_event_detail(event).await else {
                continue;
            };
            if !self.is_owned(&event) {
                tracing::debug!("Ignoring {} event {} not owned by {}", event.res_type, event.oid, self.ctx.env());
                continue;
            }
            events.push(event);
        }

        let batches = group_events(self.ctx.env(), collapse_events(events));
        for (batch_res, batch) in batches {
            if batch.is_empty() {
                continue;
            }
            let count = batch.len();
            let payload = batch.to_bytes()?;
            let medium = &self.ctx.medium;
            let payload = &payload;
            with_retry(&self.ctx.settings.retry, "incremental push", move || async move {
                medium
                    .push(batch_res, "", true, payload.clone())
                    .await
                    .map_err(SyncError::from)
            })
            .await?;
            tracing::debug!("Pushed {} incremental changes of {}", count, batch_res);
        }

        if !self.ctx.is_master() {
            tracing::info!("Lost leadership while watching {}, keeping old token", res_type);
            return Ok(read);
        }
        token.cursors.insert(target.cursor_key().to_string(), last_cursor);
        self.tokens.advance(res_type, &token).await?;
        Ok(read)
    }
}
