//! In-memory change source for testing.

use super::{ChangeEvent, ChangeSource, WatchError, WatchTarget};
use async_trait::async_trait;
use regex::Regex;
use std::sync::{Arc, Mutex, MutexGuard};
use sync_types::{Document, EventType};

#[derive(Debug, Clone)]
struct Recorded {
    seq: u64,
    at: i64,
    stream: Stream,
    event_type: EventType,
    collection: String,
    oid: String,
    detail: Document,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Stream {
    Events(String),
    Feed,
}

/// In-memory [`ChangeSource`].
///
/// Events are numbered in emission order; the cursor of an event is its
/// sequence number. Events older than the retention horizon set with
/// [`expire_before`](Self::expire_before) are forgotten, and cursors
/// pointing at them are rejected as expired.
#[derive(Debug, Default, Clone)]
pub struct MemoryChangeSource {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    events: Vec<Recorded>,
    next_seq: u64,
    horizon: u64,
    fail_next: Option<String>,
}

impl MemoryChangeSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, at: i64, stream: Stream, event_type: EventType, collection: &str, oid: &str, detail: Document) {
        let mut inner = self.lock();
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.events.push(Recorded {
            seq,
            at,
            stream,
            event_type,
            collection: collection.to_string(),
            oid: oid.to_string(),
            detail,
        });
    }

    /// Emit a domain event of one cursor kind, stamped at time 0.
    pub fn emit(&self, cursor_kind: &str, event_type: EventType, collection: &str, oid: &str, detail: Document) {
        self.emit_at(0, cursor_kind, event_type, collection, oid, detail);
    }

    /// Emit a domain event stamped at unix time `at`.
    pub fn emit_at(
        &self,
        at: i64,
        cursor_kind: &str,
        event_type: EventType,
        collection: &str,
        oid: &str,
        detail: Document,
    ) {
        self.record(at, Stream::Events(cursor_kind.to_string()), event_type, collection, oid, detail);
    }

    /// Emit a change-feed event on a collection, stamped at time 0.
    pub fn emit_change(&self, event_type: EventType, collection: &str, oid: &str, detail: Document) {
        self.record(0, Stream::Feed, event_type, collection, oid, detail);
    }

    /// Sequence number of the last emitted event.
    pub fn last_seq(&self) -> u64 {
        self.lock().next_seq
    }

    /// Forget events with sequence number `<= seq`.
    pub fn expire_before(&self, seq: u64) {
        let mut inner = self.lock();
        inner.horizon = inner.horizon.max(seq);
        inner.events.retain(|e| e.seq > seq);
    }

    /// Cause the next watch to fail with the given error.
    pub fn fail_next(&self, error: &str) {
        self.lock().fail_next = Some(error.to_string());
    }
}

#[async_trait]
impl ChangeSource for MemoryChangeSource {
    async fn watch(
        &self,
        target: &WatchTarget,
        cursor: Option<&str>,
        start_at: i64,
        limit: usize,
    ) -> Result<Vec<ChangeEvent>, WatchError> {
        let pattern = match target {
            WatchTarget::ChangeFeed { pattern } => {
                Some(Regex::new(pattern).map_err(|e| WatchError::Unavailable(e.to_string()))?)
            }
            WatchTarget::Events { .. } => None,
        };

        let mut inner = self.lock();
        if let Some(error) = inner.fail_next.take() {
            return Err(WatchError::Unavailable(error));
        }

        let after = match cursor {
            Some(cursor) => {
                let seq: u64 = cursor
                    .parse()
                    .map_err(|_| WatchError::CursorExpired(cursor.to_string()))?;
                if seq < inner.horizon {
                    return Err(WatchError::CursorExpired(cursor.to_string()));
                }
                Some(seq)
            }
            None => None,
        };

        let selected = inner
            .events
            .iter()
            .filter(|e| match after {
                Some(seq) => e.seq > seq,
                None => e.at >= start_at,
            })
            .filter(|e| match (target, &e.stream, &pattern) {
                (WatchTarget::Events { cursor_kind }, Stream::Events(kind), _) => kind == cursor_kind,
                (WatchTarget::ChangeFeed { .. }, Stream::Feed, Some(re)) => re.is_match(&e.collection),
                _ => false,
            })
            .take(limit)
            .map(|e| ChangeEvent {
                cursor: e.seq.to_string(),
                event_type: e.event_type,
                collection: e.collection.clone(),
                oid: e.oid.clone(),
                detail: e.detail.clone(),
            })
            .collect();
        Ok(selected)
    }
}
