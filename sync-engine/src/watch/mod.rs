//! Change capture.
//!
//! Two strategies feed the incremental watcher:
//!
//! - a resumable domain event stream, addressed by a cursor and one cursor
//!   kind per resource
//! - the storage engine's native change feed, selected by a collection-name
//!   pattern
//!
//! Both are served by one [`ChangeSource`] and yield [`ChangeEvent`]s.

mod memory;

pub use memory::MemoryChangeSource;

use async_trait::async_trait;
use sync_types::{Document, EventType, ResType};
use thiserror::Error;

/// Change capture errors.
#[derive(Debug, Error)]
pub enum WatchError {
    /// The cursor is no longer known to the source.
    #[error("cursor expired: {0}")]
    CursorExpired(String),

    /// The source could not be reached.
    #[error("change source unavailable: {0}")]
    Unavailable(String),
}

/// What to watch for one resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WatchTarget {
    /// Domain event stream of one cursor kind.
    Events {
        /// Cursor kind, e.g. `host`.
        cursor_kind: String,
    },
    /// Native change feed of every collection matching a pattern.
    ChangeFeed {
        /// Regular expression over collection names.
        pattern: String,
    },
}

impl WatchTarget {
    /// Target used for a resource kind.
    pub fn for_resource(res_type: ResType) -> Self {
        match res_type {
            ResType::ServiceInstance => WatchTarget::ChangeFeed {
                pattern: "^cc_ServiceInstance$".to_string(),
            },
            ResType::QuotedInstance => WatchTarget::ChangeFeed {
                pattern: "^cc_QuotedInst_".to_string(),
            },
            other => WatchTarget::Events {
                cursor_kind: other.as_str().to_string(),
            },
        }
    }

    /// Key under which the watch token stores this target's cursor.
    pub fn cursor_key(&self) -> &str {
        match self {
            WatchTarget::Events { cursor_kind } => cursor_kind,
            WatchTarget::ChangeFeed { pattern } => pattern,
        }
    }
}

/// A raw change observed by a [`ChangeSource`].
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Resume position right after this event.
    pub cursor: String,
    /// Kind of change.
    pub event_type: EventType,
    /// Collection the changed document lives in.
    pub collection: String,
    /// Object id of the changed document.
    pub oid: String,
    /// The document (after the change, before it for deletes).
    pub detail: Document,
}

/// Source of change events.
#[async_trait]
pub trait ChangeSource: Send + Sync {
    /// Fetch up to `limit` events after `cursor`, or from `start_at` (unix
    /// seconds) when no cursor is known.
    async fn watch(
        &self,
        target: &WatchTarget,
        cursor: Option<&str>,
        start_at: i64,
        limit: usize,
    ) -> Result<Vec<ChangeEvent>, WatchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feed_resources_use_patterns() {
        assert_eq!(
            WatchTarget::for_resource(ResType::QuotedInstance),
            WatchTarget::ChangeFeed {
                pattern: "^cc_QuotedInst_".into()
            }
        );
        assert_eq!(
            WatchTarget::for_resource(ResType::Host).cursor_key(),
            "host"
        );
    }
}
