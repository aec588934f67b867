//! Change-capture events and watch checkpoints.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{Document, ResType};

/// Kind of change observed on a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Record was created.
    Create,
    /// Record was modified.
    Update,
    /// Record was removed.
    Delete,
}

/// A change event normalized from either change-capture strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Kind of change.
    pub event_type: EventType,
    /// Resource kind the changed record belongs to.
    pub res_type: ResType,
    /// Identifier of the changed object, unique per resource kind.
    pub oid: String,
    /// Sub-resources the record belongs to (object ids); empty if none.
    #[serde(default)]
    pub sub_res: Vec<String>,
    /// Full document after the change (before it, for deletes).
    pub detail: Document,
}

impl EventInfo {
    /// Create an event without sub-resources.
    pub fn new(event_type: EventType, res_type: ResType, oid: impl Into<String>, detail: Document) -> Self {
        Self {
            event_type,
            res_type,
            oid: oid.into(),
            sub_res: Vec::new(),
            detail,
        }
    }

    /// The sub-resource the event is grouped under (empty string if none).
    pub fn primary_sub_res(&self) -> &str {
        self.sub_res.first().map(String::as_str).unwrap_or("")
    }
}

/// Durable checkpoint of one resource's change capture.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WatchToken {
    /// Last fully relayed cursor per cursor kind.
    #[serde(default)]
    pub cursors: BTreeMap<String, String>,
    /// Unix seconds to start watching from when no cursor is known.
    #[serde(default)]
    pub start_at: i64,
}

impl WatchToken {
    /// A fresh token starting at the given unix time.
    pub fn starting_at(start_at: i64) -> Self {
        Self {
            cursors: BTreeMap::new(),
            start_at,
        }
    }

    /// Cursor for one cursor kind, if any.
    pub fn cursor(&self, kind: &str) -> Option<&str> {
        self.cursors.get(kind).map(String::as_str).filter(|c| !c.is_empty())
    }
}
