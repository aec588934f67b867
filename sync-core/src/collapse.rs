//! Event collapsing and grouping for incremental propagation.
//!
//! Within one watch cycle only the final state of each object matters.
//! Events are folded per `(resource, oid)`:
//!
//! | earlier | later  | result |
//! |---------|--------|--------|
//! | create  | update | create (latest detail) |
//! | create  | delete | nothing |
//! | update  | update | update (latest detail) |
//! | update  | delete | delete |
//! | delete  | create | update (latest detail) |
//! | delete  | update | update (latest detail) |
//!
//! The position of an object in the output is the position of its first
//! event in the input.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use sync_types::{EventInfo, EventType, IncrementalBatch, ResType};

fn fold(earlier: EventType, later: EventType) -> Option<EventType> {
    use EventType::*;
    match (earlier, later) {
        (Create, Delete) => None,
        (Create, _) => Some(Create),
        (_, Delete) => Some(Delete),
        (Delete, _) => Some(Update),
        (Update, _) => Some(Update),
    }
}

/// Collapse events so that each object appears at most once.
pub fn collapse_events(events: Vec<EventInfo>) -> Vec<EventInfo> {
    let mut slots: Vec<Option<EventInfo>> = Vec::with_capacity(events.len());
    let mut index: HashMap<(ResType, String), usize> = HashMap::new();

    for event in events {
        let id = (event.res_type, event.oid.clone());
        let Some(&pos) = index.get(&id) else {
            index.insert(id, slots.len());
            slots.push(Some(event));
            continue;
        };

        slots[pos] = match slots[pos].take() {
            None => Some(event),
            Some(prev) => fold(prev.event_type, event.event_type).map(|event_type| EventInfo {
                event_type,
                ..event
            }),
        };
    }

    slots.into_iter().flatten().collect()
}

/// Group collapsed events into one incremental batch per resource kind.
///
/// Creates and updates go to `upsert`, deletes to `delete`, keyed by the
/// event's primary sub-resource.
pub fn group_events(env: &str, events: Vec<EventInfo>) -> BTreeMap<ResType, IncrementalBatch> {
    let mut batches: BTreeMap<ResType, IncrementalBatch> = BTreeMap::new();

    for event in events {
        let batch = batches
            .entry(event.res_type)
            .or_insert_with(|| IncrementalBatch::new(env));
        let sub_res = event.primary_sub_res().to_string();
        let target = match event.event_type {
            EventType::Delete => &mut batch.delete,
            EventType::Create | EventType::Update => &mut batch.upsert,
        };
        target
            .entry(sub_res)
            .or_default()
            .push(Value::Object(event.detail));
    }

    batches
}
