//! Incremental sync.
//!
//! [`IncrementalWatcher`] runs on the source: it reads changes since the
//! last watch token, filters and collapses them, pushes one batch per
//! resource and only then advances the token. [`IncrementalPoller`] runs on
//! the destination and applies the batches, deletes first.

mod poller;
mod watcher;

pub use poller::IncrementalPoller;
pub use watcher::{unix_now, IncrementalWatcher};

pub(crate) use poller::apply_batch;
