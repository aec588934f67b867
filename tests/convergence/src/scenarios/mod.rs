//! Convergence scenarios.
//!
//! - `full` - full-sync convergence, idempotent replay, multi-source partitioning
//! - `incremental` - change collapse and delete propagation
//! - `leadership` - loss and resume of leadership on either side

pub mod full;
pub mod incremental;
pub mod leadership;
