//! # sync-core
//!
//! Pure logic for cmdb-sync (no I/O, instant tests).
//!
//! This crate implements the reconciliation algorithms and the sweep state
//! machine without any storage or network I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (store, medium, locks) is performed by `sync-engine`, which
//! interprets the actions produced by these state machines.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collapse;
pub mod diff;
pub mod partition;
pub mod retry;
pub mod state;

pub use collapse::{collapse_events, group_events};
pub use diff::{compare_data, CompareResult};
pub use partition::{match_id_rule, rule_owns, validate_rule, IdRuleSet, RuleError};
pub use retry::RetryPolicy;
pub use state::{Phase, SweepAction, SweepEvent, SweepState};
