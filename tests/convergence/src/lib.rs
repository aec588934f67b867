//! # convergence-tests
//!
//! End-to-end convergence harness for cmdb-sync.
//!
//! This crate wires source and destination environments through one
//! in-memory transfer medium and checks that they converge:
//! - Full-sync reconciliation across paginated windows
//! - Idempotent replay of already-applied payloads
//! - Several sources partitioning one destination's id space
//! - Incremental change collapse
//! - Leadership loss and resume

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod assertions;
pub mod harness;

pub mod scenarios;
