//! Transfer medium client contract.
//!
//! The medium is a store-and-forward relay between two environments. It
//! keeps one FIFO queue per `(resource, sub-resource, full|incremental)`.
//!
//! # Ack contract
//!
//! `pull` returns the head of the queue without removing it. A consumer
//! passes `ack = true` on its *next* pull, and only once the previous
//! payload is fully applied; the medium then drops the old head before
//! returning the new one. A consumer that crashes mid-apply therefore sees
//! the same payload again.

mod memory;

pub use memory::MemoryMedium;

use async_trait::async_trait;
use sync_types::ResType;
use thiserror::Error;

/// Medium errors.
#[derive(Debug, Error)]
pub enum MediumError {
    /// The medium could not be reached.
    #[error("medium unavailable: {0}")]
    Unavailable(String),

    /// The medium refused the payload.
    #[error("push rejected: {0}")]
    Rejected(String),

    /// The medium's own storage failed.
    #[error("medium storage error: {0}")]
    Storage(String),
}

/// Result of one pull.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PullResponse {
    /// Payloads still queued, including the returned one.
    pub total_remaining: u64,
    /// Head of the queue, `None` if the queue is empty.
    pub payload: Option<Vec<u8>>,
}

/// Client of the transfer medium.
#[async_trait]
pub trait TransferMedium: Send + Sync {
    /// Append a payload to a queue.
    async fn push(
        &self,
        res_type: ResType,
        sub_res: &str,
        is_increment: bool,
        payload: Vec<u8>,
    ) -> Result<(), MediumError>;

    /// Read the head of a queue, first dropping the previous head if `ack`.
    async fn pull(
        &self,
        res_type: ResType,
        sub_res: &str,
        is_increment: bool,
        ack: bool,
    ) -> Result<PullResponse, MediumError>;
}
