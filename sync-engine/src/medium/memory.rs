//! In-memory transfer medium for testing.
//!
//! Allows inspecting queues and injecting failures.

use super::{MediumError, PullResponse, TransferMedium};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use sync_types::ResType;

type QueueKey = (ResType, String, bool);

/// In-memory [`TransferMedium`].
///
/// Clones share the same queues, so one instance can connect a source and
/// a destination in the same process.
#[derive(Debug, Default, Clone)]
pub struct MemoryMedium {
    queues: Arc<DashMap<QueueKey, VecDeque<Vec<u8>>>>,
    faults: Arc<Mutex<Faults>>,
}

#[derive(Debug, Default)]
struct Faults {
    fail_next_push: Option<String>,
    fail_next_pull: Option<String>,
}

impl MemoryMedium {
    /// Create an empty medium.
    pub fn new() -> Self {
        Self::default()
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of payloads queued under a key.
    pub fn queued(&self, res_type: ResType, sub_res: &str, is_increment: bool) -> usize {
        self.queues
            .get(&(res_type, sub_res.to_string(), is_increment))
            .map_or(0, |q| q.len())
    }

    /// Total number of payloads queued under any key.
    pub fn total_queued(&self) -> usize {
        self.queues.iter().map(|q| q.len()).sum()
    }

    /// Copy of every payload queued under a key, oldest first.
    pub fn payloads(&self, res_type: ResType, sub_res: &str, is_increment: bool) -> Vec<Vec<u8>> {
        self.queues
            .get(&(res_type, sub_res.to_string(), is_increment))
            .map(|q| q.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Cause the next push to fail with the given error.
    pub fn fail_next_push(&self, error: &str) {
        self.faults().fail_next_push = Some(error.to_string());
    }

    /// Cause the next pull to fail with the given error.
    pub fn fail_next_pull(&self, error: &str) {
        self.faults().fail_next_pull = Some(error.to_string());
    }
}

#[async_trait]
impl TransferMedium for MemoryMedium {
    async fn push(
        &self,
        res_type: ResType,
        sub_res: &str,
        is_increment: bool,
        payload: Vec<u8>,
    ) -> Result<(), MediumError> {
        if let Some(error) = self.faults().fail_next_push.take() {
            return Err(MediumError::Unavailable(error));
        }

        self.queues
            .entry((res_type, sub_res.to_string(), is_increment))
            .or_default()
            .push_back(payload);
        Ok(())
    }

    async fn pull(
        &self,
        res_type: ResType,
        sub_res: &str,
        is_increment: bool,
        ack: bool,
    ) -> Result<PullResponse, MediumError> {
        if let Some(error) = self.faults().fail_next_pull.take() {
            return Err(MediumError::Unavailable(error));
        }

        let key = (res_type, sub_res.to_string(), is_increment);
        let Some(mut queue) = self.queues.get_mut(&key) else {
            return Ok(PullResponse::default());
        };
        if ack {
            queue.pop_front();
        }
        Ok(PullResponse {
            total_remaining: queue.len() as u64,
            payload: queue.front().cloned(),
        })
    }
}
