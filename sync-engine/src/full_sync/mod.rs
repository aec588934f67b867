//! Full-sync orchestrators.
//!
//! The source side ([`SourceFullSync`]) sweeps every resource page by page
//! and pushes each page as one window. The destination side
//! ([`DestFullSync`]) pulls the windows and reconciles its own records in
//! the same key range against them.
//!
//! Both drive the pure [`SweepState`](sync_core::SweepState) machine.

mod dest;
mod source;

pub use dest::DestFullSync;
pub use source::{SourceFullSync, SweepReport};

pub(crate) use dest::apply_window;
pub(crate) use source::push_sweep;

use sync_types::ResType;
use tokio::sync::mpsc;

use crate::SyncError;

/// How one source sweep over a sub-resource ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// Every page was pushed.
    Completed,
    /// A step failed too often; the sweep resumes from its cursor next time.
    Abandoned,
    /// Leadership was lost mid-sweep.
    Interrupted,
}

/// How the destination handled one pulled payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The payload was fully applied.
    Applied,
    /// The payload could not be used and was dropped.
    Skipped,
    /// Applying failed; the payload must be delivered again.
    Abandoned,
}

impl ApplyOutcome {
    /// Whether the payload may be acknowledged.
    pub fn is_done(&self) -> bool {
        matches!(self, ApplyOutcome::Applied | ApplyOutcome::Skipped)
    }
}

/// Handle waking the source full-sync loop outside its schedule.
#[derive(Debug, Clone)]
pub struct FullSyncTrigger {
    tx: mpsc::Sender<Option<Vec<ResType>>>,
}

impl FullSyncTrigger {
    pub(crate) fn channel() -> (Self, mpsc::Receiver<Option<Vec<ResType>>>) {
        let (tx, rx) = mpsc::channel(1);
        (Self { tx }, rx)
    }

    /// Request a sweep over `resources`, or over everything if `None`.
    ///
    /// A request made while another one is still queued is dropped.
    pub fn trigger(&self, resources: Option<Vec<ResType>>) -> Result<(), SyncError> {
        match self.tx.try_send(resources) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!("Full sync already requested");
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SyncError::NotSupported(
                "full sync loop is not running".into(),
            )),
        }
    }
}
