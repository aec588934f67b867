//! Leadership discovery.
//!
//! Only the replica holding leadership runs sync work. Loops poll
//! [`Leadership::is_master`] at the top of every iteration.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Answers whether this replica currently leads the cluster.
pub trait Leadership: Send + Sync {
    /// Whether this replica is the leader right now.
    fn is_master(&self) -> bool;
}

/// A leadership flag set from outside (tests, single-replica deployments).
///
/// Clones share the same flag.
#[derive(Debug, Clone)]
pub struct StaticLeadership {
    master: Arc<AtomicBool>,
}

impl StaticLeadership {
    /// Create a flag with the given initial value.
    pub fn new(master: bool) -> Self {
        Self {
            master: Arc::new(AtomicBool::new(master)),
        }
    }

    /// Gain or lose leadership.
    pub fn set_master(&self, master: bool) {
        self.master.store(master, Ordering::SeqCst);
    }
}

impl Default for StaticLeadership {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Leadership for StaticLeadership {
    fn is_master(&self) -> bool {
        self.master.load(Ordering::SeqCst)
    }
}
