//! Per-resource reconciliation state machine.
//!
//! One sweep over one resource (or sub-resource) pages through the key
//! space: list a page, compare it, apply it, and continue from the page's
//! `next_start` until the listing reports that everything was seen.
//!
//! On the source side "compare" assembles the outbound batch and "apply"
//! pushes it. On the destination side they are the cross-diff and the
//! store writes.
//!
//! This module performs no I/O. The orchestrators in `sync-engine` feed it
//! events and execute the returned actions.

use std::time::Duration;
use sync_types::SortKey;

use crate::RetryPolicy;

/// Step of a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading one page of local records.
    Listing,
    /// Comparing (destination) or assembling (source) the page.
    Comparing,
    /// Writing (destination) or pushing (source) the page.
    Applying,
}

/// Sweep state - NO I/O, just state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepState<K> {
    /// No sweep in progress.
    Idle,
    /// A page is being processed.
    Running {
        /// Current step.
        phase: Phase,
        /// Inclusive start of the current page.
        start: K,
        /// Where the next page starts, known once the page was listed.
        next_start: Option<K>,
        /// Whether the listed page was the last one.
        is_all: bool,
        /// Failed attempts of the current step.
        failures: u32,
    },
}

/// Events fed to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepEvent<K> {
    /// Begin a sweep at `from` (usually the persisted cursor).
    Start {
        /// First key of the sweep.
        from: K,
    },
    /// The page was listed.
    Listed {
        /// Whether no records remain after this page.
        is_all: bool,
        /// First key of the following page.
        next_start: K,
    },
    /// The page was compared or assembled.
    Compared,
    /// The page was applied or pushed.
    Applied,
    /// The current step failed.
    Failed {
        /// Error description for logging.
        error: String,
    },
}

/// Actions the orchestrator must execute, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepAction<K> {
    /// List the page starting at `start`.
    List {
        /// First key of the page.
        start: K,
    },
    /// Compare or assemble the listed page.
    Compare,
    /// Apply or push the compared page.
    Apply,
    /// Wait before retrying the failed step.
    Sleep {
        /// Randomized delay.
        delay: Duration,
    },
    /// Persist `next` as the resume point of the sweep.
    Checkpoint {
        /// First key not yet processed.
        next: K,
    },
    /// The sweep reached the end of the key space.
    Complete,
    /// Retries are exhausted; give up until the next cycle.
    Abandon {
        /// Key the next cycle resumes from.
        resume_from: K,
        /// Last error.
        error: String,
    },
}

impl<K: SortKey> SweepState<K> {
    /// Create an idle state machine.
    pub fn new() -> Self {
        Self::Idle
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// Events that do not fit the current state are ignored.
    pub fn on_event(self, event: SweepEvent<K>, policy: &RetryPolicy) -> (Self, Vec<SweepAction<K>>) {
        match (self, event) {
            (Self::Idle, SweepEvent::Start { from }) => (
                Self::Running {
                    phase: Phase::Listing,
                    start: from.clone(),
                    next_start: None,
                    is_all: false,
                    failures: 0,
                },
                vec![SweepAction::List { start: from }],
            ),

            (
                Self::Running {
                    phase: Phase::Listing,
                    start,
                    ..
                },
                SweepEvent::Listed { is_all, next_start },
            ) => {
                // never step backwards, whatever the listing reports
                let next_start = if next_start > start {
                    next_start
                } else {
                    start.successor()
                };
                (
                    Self::Running {
                        phase: Phase::Comparing,
                        start,
                        next_start: Some(next_start),
                        is_all,
                        failures: 0,
                    },
                    vec![SweepAction::Compare],
                )
            }

            (
                Self::Running {
                    phase: Phase::Comparing,
                    start,
                    next_start,
                    is_all,
                    ..
                },
                SweepEvent::Compared,
            ) => (
                Self::Running {
                    phase: Phase::Applying,
                    start,
                    next_start,
                    is_all,
                    failures: 0,
                },
                vec![SweepAction::Apply],
            ),

            (
                Self::Running {
                    phase: Phase::Applying,
                    start,
                    next_start,
                    is_all,
                    ..
                },
                SweepEvent::Applied,
            ) => {
                if is_all {
                    return (Self::Idle, vec![SweepAction::Complete]);
                }
                let next = next_start.unwrap_or_else(|| start.successor());
                (
                    Self::Running {
                        phase: Phase::Listing,
                        start: next.clone(),
                        next_start: None,
                        is_all: false,
                        failures: 0,
                    },
                    vec![
                        SweepAction::Checkpoint { next: next.clone() },
                        SweepAction::List { start: next },
                    ],
                )
            }

            (
                Self::Running {
                    phase,
                    start,
                    next_start,
                    is_all,
                    failures,
                },
                SweepEvent::Failed { error },
            ) => {
                let failures = failures.saturating_add(1);
                if !policy.should_retry(failures) {
                    return (
                        Self::Idle,
                        vec![SweepAction::Abandon {
                            resume_from: start,
                            error,
                        }],
                    );
                }
                let redo = match phase {
                    Phase::Listing => SweepAction::List {
                        start: start.clone(),
                    },
                    Phase::Comparing => SweepAction::Compare,
                    Phase::Applying => SweepAction::Apply,
                };
                (
                    Self::Running {
                        phase,
                        start,
                        next_start,
                        is_all,
                        failures,
                    },
                    vec![
                        SweepAction::Sleep {
                            delay: policy.delay(),
                        },
                        redo,
                    ],
                )
            }

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Check if a sweep is in progress.
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    /// Current step, if running.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Self::Idle => None,
            Self::Running { phase, .. } => Some(*phase),
        }
    }

    /// Start of the page being processed, if running.
    pub fn current_start(&self) -> Option<&K> {
        match self {
            Self::Idle => None,
            Self::Running { start, .. } => Some(start),
        }
    }
}

impl<K: SortKey> Default for SweepState<K> {
    fn default() -> Self {
        Self::new()
    }
}
