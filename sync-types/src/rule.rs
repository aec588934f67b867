//! Id-space ownership rules.

use serde::{Deserialize, Serialize};

/// Arithmetic progression of ids owned by one source environment.
///
/// The rule owns every id `start_id + k * step` (k >= 0) up to and including
/// `end_id`. A missing `end_id` means the progression never ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdRule {
    /// First owned id.
    pub start_id: i64,
    /// Last id the rule may own (inclusive), `None` for infinity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_id: Option<i64>,
    /// Distance between two owned ids.
    #[serde(default = "default_step")]
    pub step: i64,
}

fn default_step() -> i64 {
    1
}

impl IdRule {
    /// Create a bounded rule.
    pub fn new(start_id: i64, end_id: i64, step: i64) -> Self {
        Self {
            start_id,
            end_id: Some(end_id),
            step,
        }
    }

    /// Create a rule without an upper bound.
    pub fn unbounded(start_id: i64, step: i64) -> Self {
        Self {
            start_id,
            end_id: None,
            step,
        }
    }

    /// Whether the rule has no upper bound.
    pub fn is_infinite(&self) -> bool {
        self.end_id.is_none()
    }
}
