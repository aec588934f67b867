//! Sort keys and pagination windows.
//!
//! Every synchronized record is ordered by its key. Single-key entities use
//! their numeric id; relations use the ordered id pair in [`RelationKey`].
//! A [`SyncInterval`] is a half-open `[start, end)` window over those keys
//! and drives one pagination step.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A key usable for pagination and cross-diff.
pub trait SortKey:
    Clone + Ord + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Records keyed this way are never updated in place.
    const IMMUTABLE: bool;

    /// Smallest key strictly greater than `self`.
    fn successor(&self) -> Self;

    /// The numeric ids carried by this key.
    fn ids(&self) -> Vec<i64>;

    /// The key every sweep starts from.
    fn min_key() -> Self;
}

impl SortKey for i64 {
    const IMMUTABLE: bool = false;

    fn successor(&self) -> Self {
        self.saturating_add(1)
    }

    fn ids(&self) -> Vec<i64> {
        vec![*self]
    }

    fn min_key() -> Self {
        0
    }
}

/// Key of a relation between two single-key entities.
///
/// Ordered lexicographically by `(first, second)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationKey {
    /// Id of the first related entity (e.g. host id).
    pub first: i64,
    /// Id of the second related entity (e.g. module id).
    pub second: i64,
}

impl RelationKey {
    /// Create a relation key.
    pub fn new(first: i64, second: i64) -> Self {
        Self { first, second }
    }
}

impl fmt::Display for RelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.first, self.second)
    }
}

impl SortKey for RelationKey {
    const IMMUTABLE: bool = true;

    fn successor(&self) -> Self {
        match self.second.checked_add(1) {
            Some(second) => Self::new(self.first, second),
            None => Self::new(self.first.saturating_add(1), i64::MIN),
        }
    }

    fn ids(&self) -> Vec<i64> {
        vec![self.first, self.second]
    }

    fn min_key() -> Self {
        Self::new(0, 0)
    }
}

/// Half-open window `[start, end)` over a sort key.
///
/// `end == None` means the window is open towards infinity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncInterval<K> {
    /// Inclusive lower bound.
    pub start: K,
    /// Exclusive upper bound, or `None` for infinity.
    pub end: Option<K>,
}

impl<K: SortKey> SyncInterval<K> {
    /// Create a bounded window.
    pub fn new(start: K, end: K) -> Self {
        Self {
            start,
            end: Some(end),
        }
    }

    /// Create a window open towards infinity.
    pub fn open(start: K) -> Self {
        Self { start, end: None }
    }

    /// The window covering the whole key space.
    pub fn all() -> Self {
        Self::open(K::min_key())
    }

    /// Check whether `key` lies inside the window.
    pub fn contains(&self, key: &K) -> bool {
        *key >= self.start && self.end.as_ref().map_or(true, |end| key < end)
    }

    /// Check whether `key` lies at or past the end of the window.
    pub fn is_past_end(&self, key: &K) -> bool {
        self.end.as_ref().is_some_and(|end| key >= end)
    }
}
