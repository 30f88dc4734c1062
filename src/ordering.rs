//! Byte Ordering
//!
//! Keys are ordered lexicographically on their raw bytes (the ordering of
//! `[u8]`). Every range-bounded operation goes through [`KeyRange`], a
//! half-open interval `[start, end)` whose bounds may each be absent.

use std::cmp::Ordering;
use std::ops::Bound;

/// Total order over keys
#[inline]
pub fn compare_keys(a: &[u8], b: &[u8]) -> Ordering {
    a.cmp(b)
}

/// Iteration direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending key order
    #[default]
    Forward,
    /// Descending key order
    Reverse,
}

impl Direction {
    pub fn from_reverse(reverse: bool) -> Self {
        if reverse {
            Direction::Reverse
        } else {
            Direction::Forward
        }
    }
}

/// Half-open key range `[start, end)`; `None` means unbounded on that side
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRange {
    /// Inclusive lower bound
    pub start: Option<Vec<u8>>,
    /// Exclusive upper bound
    pub end: Option<Vec<u8>>,
}

impl KeyRange {
    /// The whole keyspace
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new(start: Option<&[u8]>, end: Option<&[u8]>) -> Self {
        Self {
            start: start.map(<[u8]>::to_vec),
            end: end.map(<[u8]>::to_vec),
        }
    }

    /// `[start, end)` with both bounds present
    pub fn between(start: impl Into<Vec<u8>>, end: impl Into<Vec<u8>>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
        }
    }

    pub fn start(&self) -> Option<&[u8]> {
        self.start.as_deref()
    }

    pub fn end(&self) -> Option<&[u8]> {
        self.end.as_deref()
    }

    /// Whether `key` lies inside the range
    pub fn contains(&self, key: &[u8]) -> bool {
        self.above_start(key) && self.below_end(key)
    }

    /// `key >= start` (always true when unbounded below)
    pub fn above_start(&self, key: &[u8]) -> bool {
        match self.start() {
            Some(start) => compare_keys(key, start) != Ordering::Less,
            None => true,
        }
    }

    /// `key < end` (always true when unbounded above)
    pub fn below_end(&self, key: &[u8]) -> bool {
        match self.end() {
            Some(end) => compare_keys(key, end) == Ordering::Less,
            None => true,
        }
    }

    /// True when no key can satisfy the range (`start >= end`)
    pub fn is_empty(&self) -> bool {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => compare_keys(start, end) != Ordering::Less,
            _ => false,
        }
    }

    /// The bound at which a scan in `direction` begins
    ///
    /// Forward scans start at `Included(start)`, reverse scans at
    /// `Excluded(end)`; the bound is read as a lower bound for forward scans
    /// and an upper bound for reverse scans.
    pub fn initial_bound(&self, direction: Direction) -> Bound<Vec<u8>> {
        match direction {
            Direction::Forward => match &self.start {
                Some(start) => Bound::Included(start.clone()),
                None => Bound::Unbounded,
            },
            Direction::Reverse => match &self.end {
                Some(end) => Bound::Excluded(end.clone()),
                None => Bound::Unbounded,
            },
        }
    }

    /// The bound for a seek to `target`, clamped into the range
    ///
    /// Forward: first key `>= target`, never below `start`.
    /// Reverse: last key `<= target`, never at or past `end`.
    pub fn seek_bound(&self, target: &[u8], direction: Direction) -> Bound<Vec<u8>> {
        match direction {
            Direction::Forward => match self.start() {
                Some(start) if compare_keys(target, start) == Ordering::Less => {
                    Bound::Included(start.to_vec())
                }
                _ => Bound::Included(target.to_vec()),
            },
            Direction::Reverse => match self.end() {
                Some(end) if compare_keys(target, end) != Ordering::Less => {
                    Bound::Excluded(end.to_vec())
                }
                _ => Bound::Included(target.to_vec()),
            },
        }
    }

    /// Whether a key produced by a scan in `direction` is still in range
    ///
    /// Scans are started at a clamped bound, so only the far side needs
    /// checking.
    pub fn admits(&self, key: &[u8], direction: Direction) -> bool {
        match direction {
            Direction::Forward => self.below_end(key),
            Direction::Reverse => self.above_start(key),
        }
    }
}
