//! MemTable implementation
//!
//! Multi-version BTreeMap memtable with RwLock for concurrency.

use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::operation::BatchOp;
use crate::ordering::{Direction, KeyRange};

use super::MemTableEntry;

/// Versioned key: newest version of a user key sorts first
type InternalKey = (Vec<u8>, Reverse<u64>);

/// Per-version bookkeeping overhead counted towards the size (sequence tag)
const VERSION_OVERHEAD: usize = 8;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<BTreeMap<InternalKey, MemTableEntry>>,
    /// Approximate size in bytes of all versions
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Newest version of `key` visible at `sequence`
    ///
    /// Returns `None` when the memtable holds no visible version, and
    /// `Some(Tombstone)` when the visible version is a delete.
    pub fn get(&self, key: &[u8], sequence: u64) -> Option<MemTableEntry> {
        let data = self.data.read();
        let from = (key.to_vec(), Reverse(sequence));
        data.range(from..)
            .next()
            .filter(|((k, _), _)| k.as_slice() == key)
            .map(|(_, entry)| entry.clone())
    }

    /// Insert a batch whose first operation carries `first_sequence`
    ///
    /// All versions are inserted under one write lock; readers only see them
    /// once the caller publishes a sequence at or past the batch's last one.
    pub fn apply(&self, first_sequence: u64, operations: &[BatchOp]) -> usize {
        let mut data = self.data.write();
        let mut added = 0;
        for (sequence, op) in (first_sequence..).zip(operations) {
            let (key, entry) = match op {
                BatchOp::Put { key, value } => (key.clone(), MemTableEntry::Value(value.clone())),
                BatchOp::Delete { key } => (key.clone(), MemTableEntry::Tombstone),
            };
            added += key.len() + entry.value_len() + VERSION_OVERHEAD;
            data.insert((key, Reverse(sequence)), entry);
        }
        self.size.fetch_add(added, Ordering::SeqCst) + added
    }

    /// First key visible at `sequence` reached from `bound` in `direction`
    ///
    /// For forward scans `bound` is a lower bound, for reverse scans an upper
    /// bound. Tombstones are returned so that callers merging several sources
    /// can let them shadow older data.
    pub fn seek(
        &self,
        bound: &Bound<Vec<u8>>,
        direction: Direction,
        sequence: u64,
    ) -> Option<(Vec<u8>, MemTableEntry)> {
        let data = self.data.read();
        match direction {
            Direction::Forward => {
                let lower: Bound<InternalKey> = match bound {
                    Bound::Included(k) => Bound::Included((k.clone(), Reverse(u64::MAX))),
                    Bound::Excluded(k) => Bound::Excluded((k.clone(), Reverse(0))),
                    Bound::Unbounded => Bound::Unbounded,
                };
                data.range((lower, Bound::Unbounded))
                    .find(|((_, Reverse(seq)), _)| *seq <= sequence)
                    .map(|((key, _), entry)| (key.clone(), entry.clone()))
            }
            Direction::Reverse => {
                let upper: Bound<InternalKey> = match bound {
                    Bound::Included(k) => Bound::Included((k.clone(), Reverse(0))),
                    Bound::Excluded(k) => Bound::Excluded((k.clone(), Reverse(u64::MAX))),
                    Bound::Unbounded => Bound::Unbounded,
                };
                // Walking backwards visits each key's versions oldest first,
                // so the last visible one seen before the key changes wins.
                let mut found: Option<(&Vec<u8>, &MemTableEntry)> = None;
                for ((key, Reverse(seq)), entry) in data.range((Bound::Unbounded, upper)).rev() {
                    if let Some((current, _)) = found {
                        if current != key {
                            break;
                        }
                    }
                    if *seq <= sequence {
                        found = Some((key, entry));
                    }
                }
                found.map(|(key, entry)| (key.clone(), entry.clone()))
            }
        }
    }

    /// Bytes held for keys in `range`, all versions included
    pub fn approximate_size(&self, range: &KeyRange) -> u64 {
        if range.is_empty() {
            return 0;
        }
        let data = self.data.read();
        let lower = match range.start() {
            Some(start) => Bound::Included((start.to_vec(), Reverse(u64::MAX))),
            None => Bound::Unbounded,
        };
        data.range((lower, Bound::Unbounded))
            .take_while(|((key, _), _)| range.below_end(key))
            .map(|((key, _), entry)| (key.len() + entry.value_len() + VERSION_OVERHEAD) as u64)
            .sum()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Get the number of stored versions
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    /// Check if the memtable holds no versions
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Newest version of every key, in sorted key order (for flush)
    pub fn iter(&self) -> MemTableIterator {
        let data = self.data.read();
        let mut entries: Vec<(Vec<u8>, MemTableEntry)> = Vec::new();
        for ((key, _), entry) in data.iter() {
            match entries.last() {
                Some((last, _)) if last == key => continue,
                _ => entries.push((key.clone(), entry.clone())),
            }
        }
        MemTableIterator {
            entries: entries.into_iter(),
        }
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the newest version of each MemTable key
pub struct MemTableIterator {
    entries: std::vec::IntoIter<(Vec<u8>, MemTableEntry)>,
}

impl Iterator for MemTableIterator {
    type Item = (Vec<u8>, MemTableEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next()
    }
}
