//! Value cache
//!
//! Bounded cache of decoded SSTable entries keyed by (table id, offset).
//! Eviction is first-in first-out once the byte budget is exceeded.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::memtable::MemTableEntry;

type CacheKey = (u64, u64);

/// Shared cache of SSTable entries
pub struct ValueCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<CacheKey, (Vec<u8>, MemTableEntry)>,
    order: VecDeque<CacheKey>,
    used: usize,
    hits: u64,
    misses: u64,
}

/// Point-in-time cache counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub capacity: usize,
    pub used: usize,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

impl ValueCache {
    /// Create a cache holding at most `capacity` bytes of keys and values
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn get(&self, table_id: u64, offset: u64) -> Option<(Vec<u8>, MemTableEntry)> {
        let mut inner = self.inner.lock();
        match inner.entries.get(&(table_id, offset)).cloned() {
            Some(hit) => {
                inner.hits += 1;
                Some(hit)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    pub fn insert(&self, table_id: u64, offset: u64, key: Vec<u8>, entry: MemTableEntry) {
        let charge = key.len() + entry.value_len();
        if charge > self.capacity {
            return;
        }

        let mut inner = self.inner.lock();
        let cache_key = (table_id, offset);
        if inner.entries.contains_key(&cache_key) {
            return;
        }

        while inner.used + charge > self.capacity {
            let Some(oldest) = inner.order.pop_front() else {
                break;
            };
            if let Some((k, e)) = inner.entries.remove(&oldest) {
                inner.used -= k.len() + e.value_len();
            }
        }

        inner.entries.insert(cache_key, (key, entry));
        inner.order.push_back(cache_key);
        inner.used += charge;
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            capacity: self.capacity,
            used: inner.used,
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }
}
