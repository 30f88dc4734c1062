//! Store iterators
//!
//! A [`StoreIterator`] wraps an engine cursor in a slot shared with the
//! store's registry. The iterator drives the cursor through the slot; the
//! store reaches into the same slot on close to drop the cursor and mark it
//! invalidated.
//!
//! ```text
//! created ──next/seek──▶ positioned ──end/limit──▶ exhausted
//!    │                       │   ▲                     │
//!    │                       │   └───────seek──────────┘
//!    └───────────────────────┴──────release──▶ released
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::engine::{EngineCursor, StorageEngine};
use crate::error::{LevelError, Result};

use super::StoreInner;

/// Iterator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IteratorState {
    Created,
    Positioned,
    Exhausted,
    Released,
    /// The owning store closed
    Invalidated,
}

pub(crate) type SharedSlot<C> = Arc<Mutex<IteratorSlot<C>>>;

pub(crate) struct IteratorSlot<C> {
    state: IteratorState,
    cursor: Option<C>,
}

impl<C> IteratorSlot<C> {
    pub(crate) fn new(cursor: C) -> Self {
        Self {
            state: IteratorState::Created,
            cursor: Some(cursor),
        }
    }

    pub(crate) fn invalidate(&mut self) {
        if self.state != IteratorState::Released {
            self.state = IteratorState::Invalidated;
        }
        self.cursor = None;
    }

    fn release(&mut self) {
        self.state = IteratorState::Released;
        self.cursor = None;
    }

    /// The cursor, or the error for a released/invalidated iterator
    fn cursor(&mut self) -> Result<&mut C> {
        match self.state {
            IteratorState::Released => Err(LevelError::IteratorReleased),
            IteratorState::Invalidated => Err(LevelError::StoreClosed),
            _ => self.cursor.as_mut().ok_or(LevelError::StoreClosed),
        }
    }
}

/// Ordered pull iterator over a point-in-time view of a store
///
/// Writes made after creation are not visible. Dropping the iterator
/// releases it.
pub struct StoreIterator<E: StorageEngine> {
    id: u32,
    slot: SharedSlot<E::Cursor>,
    store: Weak<StoreInner<E>>,
    limit: Option<usize>,
    returned: usize,
}

impl<E: StorageEngine> StoreIterator<E> {
    pub(crate) fn new(
        id: u32,
        slot: SharedSlot<E::Cursor>,
        store: Weak<StoreInner<E>>,
        limit: Option<usize>,
    ) -> Self {
        Self {
            id,
            slot,
            store,
            limit,
            returned: 0,
        }
    }

    fn limit_reached(&self) -> bool {
        self.limit.map_or(false, |limit| self.returned >= limit)
    }

    /// Next pair in scan order, `None` once exhausted
    pub fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        let limit_reached = self.limit_reached();
        let mut slot = self.slot.lock();
        let cursor = slot.cursor()?;

        if limit_reached {
            slot.state = IteratorState::Exhausted;
            return Ok(None);
        }

        match cursor.next()? {
            Some(pair) => {
                slot.state = IteratorState::Positioned;
                self.returned += 1;
                Ok(Some(pair))
            }
            None => {
                slot.state = IteratorState::Exhausted;
                Ok(None)
            }
        }
    }

    /// Position at the first in-range key at or past `target`
    ///
    /// Forward iterators land on the first key `>= target`, reverse ones on
    /// the last key `<= target`. Returns whether such a key exists; if it
    /// does, the next call to [`next`](Self::next) returns it. Seeking does
    /// not reset the limit.
    pub fn seek(&mut self, target: &[u8]) -> Result<bool> {
        let limit_reached = self.limit_reached();
        let mut slot = self.slot.lock();
        let cursor = slot.cursor()?;

        let found = !limit_reached && cursor.seek(target)?;
        slot.state = if found {
            IteratorState::Positioned
        } else {
            IteratorState::Exhausted
        };
        Ok(found)
    }

    /// Release the snapshot and cursor; idempotent
    pub fn release(&mut self) {
        {
            let mut slot = self.slot.lock();
            if slot.state == IteratorState::Released {
                return;
            }
            slot.release();
        }
        if let Some(store) = self.store.upgrade() {
            store.deregister_iterator(self.id);
        }
    }

    pub fn state(&self) -> IteratorState {
        self.slot.lock().state
    }

    /// Id of this iterator within its store
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Pairs returned so far
    pub fn returned(&self) -> usize {
        self.returned
    }

    /// Drain the remaining pairs
    pub fn collect_remaining(&mut self) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut pairs = Vec::new();
        while let Some(pair) = self.next()? {
            pairs.push(pair);
        }
        Ok(pairs)
    }
}

impl<E: StorageEngine> Drop for StoreIterator<E> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<E: StorageEngine> fmt::Debug for StoreIterator<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreIterator")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("limit", &self.limit)
            .field("returned", &self.returned)
            .finish()
    }
}
