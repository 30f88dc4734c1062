//! Explicit snapshots
//!
//! Like iterators, a [`Snapshot`] keeps its engine token in a slot shared
//! with the store's registry, so closing the store drops every token it
//! handed out.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::config::{IteratorOptions, ReadOptions};
use crate::engine::StorageEngine;
use crate::error::{LevelError, Result};

use super::{StoreInner, StoreIterator};

/// Snapshot state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    Live,
    Released,
    /// The owning store closed
    Invalidated,
}

pub(crate) type SharedToken<T> = Arc<Mutex<SnapshotSlot<T>>>;

pub(crate) struct SnapshotSlot<T> {
    state: SnapshotState,
    token: Option<T>,
}

impl<T: Clone> SnapshotSlot<T> {
    pub(crate) fn new(token: T) -> Self {
        Self {
            state: SnapshotState::Live,
            token: Some(token),
        }
    }

    pub(crate) fn invalidate(&mut self) {
        if self.state != SnapshotState::Released {
            self.state = SnapshotState::Invalidated;
        }
        self.token = None;
    }

    fn token(&self) -> Result<T> {
        match self.state {
            SnapshotState::Released => Err(LevelError::SnapshotReleased),
            SnapshotState::Invalidated => Err(LevelError::NotOpen),
            SnapshotState::Live => self.token.clone().ok_or(LevelError::NotOpen),
        }
    }
}

/// Caller-held point-in-time view of a store
///
/// Reads through a snapshot ignore every write made after it was taken.
/// Unusable once released or once the store closed. Dropping the snapshot
/// releases it.
pub struct Snapshot<E: StorageEngine> {
    id: u32,
    slot: SharedToken<E::Snapshot>,
    store: Weak<StoreInner<E>>,
}

impl<E: StorageEngine> Snapshot<E> {
    pub(crate) fn new(id: u32, slot: SharedToken<E::Snapshot>, store: Weak<StoreInner<E>>) -> Self {
        Self { id, slot, store }
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get_with(key, &ReadOptions::default())
    }

    pub fn get_with(&self, key: &[u8], options: &ReadOptions) -> Result<Option<Vec<u8>>> {
        let token = self.slot.lock().token()?;
        let store = self.store.upgrade().ok_or(LevelError::NotOpen)?;
        store.get(key, Some(&token), options)
    }

    /// Iterate this snapshot
    pub fn iter(&self, options: IteratorOptions) -> Result<StoreIterator<E>> {
        let token = self.slot.lock().token()?;
        let store = self.store.upgrade().ok_or(LevelError::NotOpen)?;
        store.create_iterator(options, Some(&token))
    }

    /// Release the view; idempotent
    pub fn release(&self) {
        {
            let mut slot = self.slot.lock();
            slot.state = SnapshotState::Released;
            slot.token = None;
        }
        if let Some(store) = self.store.upgrade() {
            store.deregister_snapshot(self.id);
        }
    }

    pub fn is_released(&self) -> bool {
        self.state() == SnapshotState::Released
    }

    pub fn state(&self) -> SnapshotState {
        self.slot.lock().state
    }
}

impl<E: StorageEngine> Drop for Snapshot<E> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<E: StorageEngine> fmt::Debug for Snapshot<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
