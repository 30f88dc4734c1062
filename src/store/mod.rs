//! Store Module
//!
//! The adapter contract on top of a [`StorageEngine`].
//!
//! ## Responsibilities
//! - Lifecycle state machine bound to one location
//! - Point reads/writes gated on the store being open
//! - Atomic batches, snapshot iterators and explicit snapshots
//! - Size estimates and engine properties
//!
//! ## Locking
//! Every operation holds the lifecycle read lock while it talks to the
//! engine; `close` takes the write lock, so it waits for in-flight calls and
//! no call can start against a closing engine. Lock order is
//! lifecycle → iterator or snapshot registry → slot.

mod batch;
mod iterator;
mod lifecycle;
mod snapshot;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::{IteratorOptions, Options, ReadOptions, WriteOptions};
use crate::engine::{LsmEngine, StorageEngine};
use crate::error::{LevelError, Result};
use crate::operation::BatchOp;
use crate::ordering::{Direction, KeyRange};

pub use batch::Batch;
pub use iterator::{IteratorState, StoreIterator};
pub use lifecycle::LifecycleState;
pub use snapshot::{Snapshot, SnapshotState};

use iterator::{IteratorSlot, SharedSlot};
use lifecycle::Lifecycle;
use snapshot::{SharedToken, SnapshotSlot};

/// Shared state behind a [`Store`], also reachable from its iterators
pub(crate) struct StoreInner<E: StorageEngine> {
    location: PathBuf,
    lifecycle: RwLock<Lifecycle<E>>,
    /// Outstanding iterators, invalidated when the store closes
    iterators: Mutex<HashMap<u32, SharedSlot<E::Cursor>>>,
    next_iterator_id: AtomicU32,
    /// Outstanding snapshots, their tokens dropped when the store closes
    snapshots: Mutex<HashMap<u32, SharedToken<E::Snapshot>>>,
    next_snapshot_id: AtomicU32,
    /// Successful writes so far
    generation: AtomicU64,
}

impl<E: StorageEngine> StoreInner<E> {
    /// Run `f` against the engine if the store is open
    pub(crate) fn with_engine<T>(&self, f: impl FnOnce(&E) -> Result<T>) -> Result<T> {
        let lifecycle = self.lifecycle.read();
        f(lifecycle.engine()?)
    }

    pub(crate) fn get(
        &self,
        key: &[u8],
        snapshot: Option<&E::Snapshot>,
        options: &ReadOptions,
    ) -> Result<Option<Vec<u8>>> {
        self.with_engine(|engine| engine.get(key, snapshot, options))
    }

    pub(crate) fn write(&self, operations: &[BatchOp], options: &WriteOptions) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }
        self.with_engine(|engine| engine.apply_batch(operations, options))?;
        self.generation.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    pub(crate) fn create_iterator(
        self: &Arc<Self>,
        options: IteratorOptions,
        snapshot: Option<&E::Snapshot>,
    ) -> Result<StoreIterator<E>> {
        self.with_engine(|engine| {
            let cursor = engine.new_cursor(
                options.range.clone(),
                Direction::from_reverse(options.reverse),
                snapshot,
                &options.read_options(),
            )?;
            let id = self.next_iterator_id.fetch_add(1, Ordering::SeqCst);
            let slot = Arc::new(Mutex::new(IteratorSlot::new(cursor)));
            self.iterators.lock().insert(id, Arc::clone(&slot));
            Ok(StoreIterator::new(id, slot, Arc::downgrade(self), options.limit))
        })
    }

    pub(crate) fn deregister_iterator(&self, id: u32) {
        self.iterators.lock().remove(&id);
    }

    pub(crate) fn create_snapshot(self: &Arc<Self>) -> Result<Snapshot<E>> {
        self.with_engine(|engine| {
            let id = self.next_snapshot_id.fetch_add(1, Ordering::SeqCst);
            let slot = Arc::new(Mutex::new(SnapshotSlot::new(engine.snapshot())));
            self.snapshots.lock().insert(id, Arc::clone(&slot));
            Ok(Snapshot::new(id, slot, Arc::downgrade(self)))
        })
    }

    pub(crate) fn deregister_snapshot(&self, id: u32) {
        self.snapshots.lock().remove(&id);
    }

    fn invalidate_snapshots(&self) -> usize {
        let slots: Vec<_> = self.snapshots.lock().drain().map(|(_, slot)| slot).collect();
        for slot in &slots {
            slot.lock().invalidate();
        }
        slots.len()
    }

    fn invalidate_iterators(&self) -> usize {
        let slots: Vec<_> = self.iterators.lock().drain().map(|(_, slot)| slot).collect();
        for slot in &slots {
            slot.lock().invalidate();
        }
        slots.len()
    }
}

/// Handle to one ordered key-value store at a location
///
/// Created `idle` by [`Store::new`]; every data operation needs the store
/// to be [`open`](Store::open). `Store` is `Send + Sync`, so point reads,
/// writes and commits can be issued from many threads through `&Store`.
///
/// ```no_run
/// use levelkv::{Options, Store};
///
/// let store: Store = Store::new("/tmp/levelkv-demo");
/// store.open(&Options::default())?;
/// store.put(b"name", b"levelkv")?;
/// assert_eq!(store.get(b"name")?, Some(b"levelkv".to_vec()));
/// store.close()?;
/// # Ok::<(), levelkv::LevelError>(())
/// ```
pub struct Store<E: StorageEngine = LsmEngine> {
    inner: Arc<StoreInner<E>>,
}

impl<E: StorageEngine> Store<E> {
    /// Create a store handle for `location`, not yet open
    pub fn new(location: impl AsRef<Path>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                location: location.as_ref().to_path_buf(),
                lifecycle: RwLock::new(Lifecycle::new()),
                iterators: Mutex::new(HashMap::new()),
                next_iterator_id: AtomicU32::new(1),
                snapshots: Mutex::new(HashMap::new()),
                next_snapshot_id: AtomicU32::new(1),
                generation: AtomicU64::new(0),
            }),
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the engine at this store's location
    ///
    /// Only valid from `idle`. A failed open leaves the store `closed`.
    pub fn open(&self, options: &Options) -> Result<()> {
        self.inner.lifecycle.write().state.begin_open()?;

        let opened = E::open(&self.inner.location, options);

        let mut lifecycle = self.inner.lifecycle.write();
        match opened {
            Ok(engine) => {
                lifecycle.engine = Some(engine);
                lifecycle.state.finish_open(true);
                tracing::info!(location = %self.inner.location.display(), "Store opened");
                Ok(())
            }
            Err(e) => {
                lifecycle.state.finish_open(false);
                tracing::warn!(
                    location = %self.inner.location.display(),
                    error = %e,
                    "Store failed to open"
                );
                Err(e)
            }
        }
    }

    /// Close the store
    ///
    /// Waits for in-flight operations, invalidates every outstanding
    /// iterator and snapshot, then closes the engine. The store ends `closed` even when
    /// the engine reports an error.
    pub fn close(&self) -> Result<()> {
        let engine = {
            let mut lifecycle = self.inner.lifecycle.write();
            lifecycle.state.begin_close()?;
            lifecycle.engine.take()
        };

        let invalidated = self.inner.invalidate_iterators();
        let invalidated_snapshots = self.inner.invalidate_snapshots();

        let result = match engine {
            Some(engine) => engine.close(),
            None => Ok(()),
        };

        self.inner.lifecycle.write().state.finish_close();
        tracing::info!(
            location = %self.inner.location.display(),
            invalidated_iterators = invalidated,
            invalidated_snapshots,
            ok = result.is_ok(),
            "Store closed"
        );
        result
    }

    pub fn state(&self) -> LifecycleState {
        self.inner.lifecycle.read().state
    }

    pub fn location(&self) -> &Path {
        &self.inner.location
    }

    /// Number of successful writes (puts, deletes and batches)
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Point Operations
    // =========================================================================

    /// Value stored under `key`, `None` when absent
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get_with(key, &ReadOptions::default())
    }

    pub fn get_with(&self, key: &[u8], options: &ReadOptions) -> Result<Option<Vec<u8>>> {
        self.inner.get(key, None, options)
    }

    /// Like [`get`](Store::get), but absence is `Err(NotFound)`
    pub fn get_or_not_found(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.get(key)?.ok_or(LevelError::NotFound)
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Read several keys from one consistent view
    pub fn get_many<K: AsRef<[u8]>>(&self, keys: &[K]) -> Result<Vec<Option<Vec<u8>>>> {
        let options = ReadOptions::default();
        self.inner.with_engine(|engine| {
            let snapshot = engine.snapshot();
            keys.iter()
                .map(|key| engine.get(key.as_ref(), Some(&snapshot), &options))
                .collect()
        })
    }

    /// Insert or overwrite `key`
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.put_with(key, value, &WriteOptions::default())
    }

    pub fn put_with(&self, key: &[u8], value: &[u8], options: &WriteOptions) -> Result<()> {
        self.inner.write(&[BatchOp::put(key, value)], options)
    }

    /// Remove `key`; removing an absent key succeeds
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.delete_with(key, &WriteOptions::default())
    }

    pub fn delete_with(&self, key: &[u8], options: &WriteOptions) -> Result<()> {
        self.inner.write(&[BatchOp::delete(key)], options)
    }

    // =========================================================================
    // Batches, Iterators, Snapshots
    // =========================================================================

    /// Apply `operations` atomically
    pub fn write(&self, operations: Vec<BatchOp>) -> Result<()> {
        self.write_with(operations, &WriteOptions::default())
    }

    pub fn write_with(&self, operations: Vec<BatchOp>, options: &WriteOptions) -> Result<()> {
        self.inner.write(&operations, options)
    }

    /// Start an empty batch
    pub fn batch(&self) -> Batch<'_, E> {
        Batch::new(&self.inner)
    }

    /// Iterate a point-in-time view taken now
    pub fn iter(&self, options: IteratorOptions) -> Result<StoreIterator<E>> {
        self.inner.create_iterator(options, None)
    }

    /// Capture the current view for later reads
    pub fn snapshot(&self) -> Result<Snapshot<E>> {
        self.inner.create_snapshot()
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Approximate stored bytes for keys in `[start, end)`
    ///
    /// Missing bounds are open; an empty or inverted range reports 0.
    pub fn approximate_size(&self, start: Option<&[u8]>, end: Option<&[u8]>) -> Result<u64> {
        let range = KeyRange::new(start, end);
        if range.is_empty() {
            return self.inner.with_engine(|_| Ok(0));
        }
        self.inner.with_engine(|engine| engine.approximate_size(&range))
    }

    /// Engine property by name, `None` when the engine does not know it
    pub fn property(&self, name: &str) -> Result<Option<String>> {
        self.inner.with_engine(|engine| Ok(engine.property(name)))
    }
}

impl<E: StorageEngine> Drop for Store<E> {
    fn drop(&mut self) {
        if self.state().is_open() {
            tracing::warn!(
                location = %self.inner.location.display(),
                "Store dropped while open; closing"
            );
            if let Err(e) = self.close() {
                tracing::warn!(error = %e, "Close on drop failed");
            }
        }
    }
}
