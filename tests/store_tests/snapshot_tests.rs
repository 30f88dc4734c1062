//! Tests for explicit snapshots, size estimates and properties
//!
//! These tests verify:
//! - Snapshot reads and iterators ignore later writes, across flushes
//! - Released and closed-over snapshots refuse reads
//! - Closing the store drops every view it handed out
//! - Size estimates and properties need an open store

#[path = "../common/mod.rs"]
mod common;

use std::cell::RefCell;
use std::path::Path;
use std::sync::{Arc, Weak};

use common::{keys_of, open_store, open_store_with, small_buffer_options, temp_location, test_options};
use levelkv::config::{Options, ReadOptions, WriteOptions};
use levelkv::engine::{LsmCursor, LsmEngine, LsmSnapshot, StorageEngine};
use levelkv::operation::BatchOp;
use levelkv::ordering::{Direction, KeyRange};
use levelkv::{IteratorOptions, LevelError, Result, SnapshotState, Store};

// =============================================================================
// View Tracking
// =============================================================================

thread_local! {
    static VIEWS: RefCell<Vec<Weak<LsmSnapshot>>> = RefCell::new(Vec::new());
}

/// Views handed out on this thread that something still holds
fn live_views() -> usize {
    VIEWS.with(|views| views.borrow().iter().filter(|v| v.strong_count() > 0).count())
}

/// Engine that records every snapshot view it hands out (per test thread)
struct TrackingEngine {
    inner: LsmEngine,
}

impl StorageEngine for TrackingEngine {
    type Snapshot = Arc<LsmSnapshot>;
    type Cursor = LsmCursor;

    fn open(location: &Path, options: &Options) -> Result<Self> {
        Ok(Self {
            inner: LsmEngine::open(location, options)?,
        })
    }

    fn get(
        &self,
        key: &[u8],
        snapshot: Option<&Arc<LsmSnapshot>>,
        options: &ReadOptions,
    ) -> Result<Option<Vec<u8>>> {
        self.inner.get(key, snapshot.map(Arc::as_ref), options)
    }

    fn apply_batch(&self, operations: &[BatchOp], options: &WriteOptions) -> Result<()> {
        self.inner.apply_batch(operations, options)
    }

    fn snapshot(&self) -> Arc<LsmSnapshot> {
        let view = Arc::new(self.inner.snapshot());
        VIEWS.with(|views| views.borrow_mut().push(Arc::downgrade(&view)));
        view
    }

    fn new_cursor(
        &self,
        range: KeyRange,
        direction: Direction,
        snapshot: Option<&Arc<LsmSnapshot>>,
        options: &ReadOptions,
    ) -> Result<LsmCursor> {
        self.inner
            .new_cursor(range, direction, snapshot.map(Arc::as_ref), options)
    }

    fn approximate_size(&self, range: &KeyRange) -> Result<u64> {
        self.inner.approximate_size(range)
    }

    fn property(&self, name: &str) -> Option<String> {
        self.inner.property(name)
    }

    fn close(self) -> Result<()> {
        self.inner.close()
    }
}

fn open_tracking_store() -> (tempfile::TempDir, Store<TrackingEngine>) {
    common::init_tracing();
    VIEWS.with(|views| views.borrow_mut().clear());
    let (temp_dir, location) = temp_location();
    let store = Store::<TrackingEngine>::new(&location);
    store.open(&test_options()).unwrap();
    (temp_dir, store)
}

// =============================================================================
// Snapshot Tests
// =============================================================================

#[test]
fn test_snapshot_reads_ignore_later_writes() {
    let (_temp, store) = open_store();
    store.put(b"a", b"1").unwrap();
    store.put(b"b", b"1").unwrap();

    let snapshot = store.snapshot().unwrap();
    store.put(b"a", b"2").unwrap();
    store.delete(b"b").unwrap();
    store.put(b"c", b"new").unwrap();

    assert_eq!(snapshot.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(snapshot.get(b"b").unwrap(), Some(b"1".to_vec()));
    assert_eq!(
        snapshot
            .get_with(b"c", &ReadOptions { fill_cache: false })
            .unwrap(),
        None
    );

    let mut it = snapshot.iter(IteratorOptions::new()).unwrap();
    assert_eq!(keys_of(&it.collect_remaining().unwrap()), ["a", "b"]);

    assert_eq!(store.get(b"a").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_snapshot_survives_flushes() {
    let (_temp, store) = open_store_with(&small_buffer_options());
    store.put(b"pinned", b"old").unwrap();
    let snapshot = store.snapshot().unwrap();

    for i in 0..100 {
        store.put(format!("fill{:03}", i).as_bytes(), &[0u8; 32]).unwrap();
    }
    store.put(b"pinned", b"new").unwrap();

    assert_eq!(snapshot.get(b"pinned").unwrap(), Some(b"old".to_vec()));
    assert_eq!(snapshot.get(b"fill050").unwrap(), None);
    assert_eq!(store.get(b"pinned").unwrap(), Some(b"new".to_vec()));
}

#[test]
fn test_released_snapshot_is_unusable() {
    let (_temp, store) = open_store();
    store.put(b"a", b"1").unwrap();
    let snapshot = store.snapshot().unwrap();

    snapshot.release();
    snapshot.release();

    assert!(snapshot.is_released());
    assert!(matches!(snapshot.get(b"a"), Err(LevelError::SnapshotReleased)));
    assert!(matches!(
        snapshot.iter(IteratorOptions::new()),
        Err(LevelError::SnapshotReleased)
    ));
}

#[test]
fn test_snapshot_after_close() {
    let (_temp, store) = open_store();
    let snapshot = store.snapshot().unwrap();
    let released = store.snapshot().unwrap();
    released.release();
    store.close().unwrap();

    assert!(matches!(snapshot.get(b"a"), Err(LevelError::NotOpen)));
    assert!(matches!(
        snapshot.iter(IteratorOptions::new()),
        Err(LevelError::NotOpen)
    ));
    assert!(matches!(released.get(b"a"), Err(LevelError::SnapshotReleased)));
    assert_eq!(snapshot.state(), SnapshotState::Invalidated);
    assert_eq!(released.state(), SnapshotState::Released);
}

#[test]
fn test_close_drops_outstanding_views() {
    let (_temp, store) = open_tracking_store();
    store.put(b"a", b"1").unwrap();

    let held = store.snapshot().unwrap();
    let released = store.snapshot().unwrap();
    released.release();
    assert_eq!(held.get(b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(live_views(), 1);

    store.close().unwrap();

    assert_eq!(live_views(), 0);
    assert_eq!(held.state(), SnapshotState::Invalidated);
    assert!(matches!(held.get(b"a"), Err(LevelError::NotOpen)));
    assert!(!held.is_released());
}

#[test]
fn test_dropping_snapshot_releases_view() {
    let (_temp, store) = open_tracking_store();
    let snapshot = store.snapshot().unwrap();
    assert_eq!(live_views(), 1);

    drop(snapshot);
    assert_eq!(live_views(), 0);
    store.close().unwrap();
}

#[test]
fn test_snapshot_iterator_is_released_independently() {
    let (_temp, store) = open_store();
    store.put(b"a", b"1").unwrap();
    let snapshot = store.snapshot().unwrap();

    let mut it = snapshot.iter(IteratorOptions::new()).unwrap();
    snapshot.release();

    // The iterator holds its own view
    assert_eq!(it.next().unwrap(), Some((b"a".to_vec(), b"1".to_vec())));
}

// =============================================================================
// Approximate Size Tests
// =============================================================================

#[test]
fn test_approximate_size_empty_store() {
    let (_temp, store) = open_store();
    assert_eq!(store.approximate_size(None, None).unwrap(), 0);
}

#[test]
fn test_approximate_size_grows_with_data() {
    let (_temp, store) = open_store_with(&small_buffer_options());
    for i in 0..100 {
        store.put(format!("k{:03}", i).as_bytes(), &[1u8; 100]).unwrap();
    }

    let all = store.approximate_size(None, None).unwrap();
    let half = store.approximate_size(Some(b"k000"), Some(b"k050")).unwrap();
    let tail = store.approximate_size(Some(b"k050"), None).unwrap();
    let head = store.approximate_size(None, Some(b"k010")).unwrap();

    assert!(all >= 100 * 100);
    assert!(half > 0 && half <= all);
    assert!(tail > 0 && tail <= all);
    assert!(head <= half);
}

#[test]
fn test_approximate_size_empty_and_inverted_ranges() {
    let (_temp, store) = open_store();
    store.put(b"m", &[0u8; 256]).unwrap();

    assert_eq!(store.approximate_size(Some(b"m"), Some(b"m")).unwrap(), 0);
    assert_eq!(store.approximate_size(Some(b"z"), Some(b"a")).unwrap(), 0);
    assert_eq!(store.approximate_size(Some(b"x"), Some(b"y")).unwrap(), 0);
    assert!(store.approximate_size(Some(b"a"), Some(b"z")).unwrap() > 0);
}

#[test]
fn test_approximate_size_requires_open_store() {
    let (_temp, store) = open_store();
    store.close().unwrap();

    assert!(matches!(
        store.approximate_size(Some(b"z"), Some(b"a")),
        Err(LevelError::NotOpen)
    ));
}

// =============================================================================
// Property Tests
// =============================================================================

#[test]
fn test_known_properties() {
    let (_temp, store) = open_store_with(&small_buffer_options());
    for i in 0..50 {
        store.put(format!("k{:02}", i).as_bytes(), &[7u8; 32]).unwrap();
    }

    let files: usize = store
        .property("levelkv.num-files")
        .unwrap()
        .unwrap()
        .parse()
        .unwrap();
    assert!(files > 0);

    let sequence: u64 = store
        .property("levelkv.last-sequence")
        .unwrap()
        .unwrap()
        .parse()
        .unwrap();
    assert_eq!(sequence, 50);

    let stats = store.property("levelkv.stats").unwrap().unwrap();
    assert!(!stats.is_empty());
    assert!(store.property("levelkv.sstables").unwrap().is_some());
    assert!(store
        .property("levelkv.approximate-memory-usage")
        .unwrap()
        .is_some());
}

#[test]
fn test_unknown_property_is_none() {
    let (_temp, store) = open_store();
    assert_eq!(store.property("levelkv.nope").unwrap(), None);
    assert_eq!(store.property("").unwrap(), None);
}

#[test]
fn test_property_requires_open_store() {
    let (_temp, store) = open_store();
    store.close().unwrap();
    assert!(matches!(
        store.property("levelkv.stats"),
        Err(LevelError::NotOpen)
    ));
}
