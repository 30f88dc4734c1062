//! Engine Module
//!
//! The narrow primitive interface the store adapter drives, and the
//! log-structured engine shipped behind it.
//!
//! ## Responsibilities
//! - Point reads against the live view or a snapshot
//! - Atomic application of a batch of puts and deletes
//! - Snapshots and ordered cursors bound to them
//! - Size estimates and diagnostic properties
//!
//! The adapter only ever talks to [`StorageEngine`]; nothing above this
//! module reaches into the WAL, memtable or SSTables directly.

mod cursor;
mod lock;
mod lsm;
mod snapshot;

use std::path::Path;

use crate::config::{Options, ReadOptions, WriteOptions};
use crate::error::Result;
use crate::operation::BatchOp;
use crate::ordering::{Direction, KeyRange};

pub use cursor::LsmCursor;
pub use lock::LocationLock;
pub use lsm::LsmEngine;
pub use snapshot::LsmSnapshot;

/// Primitive operations of an ordered key-value engine
///
/// An engine owns exactly one storage location from `open` until `close`.
/// Snapshots and cursors stay usable on their own after they were handed
/// out; releasing either is dropping it.
pub trait StorageEngine: Send + Sync + Sized + 'static {
    /// Point-in-time view token
    type Snapshot: Clone + Send + Sync + 'static;

    /// Ordered cursor bound to a snapshot
    type Cursor: EngineCursor + 'static;

    /// Open (or create) the engine at `location`
    fn open(location: &Path, options: &Options) -> Result<Self>;

    /// Value of `key` in `snapshot`, or in the live view when `None`
    fn get(
        &self,
        key: &[u8],
        snapshot: Option<&Self::Snapshot>,
        options: &ReadOptions,
    ) -> Result<Option<Vec<u8>>>;

    /// Apply every operation or none of them
    fn apply_batch(&self, operations: &[BatchOp], options: &WriteOptions) -> Result<()>;

    /// Capture the current view
    fn snapshot(&self) -> Self::Snapshot;

    /// Cursor over `range` in `direction`
    ///
    /// Reads `snapshot` when given, otherwise a snapshot taken now.
    fn new_cursor(
        &self,
        range: KeyRange,
        direction: Direction,
        snapshot: Option<&Self::Snapshot>,
        options: &ReadOptions,
    ) -> Result<Self::Cursor>;

    /// Approximate stored bytes for keys in `range`
    fn approximate_size(&self, range: &KeyRange) -> Result<u64>;

    /// Diagnostic property by name, `None` when unknown
    fn property(&self, name: &str) -> Option<String>;

    /// Make everything durable and release the location
    fn close(self) -> Result<()>;
}

/// Pull cursor produced by [`StorageEngine::new_cursor`]
pub trait EngineCursor: Send {
    /// Position at the first in-range key at or past `target` in scan order
    ///
    /// Returns whether such a key exists; the following `next` yields it.
    fn seek(&mut self, target: &[u8]) -> Result<bool>;

    /// Next live pair in scan order, `None` once exhausted
    fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
}
