//! Log-structured engine
//!
//! The storage engine that coordinates WAL, memtable and SSTables.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Handle concurrent read/write access through sequence numbers
//! - Trigger flushes when the memtable is full
//! - Manage crash recovery on startup

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::{Options, ReadOptions, WriteOptions};
use crate::error::{LevelError, Result};
use crate::memtable::{MemTable, MemTableEntry};
use crate::operation::BatchOp;
use crate::ordering::{Direction, KeyRange};
use crate::storage::{StorageManager, ValueCache};
use crate::wal::{WalRecovery, WalWriter};

use super::cursor::LsmCursor;
use super::lock::LocationLock;
use super::snapshot::{LsmSnapshot, Version};
use super::StorageEngine;

/// Largest key or value the SSTable format can hold
pub const MAX_ENTRY_SIZE: usize = u32::MAX as usize - 1;

/// The shipped storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (batches/flush): Serialized by `write_lock`
///   - Only ONE write operation at a time
///   - Must acquire: write_lock → WAL → memtable → version (on flush)
///   - A batch is inserted into the memtable first and published by
///     advancing `last_sequence`, so readers see all of it or none of it
///
/// - **Reads** (get/cursors): never take `write_lock`
///   - A read first captures a snapshot: the current version plus
///     `last_sequence`, both read under the version lock
///   - Memtable versions newer than the snapshot sequence are skipped
///   - A flush installs a new version instead of clearing the memtable, so
///     snapshots keep reading the memtable they captured
pub struct LsmEngine {
    /// Engine options
    options: Options,

    /// Root location of the store
    location: PathBuf,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// Memtable and table set current right now
    version: RwLock<Version>,

    /// Persistent storage manager
    storage: StorageManager,

    /// Highest sequence number visible to readers
    last_sequence: AtomicU64,

    /// Serializes write operations (batches/flush)
    write_lock: Mutex<()>,

    /// Claim on `location`, released when the engine drops
    _lock: LocationLock,
}

impl LsmEngine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const WAL_FILENAME: &'static str = "wal.log";
    const SSTABLE_DIR: &'static str = "sstables";

    /// Open or create an engine at `location`
    ///
    /// On startup:
    /// 1. Honour `create_if_missing` / `error_if_exists`
    /// 2. Claim the location
    /// 3. Load existing SSTables
    /// 4. Recover from the WAL and flush what it held
    /// 5. Ready to serve requests
    pub fn open_with(location: &Path, options: Options) -> Result<Self> {
        let wal_path = location.join(Self::WAL_FILENAME);
        let storage_dir = location.join(Self::SSTABLE_DIR);

        // Step 1: Decide whether a store already lives here
        let exists = wal_path.exists() || storage_dir.exists();
        if exists && options.error_if_exists {
            return Err(LevelError::InvalidArgument(format!(
                "{}: exists (error_if_exists is true)",
                location.display()
            )));
        }
        if !exists && !options.create_if_missing {
            return Err(LevelError::InvalidArgument(format!(
                "{}: does not exist (create_if_missing is false)",
                location.display()
            )));
        }
        fs::create_dir_all(&storage_dir)?;

        // Step 2: At most one engine per location
        let lock = LocationLock::acquire(location)?;

        // Step 3: Open storage manager (loads existing SSTables)
        let cache = (options.cache_size > 0).then(|| Arc::new(ValueCache::new(options.cache_size)));
        let storage = StorageManager::open(&storage_dir, cache)?;
        if options.paranoid_checks {
            storage.verify_checksums()?;
        }

        // Step 4: Replay the WAL and flush it so the recovered data is durable
        let mut recovered_lsn = 0;
        if wal_path.exists() {
            let (entries, result) = WalRecovery::recover(&wal_path)?;
            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    "WAL recovery"
                );
            }

            let memtable = MemTable::new();
            for entry in &entries {
                memtable.apply(entry.lsn, &entry.operations);
            }
            if !memtable.is_empty() {
                tracing::info!(
                    versions = memtable.entry_count(),
                    "Flushing recovered entries to SSTable"
                );
                storage.flush(&memtable)?;
            }
            recovered_lsn = result.last_lsn;
        }

        let mut wal = WalWriter::open(&wal_path, options.wal_sync_strategy)?;
        wal.truncate()?;
        wal.advance_lsn(recovered_lsn + 1);
        let last_sequence = wal.current_lsn() - 1;

        tracing::info!(
            location = %location.display(),
            sstables = storage.sstable_count(),
            last_sequence,
            "Engine opened"
        );

        let version = Version {
            mem: Arc::new(MemTable::new()),
            tables: storage.tables(),
        };

        Ok(Self {
            options,
            location: location.to_path_buf(),
            storage_dir,
            wal: Mutex::new(wal),
            version: RwLock::new(version),
            storage,
            last_sequence: AtomicU64::new(last_sequence),
            write_lock: Mutex::new(()),
            _lock: lock,
        })
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_locked()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_locked(&self) -> Result<()> {
        let mem = Arc::clone(&self.version.read().mem);
        if mem.is_empty() {
            return Ok(());
        }

        // Step 1: Write the memtable out as a new SSTable
        self.storage.flush(&mem)?;

        // Step 2: Install a fresh memtable alongside the new table set
        {
            let mut version = self.version.write();
            *version = Version {
                mem: Arc::new(MemTable::new()),
                tables: self.storage.tables(),
            };
        }

        // Step 3: Truncate WAL (entries are now durable in SSTable)
        self.wal.lock().truncate()?;

        Ok(())
    }

    fn validate(operations: &[BatchOp]) -> Result<()> {
        for op in operations {
            let too_big = op.key().len() > MAX_ENTRY_SIZE
                || matches!(op, BatchOp::Put { value, .. } if value.len() > MAX_ENTRY_SIZE);
            if too_big {
                return Err(LevelError::InvalidArgument(
                    "Key or value exceeds the maximum entry size".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn capture(&self) -> LsmSnapshot {
        let version = self.version.read();
        LsmSnapshot {
            sequence: self.last_sequence.load(Ordering::SeqCst),
            version: version.clone(),
        }
    }

    fn stats(&self) -> String {
        let snapshot = self.capture();
        let mut out = String::new();
        let _ = writeln!(out, "last sequence: {}", snapshot.sequence);
        let _ = writeln!(
            out,
            "memtable: {} bytes, {} versions",
            snapshot.version.mem.size(),
            snapshot.version.mem.entry_count()
        );
        let _ = writeln!(
            out,
            "sstables: {} files, {} bytes",
            snapshot.version.tables.len(),
            snapshot.version.tables.iter().map(|t| t.file_size()).sum::<u64>()
        );
        if let Some(cache) = self.storage.cache() {
            let stats = cache.stats();
            let _ = writeln!(
                out,
                "cache: {}/{} bytes, {} entries, {} hits, {} misses",
                stats.used, stats.capacity, stats.entries, stats.hits, stats.misses
            );
        }
        out
    }

    fn sstable_listing(&self) -> String {
        let mut out = String::new();
        for table in self.version.read().tables.iter() {
            let _ = writeln!(
                out,
                "{} entries={} bytes={}",
                table.id(),
                table.entry_count(),
                table.file_size()
            );
        }
        out
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the store location
    pub fn data_dir(&self) -> &Path {
        &self.location
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.version.read().mem.size()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Highest sequence number visible to readers
    pub fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::SeqCst)
    }

    /// Get the options the engine was opened with
    pub fn options(&self) -> &Options {
        &self.options
    }
}

impl StorageEngine for LsmEngine {
    type Snapshot = LsmSnapshot;
    type Cursor = LsmCursor;

    fn open(location: &Path, options: &Options) -> Result<Self> {
        Self::open_with(location, options.clone())
    }

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes visible at the snapshot)
    /// 2. SSTables (newest to oldest)
    fn get(
        &self,
        key: &[u8],
        snapshot: Option<&LsmSnapshot>,
        options: &ReadOptions,
    ) -> Result<Option<Vec<u8>>> {
        let captured;
        let snapshot = match snapshot {
            Some(snapshot) => snapshot,
            None => {
                captured = self.capture();
                &captured
            }
        };

        if let Some(entry) = snapshot.version.mem.get(key, snapshot.sequence) {
            return Ok(entry.into_value());
        }

        let entry = StorageManager::get_in(&snapshot.version.tables, key, options.fill_cache)?;
        Ok(entry.and_then(MemTableEntry::into_value))
    }

    /// Apply a batch
    ///
    /// Steps:
    /// 1. Acquire write lock
    /// 2. Write one WAL record for the whole batch (durability)
    /// 3. Insert every operation into the memtable
    /// 4. Publish the batch's last sequence
    /// 5. Check if flush needed
    fn apply_batch(&self, operations: &[BatchOp], options: &WriteOptions) -> Result<()> {
        if operations.is_empty() {
            return Ok(());
        }
        Self::validate(operations)?;

        let _write_guard = self.write_lock.lock();

        let first = self.wal.lock().append_batch(operations, options.sync)?;
        let last = first + operations.len() as u64 - 1;

        let mem = Arc::clone(&self.version.read().mem);
        let size = mem.apply(first, operations);
        self.last_sequence.store(last, Ordering::SeqCst);

        tracing::debug!(ops = operations.len(), first, last, "Applied batch");

        if size >= self.options.write_buffer_size {
            // The batch is already durable in the WAL; a failed flush leaves
            // it in the memtable for the next attempt.
            if let Err(e) = self.flush_locked() {
                tracing::warn!(error = %e, "Memtable flush failed");
            }
        }

        Ok(())
    }

    fn snapshot(&self) -> LsmSnapshot {
        self.capture()
    }

    fn new_cursor(
        &self,
        range: KeyRange,
        direction: Direction,
        snapshot: Option<&LsmSnapshot>,
        options: &ReadOptions,
    ) -> Result<LsmCursor> {
        let snapshot = match snapshot {
            Some(snapshot) => snapshot.clone(),
            None => self.capture(),
        };
        tracing::debug!(
            sequence = snapshot.sequence,
            tables = snapshot.table_count(),
            ?direction,
            "Cursor created"
        );
        Ok(LsmCursor::new(snapshot, range, direction, options.fill_cache))
    }

    fn approximate_size(&self, range: &KeyRange) -> Result<u64> {
        if range.is_empty() {
            return Ok(0);
        }
        let version = self.version.read().clone();
        let mem = version.mem.approximate_size(range);
        let tables: u64 = version
            .tables
            .iter()
            .map(|table| table.approximate_size(range))
            .sum();
        Ok(mem + tables)
    }

    fn property(&self, name: &str) -> Option<String> {
        match name {
            "levelkv.num-files" => Some(self.sstable_count().to_string()),
            "levelkv.sstables" => Some(self.sstable_listing()),
            "levelkv.stats" => Some(self.stats()),
            "levelkv.approximate-memory-usage" => {
                let cached = self.storage.cache().map_or(0, |c| c.stats().used);
                Some((self.memtable_size() + cached).to_string())
            }
            "levelkv.last-sequence" => Some(self.last_sequence().to_string()),
            _ => None,
        }
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    fn close(self) -> Result<()> {
        self.flush()?;
        self.wal.lock().sync()?;

        tracing::info!(
            location = %self.location.display(),
            sstables = self.storage.sstable_count(),
            "Engine closed"
        );
        Ok(())
    }
}
