//! Storage Manager
//!
//! Manages multiple SSTables and coordinates reads/writes.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Hand out immutable table sets that snapshots can hold on to

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};
use crate::ordering::KeyRange;

use super::cache::ValueCache;
use super::{SSTable, SSTableBuilder, SSTableReader};

/// An immutable list of open tables, ordered newest → oldest
pub type TableSet = Arc<Vec<Arc<SSTableReader>>>;

/// Manages the storage layer
///
/// ## Concurrency:
/// - `sstables`: the current table set behind a RwLock; a flush installs a
///   new set instead of mutating the old one, so readers holding a set keep
///   a stable view
/// - `next_sstable_id`: Atomic counter (lock-free)
/// - All methods use `&self` (no exclusive access needed)
pub struct StorageManager {
    /// Directory where SSTables are stored
    data_dir: PathBuf,

    /// Current table set, newest first
    sstables: RwLock<TableSet>,

    /// Next ID for creating new SSTables (atomic, lock-free)
    next_sstable_id: AtomicU64,

    /// Value cache shared by all readers
    cache: Option<Arc<ValueCache>>,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Delete tables left half-built by an interrupted flush
    /// 3. Discover existing SSTable files
    /// 4. Open readers for each (loads indexes into RAM)
    /// 5. Order by ID descending (newest first)
    pub fn open(path: &Path, cache: Option<Arc<ValueCache>>) -> Result<Self> {
        fs::create_dir_all(path)?;

        let mut sstable_ids: Vec<u64> = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if !file_path.is_file() {
                continue;
            }
            if Self::is_partial_table(&file_path) {
                tracing::warn!(file = %file_path.display(), "Removing partial SSTable");
                fs::remove_file(&file_path)?;
            } else if let Some(id) = Self::parse_sstable_id(&file_path) {
                sstable_ids.push(id);
            }
        }

        // Newest first (highest ID first)
        sstable_ids.sort_unstable_by(|a, b| b.cmp(a));

        let mut sstables = Vec::with_capacity(sstable_ids.len());
        for id in &sstable_ids {
            let sstable_path = Self::sstable_path_with_dir(path, *id);
            sstables.push(Arc::new(SSTableReader::open(&sstable_path, *id, cache.clone())?));
        }

        let next_id = sstable_ids.first().map(|&id| id + 1).unwrap_or(1);

        tracing::debug!(
            dir = %path.display(),
            tables = sstables.len(),
            "Storage opened"
        );

        Ok(Self {
            data_dir: path.to_path_buf(),
            sstables: RwLock::new(Arc::new(sstables)),
            next_sstable_id: AtomicU64::new(next_id),
            cache,
        })
    }

    /// The current table set
    pub fn tables(&self) -> TableSet {
        Arc::clone(&self.sstables.read())
    }

    /// Get a key from the current table set (newest → oldest)
    ///
    /// Returns `Some(Tombstone)` when the newest table holding the key has it
    /// deleted, `None` when no table holds it.
    pub fn get(&self, key: &[u8], fill_cache: bool) -> Result<Option<MemTableEntry>> {
        Self::get_in(&self.tables(), key, fill_cache)
    }

    /// Get a key from a specific table set
    pub fn get_in(tables: &[Arc<SSTableReader>], key: &[u8], fill_cache: bool) -> Result<Option<MemTableEntry>> {
        for reader in tables {
            // Skip SSTable if key is outside its range (O(1) check)
            if !reader.might_contain(key) {
                continue;
            }
            if let Some(entry) = reader.get(key, fill_cache)? {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }

    /// Flush a MemTable to a new SSTable
    ///
    /// Writes the newest version of every key, opens a reader for the file
    /// and installs a new table set with it at the front. Returns `None` for
    /// an empty memtable.
    ///
    /// The table is built under a `.tmp` name, synced, then renamed into
    /// place, so a table file under its final name is always complete.
    pub fn flush(&self, memtable: &MemTable) -> Result<Option<SSTable>> {
        if memtable.is_empty() {
            return Ok(None);
        }

        let id = self.next_sstable_id.fetch_add(1, Ordering::SeqCst);
        let path = self.sstable_path(id);
        let tmp_path = Self::partial_path(&path);

        let mut metadata = match Self::build(&tmp_path, memtable) {
            Ok(metadata) => metadata,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&tmp_path) {
                    tracing::warn!(
                        file = %tmp_path.display(),
                        error = %cleanup,
                        "Failed to remove partial SSTable"
                    );
                }
                return Err(e);
            }
        };
        fs::rename(&tmp_path, &path)?;
        self.sync_dir()?;
        metadata.path = path.clone();

        let reader = Arc::new(SSTableReader::open(&path, id, self.cache.clone())?);

        let mut sstables = self.sstables.write();
        let mut next: Vec<Arc<SSTableReader>> = Vec::with_capacity(sstables.len() + 1);
        next.push(reader);
        next.extend(sstables.iter().cloned());
        *sstables = Arc::new(next);

        tracing::debug!(
            id,
            entries = metadata.entry_count,
            bytes = metadata.file_size,
            "Flushed memtable to SSTable"
        );

        Ok(Some(metadata))
    }

    /// Approximate stored bytes for `range` across the current table set
    pub fn approximate_size(&self, range: &KeyRange) -> u64 {
        self.tables()
            .iter()
            .map(|reader| reader.approximate_size(range))
            .sum()
    }

    /// Check every table's data checksum
    pub fn verify_checksums(&self) -> Result<()> {
        for reader in self.tables().iter() {
            reader.verify_checksum()?;
        }
        Ok(())
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.sstables.read().len()
    }

    /// Value cache, if enabled
    pub fn cache(&self) -> Option<&Arc<ValueCache>> {
        self.cache.as_ref()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Get the next SSTable ID (for testing/debugging)
    pub fn next_sstable_id(&self) -> u64 {
        self.next_sstable_id.load(Ordering::SeqCst)
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn build(path: &Path, memtable: &MemTable) -> Result<SSTable> {
        let mut builder = SSTableBuilder::new(path)?;
        for (key, entry) in memtable.iter() {
            match entry {
                MemTableEntry::Value(v) => builder.add(&key, &v)?,
                MemTableEntry::Tombstone => builder.add_tombstone(&key)?,
            }
        }
        builder.finish()
    }

    /// Make a rename in the table directory durable
    #[cfg(unix)]
    fn sync_dir(&self) -> Result<()> {
        File::open(&self.data_dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> Result<()> {
        Ok(())
    }

    /// "sstable_000042.sst" → "sstable_000042.sst.tmp"
    fn partial_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn is_partial_table(path: &Path) -> bool {
        path.extension().map_or(false, |ext| ext == "tmp")
            && path
                .file_stem()
                .and_then(|stem| Self::parse_sstable_id(Path::new(stem)))
                .is_some()
    }

    /// Generate the file path for an SSTable with given ID
    fn sstable_path(&self, id: u64) -> PathBuf {
        Self::sstable_path_with_dir(&self.data_dir, id)
    }

    /// Generate SSTable path given a directory and ID
    fn sstable_path_with_dir(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("sstable_{:06}.sst", id))
    }

    /// Parse SSTable ID from filename
    /// "sstable_000042.sst" → Some(42)
    fn parse_sstable_id(path: &Path) -> Option<u64> {
        if path.extension()? != "sst" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        let id_str = name.strip_prefix("sstable_")?;
        id_str.parse().ok()
    }
}
