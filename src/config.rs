//! Configuration for levelkv
//!
//! Open-time [`Options`] with sensible defaults, plus the per-call option
//! structs for reads, writes and iterators.

use crate::ordering::KeyRange;

/// Open-time options for a store
///
/// Everything below the lifecycle flags is engine tuning, passed through to
/// the engine untouched by the adapter.
#[derive(Debug, Clone)]
pub struct Options {
    // -------------------------------------------------------------------------
    // Lifecycle Flags
    // -------------------------------------------------------------------------
    /// Create the location if it holds no store yet
    pub create_if_missing: bool,

    /// Fail the open if the location already holds a store
    pub error_if_exists: bool,

    /// Verify every SSTable checksum while opening
    pub paranoid_checks: bool,

    // -------------------------------------------------------------------------
    // Engine Tuning
    // -------------------------------------------------------------------------
    /// Capacity of the SSTable value cache (in bytes, 0 disables it)
    pub cache_size: usize,

    /// Max size of the memtable before it is flushed to an SSTable (in bytes)
    pub write_buffer_size: usize,

    /// Sync strategy: how often to fsync the WAL
    pub wal_sync_strategy: WalSyncStrategy,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            error_if_exists: false,
            paranoid_checks: false,
            cache_size: 8 * 1024 * 1024,        // 8 MB
            write_buffer_size: 4 * 1024 * 1024, // 4 MB
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
        }
    }
}

impl Options {
    /// Create a new options builder
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }
}

/// Builder for Options
#[derive(Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create the location if it holds no store yet
    pub fn create_if_missing(mut self, yes: bool) -> Self {
        self.options.create_if_missing = yes;
        self
    }

    /// Fail the open if the location already holds a store
    pub fn error_if_exists(mut self, yes: bool) -> Self {
        self.options.error_if_exists = yes;
        self
    }

    /// Verify SSTable checksums during open
    pub fn paranoid_checks(mut self, yes: bool) -> Self {
        self.options.paranoid_checks = yes;
        self
    }

    /// Set the value cache capacity (in bytes)
    pub fn cache_size(mut self, bytes: usize) -> Self {
        self.options.cache_size = bytes;
        self
    }

    /// Set the memtable flush threshold (in bytes)
    pub fn write_buffer_size(mut self, bytes: usize) -> Self {
        self.options.write_buffer_size = bytes;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.options.wal_sync_strategy = strategy;
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

// =============================================================================
// Per-call Options
// =============================================================================

/// Options for a single read
#[derive(Debug, Clone, Copy)]
pub struct ReadOptions {
    /// Whether values read from SSTables should populate the value cache
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self { fill_cache: true }
    }
}

/// Options for a single write (point write or batch commit)
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// fsync the WAL before returning, regardless of the sync strategy
    pub sync: bool,
}

/// Options for creating an iterator
#[derive(Debug, Clone)]
pub struct IteratorOptions {
    /// Half-open key range `[start, end)` to visit
    pub range: KeyRange,

    /// Visit keys in descending order
    pub reverse: bool,

    /// Maximum number of pairs to return (`None` = unlimited)
    pub limit: Option<usize>,

    /// Whether values read from SSTables should populate the value cache
    pub fill_cache: bool,
}

impl Default for IteratorOptions {
    fn default() -> Self {
        Self {
            range: KeyRange::all(),
            reverse: false,
            limit: None,
            fill_cache: true,
        }
    }
}

impl IteratorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inclusive lower bound
    pub fn start(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.range.start = Some(key.into());
        self
    }

    /// Exclusive upper bound
    pub fn end(mut self, key: impl Into<Vec<u8>>) -> Self {
        self.range.end = Some(key.into());
        self
    }

    /// Replace both bounds
    pub fn range(mut self, range: KeyRange) -> Self {
        self.range = range;
        self
    }

    pub fn reverse(mut self, reverse: bool) -> Self {
        self.reverse = reverse;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn fill_cache(mut self, fill: bool) -> Self {
        self.fill_cache = fill;
        self
    }

    /// The read options implied by these iterator options
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            fill_cache: self.fill_cache,
        }
    }
}
