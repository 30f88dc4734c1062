//! Engine snapshots
//!
//! A snapshot is the sequence number visible at its creation together with
//! the memtable and table set of that moment. Everything it references is
//! immutable below that sequence, so holding one never blocks writers.

use std::fmt;
use std::sync::Arc;

use crate::memtable::MemTable;
use crate::storage::TableSet;

/// Memtable and table set current at one moment
#[derive(Clone)]
pub(crate) struct Version {
    pub(crate) mem: Arc<MemTable>,
    pub(crate) tables: TableSet,
}

/// Point-in-time view of an [`LsmEngine`](super::LsmEngine)
#[derive(Clone)]
pub struct LsmSnapshot {
    pub(crate) sequence: u64,
    pub(crate) version: Version,
}

impl LsmSnapshot {
    /// Highest sequence number visible through this snapshot
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Number of SSTables pinned by this snapshot
    pub fn table_count(&self) -> usize {
        self.version.tables.len()
    }
}

impl fmt::Debug for LsmSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LsmSnapshot")
            .field("sequence", &self.sequence)
            .field("tables", &self.version.tables.len())
            .field("memtable_versions", &self.version.mem.entry_count())
            .finish()
    }
}
