//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Keep every version of a key, tagged with its sequence number, so that
//!   snapshots taken at an older sequence keep seeing the data of that moment
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation and cursors
//!
//! ## Data Structure Choice
//! BTreeMap keyed by `(user_key, Reverse(sequence))` wrapped in a RwLock:
//! - All versions of one key are adjacent, newest first
//! - Range scans by user key stay a single ordered walk

mod table;

pub use table::{MemTable, MemTableIterator};

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    /// The value, or `None` for a tombstone
    pub fn into_value(self) -> Option<Vec<u8>> {
        match self {
            MemTableEntry::Value(value) => Some(value),
            MemTableEntry::Tombstone => None,
        }
    }

    /// Bytes of value carried by this entry
    pub fn value_len(&self) -> usize {
        match self {
            MemTableEntry::Value(value) => value.len(),
            MemTableEntry::Tombstone => 0,
        }
    }
}
