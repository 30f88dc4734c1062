//! SSTable Iterator
//!
//! Sequential walk over every entry of the data block, used to check a
//! table's integrity. Holds the reader's file lock for its whole lifetime.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use parking_lot::MutexGuard;

use crate::error::{LevelError, Result};
use crate::memtable::MemTableEntry;

use super::{HEADER_SIZE, TOMBSTONE_MARKER};

/// One data-block entry and the offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct BlockEntry {
    pub offset: u64,
    pub key: Vec<u8>,
    pub entry: MemTableEntry,
}

/// Iterator over SSTable entries in file order
pub struct SSTableIterator<'a> {
    file: MutexGuard<'a, BufReader<File>>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
}

impl<'a> SSTableIterator<'a> {
    /// Create a new iterator starting from the data block
    pub(super) fn new(mut file: MutexGuard<'a, BufReader<File>>, end_offset: u64) -> Result<Self> {
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: HEADER_SIZE,
        })
    }

    fn read_next(&mut self) -> Result<BlockEntry> {
        let offset = self.current_offset;
        let mut header = [0u8; 8];
        self.read_block(&mut header)?;

        let key_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let val_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        self.check_fits(key_len)?;
        let mut key = vec![0u8; key_len as usize];
        self.read_block(&mut key)?;

        let entry = if val_len == TOMBSTONE_MARKER {
            MemTableEntry::Tombstone
        } else {
            self.check_fits(val_len as u64)?;
            let mut value = vec![0u8; val_len as usize];
            self.read_block(&mut value)?;
            MemTableEntry::Value(value)
        };

        Ok(BlockEntry { offset, key, entry })
    }

    /// Lengths are read from the file, so bound them by the block before allocating
    fn check_fits(&self, len: u64) -> Result<()> {
        let remaining = self.end_offset - self.current_offset;
        if len > remaining {
            return Err(LevelError::Corruption(format!(
                "Entry field of {} bytes at offset {} overruns the data block ({} bytes left)",
                len, self.current_offset, remaining
            )));
        }
        Ok(())
    }

    fn read_block(&mut self, buf: &mut [u8]) -> Result<()> {
        self.check_fits(buf.len() as u64)?;
        self.file.read_exact(buf).map_err(|e| {
            LevelError::Corruption(format!(
                "Data block unreadable at offset {}: {}",
                self.current_offset, e
            ))
        })?;
        self.current_offset += buf.len() as u64;
        Ok(())
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    type Item = Result<BlockEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_offset >= self.end_offset {
            return None;
        }

        match self.read_next() {
            Ok(item) => Some(Ok(item)),
            Err(e) => {
                // Stop after the first failure
                self.current_offset = self.end_offset;
                Some(Err(e))
            }
        }
    }
}
