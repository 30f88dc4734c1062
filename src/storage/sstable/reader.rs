//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups and ordered seeks
//! via the in-memory index. The file handle sits behind a mutex so one
//! reader can be shared by every snapshot that includes the table.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{LevelError, Result};
use crate::memtable::MemTableEntry;
use crate::ordering::{Direction, KeyRange};
use crate::storage::cache::ValueCache;

use super::iterator::{BlockEntry, SSTableIterator};
use super::{FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    /// Table id (from the file name)
    id: u64,
    path: PathBuf,
    /// File handle for reading entries
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Index block starting offset (end of the data block)
    index_offset: u64,
    data_crc: u32,
    file_size: u64,
    cache: Option<Arc<ValueCache>>,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Loads the entire index into memory for fast lookups.
    pub fn open(path: &Path, id: u64, cache: Option<Arc<ValueCache>>) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(LevelError::Corruption(format!(
                "SSTable {} too small: {} bytes",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(LevelError::Corruption(format!(
                "Invalid SSTable magic: expected LVKV, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(LevelError::Corruption(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = read_u64(&header[6..14]);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = read_u64(&footer[0..8]);
        let data_crc = read_u32(&footer[8..12]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(LevelError::Corruption(format!(
                "SSTable {} has index offset {} outside the file",
                path.display(),
                index_offset
            )));
        }

        // Index block size = file_size - footer_size - index_offset
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.seek(SeekFrom::Start(index_offset))?;
        file.read_exact(&mut index_data)?;

        // [key_len(4)][offset(8)][key]
        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(LevelError::Corruption(format!(
                    "Truncated index entry in {}",
                    path.display()
                )));
            }
            let key_len = read_u32(&index_data[pos..pos + 4]) as usize;
            let offset = read_u64(&index_data[pos + 4..pos + 12]);
            pos += 12;

            if pos + key_len > index_data.len() {
                return Err(LevelError::Corruption(format!(
                    "Truncated index key in {}",
                    path.display()
                )));
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        if index.len() as u64 != entry_count {
            return Err(LevelError::Corruption(format!(
                "SSTable {} header claims {} entries, index holds {}",
                path.display(),
                entry_count,
                index.len()
            )));
        }

        Ok(Self {
            id,
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
            index_offset,
            data_crc,
            file_size,
            cache,
        })
    }

    /// Get a value by key through the in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(Value))`: key found with value
    /// - `Ok(Some(Tombstone))`: key found but deleted
    /// - `Ok(None)`: key not in this SSTable
    pub fn get(&self, key: &[u8], fill_cache: bool) -> Result<Option<MemTableEntry>> {
        match self.index.get(key) {
            Some(&offset) => {
                let (_, entry) = self.read_entry(offset, fill_cache)?;
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    /// First entry reached from `bound` in `direction`
    ///
    /// For forward scans `bound` is a lower bound, for reverse scans an upper
    /// bound. Tombstones are returned as such.
    pub fn seek(
        &self,
        bound: &Bound<Vec<u8>>,
        direction: Direction,
        fill_cache: bool,
    ) -> Result<Option<(Vec<u8>, MemTableEntry)>> {
        let offset = match direction {
            Direction::Forward => self
                .index
                .range::<Vec<u8>, _>((bound.clone(), Bound::Unbounded))
                .next()
                .map(|(_, &offset)| offset),
            Direction::Reverse => self
                .index
                .range::<Vec<u8>, _>((Bound::Unbounded, bound.clone()))
                .next_back()
                .map(|(_, &offset)| offset),
        };

        match offset {
            Some(offset) => self.read_entry(offset, fill_cache).map(Some),
            None => Ok(None),
        }
    }

    /// Data-block offset where entries at or past `key` begin
    ///
    /// `None` as a start means the beginning of the data block, `None` as an
    /// end means its end.
    fn approximate_offset_of(&self, key: Option<&[u8]>, default: u64) -> u64 {
        match key {
            Some(key) => self
                .index
                .range::<[u8], _>((Bound::Included(key), Bound::Unbounded))
                .next()
                .map(|(_, &offset)| offset)
                .unwrap_or(self.index_offset),
            None => default,
        }
    }

    /// Bytes of the data block covering keys in `range`
    pub fn approximate_size(&self, range: &KeyRange) -> u64 {
        if range.is_empty() {
            return 0;
        }
        let start = self.approximate_offset_of(range.start(), HEADER_SIZE);
        let end = self.approximate_offset_of(range.end(), self.index_offset);
        end.saturating_sub(start)
    }

    /// Read the entry at `offset`, through the value cache when present
    fn read_entry(&self, offset: u64, fill_cache: bool) -> Result<(Vec<u8>, MemTableEntry)> {
        if let Some(cache) = &self.cache {
            if let Some(hit) = cache.get(self.id, offset) {
                return Ok(hit);
            }
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;

        let key_len = read_u32(&header[0..4]) as u64;
        let val_len = read_u32(&header[4..8]);

        let value_bytes = if val_len == TOMBSTONE_MARKER { 0 } else { val_len as u64 };
        if offset + 8 + key_len + value_bytes > self.index_offset {
            return Err(LevelError::Corruption(format!(
                "Entry at offset {} overruns the data block of {}",
                offset,
                self.path.display()
            )));
        }

        let mut key = vec![0u8; key_len as usize];
        file.read_exact(&mut key)?;

        let entry = if val_len == TOMBSTONE_MARKER {
            MemTableEntry::Tombstone
        } else {
            let mut value = vec![0u8; val_len as usize];
            file.read_exact(&mut value)?;
            MemTableEntry::Value(value)
        };
        drop(file);

        if fill_cache {
            if let Some(cache) = &self.cache {
                cache.insert(self.id, offset, key.clone(), entry.clone());
            }
        }

        Ok((key, entry))
    }

    /// Walk the data block and check it against the footer and the index
    ///
    /// Every entry must decode, keys must be strictly ascending, each entry
    /// must sit at the offset the index records for its key, the entry count
    /// must match the header, and the recomputed data CRC must match the
    /// footer.
    pub fn verify_checksum(&self) -> Result<()> {
        let mut hasher = crc32fast::Hasher::new();
        let mut previous: Option<Vec<u8>> = None;
        let mut count = 0u64;

        for item in self.iter()? {
            let BlockEntry { offset, key, entry } = item.map_err(|e| self.corrupt(e))?;

            if previous.as_ref().map_or(false, |prev| key <= *prev) {
                return Err(self.corrupt(format!("key out of order at offset {}", offset)));
            }
            if self.index.get(&key) != Some(&offset) {
                return Err(self.corrupt(format!(
                    "entry at offset {} does not match the index",
                    offset
                )));
            }

            let val_len = match &entry {
                MemTableEntry::Value(v) => v.len() as u32,
                MemTableEntry::Tombstone => TOMBSTONE_MARKER,
            };
            hasher.update(&(key.len() as u32).to_le_bytes());
            hasher.update(&val_len.to_le_bytes());
            hasher.update(&key);
            if let MemTableEntry::Value(v) = &entry {
                hasher.update(v);
            }

            count += 1;
            previous = Some(key);
        }

        if count != self.entry_count {
            return Err(self.corrupt(format!(
                "holds {} entries, header says {}",
                count, self.entry_count
            )));
        }

        let actual = hasher.finalize();
        if actual != self.data_crc {
            return Err(self.corrupt(format!(
                "data CRC mismatch: expected 0x{:08x}, got 0x{:08x}",
                self.data_crc, actual
            )));
        }
        Ok(())
    }

    fn corrupt(&self, detail: impl std::fmt::Display) -> LevelError {
        LevelError::Corruption(format!("SSTable {}: {}", self.path.display(), detail))
    }

    /// Table id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Path of the table file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Size of the file on disk
    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    /// Walk every entry of the data block in file order
    pub fn iter(&self) -> Result<SSTableIterator<'_>> {
        SSTableIterator::new(self.file.lock(), self.index_offset)
    }
}

fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(buf)
}

fn read_u64(bytes: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(buf)
}
