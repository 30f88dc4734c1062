//! Tests for SSTable builder and reader
//!
//! These tests verify:
//! - Building tables with values and tombstones
//! - Point lookups and ordered seeks
//! - Range size estimates from index offsets
//! - Checksum verification and the value cache
//! - Rejection of malformed files

use std::fs;
use std::ops::Bound;
use std::path::PathBuf;
use std::sync::Arc;

use levelkv::memtable::MemTableEntry;
use levelkv::ordering::{Direction, KeyRange};
use levelkv::storage::{BlockEntry, SSTableBuilder, SSTableReader, ValueCache};
use levelkv::LevelError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_sstable() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sstable_000001.sst");
    (temp_dir, path)
}

/// Table holding a..e with "c" deleted
fn build_sample(path: &PathBuf) {
    let mut builder = SSTableBuilder::new(path).unwrap();
    builder.add(b"a", b"apple").unwrap();
    builder.add(b"b", b"banana").unwrap();
    builder.add_tombstone(b"c").unwrap();
    builder.add(b"d", b"date").unwrap();
    builder.add(b"e", b"elderberry").unwrap();
    builder.finish().unwrap();
}

fn open(path: &PathBuf) -> SSTableReader {
    SSTableReader::open(path, 1, None).unwrap()
}

// =============================================================================
// Builder Tests
// =============================================================================

#[test]
fn test_builder_reports_metadata() {
    let (_temp, path) = setup_temp_sstable();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"k1", b"v1").unwrap();
    builder.add_tombstone(b"k2").unwrap();
    let meta = builder.finish().unwrap();

    assert_eq!(meta.entry_count, 2);
    assert_eq!(meta.min_key, b"k1".to_vec());
    assert_eq!(meta.max_key, b"k2".to_vec());
    assert_eq!(meta.file_size, fs::metadata(&path).unwrap().len());
}

#[test]
fn test_builder_rejects_unsorted_keys() {
    let (_temp, path) = setup_temp_sstable();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"b", b"1").unwrap();

    assert!(matches!(builder.add(b"a", b"2"), Err(LevelError::Storage(_))));
    assert!(matches!(builder.add(b"b", b"2"), Err(LevelError::Storage(_))));
}

#[test]
fn test_empty_table_opens() {
    let (_temp, path) = setup_temp_sstable();
    SSTableBuilder::new(&path).unwrap().finish().unwrap();

    let reader = open(&path);
    assert_eq!(reader.entry_count(), 0);
    assert_eq!(reader.min_key(), None);
    assert_eq!(reader.seek(&Bound::Unbounded, Direction::Forward, true).unwrap(), None);
}

// =============================================================================
// Lookup Tests
// =============================================================================

#[test]
fn test_get_values_tombstones_and_misses() {
    let (_temp, path) = setup_temp_sstable();
    build_sample(&path);
    let reader = open(&path);

    assert_eq!(
        reader.get(b"b", true).unwrap(),
        Some(MemTableEntry::Value(b"banana".to_vec()))
    );
    assert_eq!(reader.get(b"c", true).unwrap(), Some(MemTableEntry::Tombstone));
    assert_eq!(reader.get(b"cc", true).unwrap(), None);
    assert!(reader.might_contain(b"cc"));
    assert!(!reader.might_contain(b"f"));
}

#[test]
fn test_seek_both_directions() {
    let (_temp, path) = setup_temp_sstable();
    build_sample(&path);
    let reader = open(&path);

    let key = |b: Bound<Vec<u8>>, d: Direction| {
        reader
            .seek(&b, d, false)
            .unwrap()
            .map(|(k, _)| String::from_utf8(k).unwrap())
    };

    assert_eq!(key(Bound::Included(b"bb".to_vec()), Direction::Forward), Some("c".into()));
    assert_eq!(key(Bound::Excluded(b"d".to_vec()), Direction::Forward), Some("e".into()));
    assert_eq!(key(Bound::Excluded(b"e".to_vec()), Direction::Forward), None);
    assert_eq!(key(Bound::Included(b"bb".to_vec()), Direction::Reverse), Some("b".into()));
    assert_eq!(key(Bound::Excluded(b"b".to_vec()), Direction::Reverse), Some("a".into()));
    assert_eq!(key(Bound::Unbounded, Direction::Reverse), Some("e".into()));
    assert_eq!(key(Bound::Excluded(b"a".to_vec()), Direction::Reverse), None);
}

#[test]
fn test_iterator_includes_tombstones() {
    let (_temp, path) = setup_temp_sstable();
    build_sample(&path);
    let reader = open(&path);

    let entries: Vec<BlockEntry> = reader.iter().unwrap().collect::<Result<_, _>>().unwrap();
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0].offset, 14);
    assert_eq!(entries[2].key, b"c".to_vec());
    assert_eq!(entries[2].entry, MemTableEntry::Tombstone);
    assert!(entries.windows(2).all(|pair| pair[0].offset < pair[1].offset));
}

// =============================================================================
// Size Estimate Tests
// =============================================================================

#[test]
fn test_approximate_size_is_monotonic() {
    let (_temp, path) = setup_temp_sstable();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    for i in 0..100 {
        builder
            .add(format!("key{:03}", i).as_bytes(), &[7u8; 64])
            .unwrap();
    }
    builder.finish().unwrap();
    let reader = open(&path);

    let all = reader.approximate_size(&KeyRange::all());
    let wide = reader.approximate_size(&KeyRange::between("key010", "key090"));
    let narrow = reader.approximate_size(&KeyRange::between("key040", "key050"));

    assert!(all >= wide && wide >= narrow && narrow > 0);
    assert!(all <= reader.file_size());
    assert_eq!(reader.approximate_size(&KeyRange::between("zzz", "zzzz")), 0);
    assert_eq!(reader.approximate_size(&KeyRange::between("key050", "key040")), 0);
}

// =============================================================================
// Integrity and Cache Tests
// =============================================================================

#[test]
fn test_verify_checksum_detects_flipped_data_byte() {
    let (_temp, path) = setup_temp_sstable();
    build_sample(&path);
    open(&path).verify_checksum().unwrap();

    let mut bytes = fs::read(&path).unwrap();
    // Inside the value of the first entry ("apple")
    bytes[14 + 8 + 1] ^= 0xff;
    fs::write(&path, bytes).unwrap();

    assert!(matches!(
        open(&path).verify_checksum(),
        Err(LevelError::Corruption(_))
    ));
}

#[test]
fn test_verify_checksum_detects_misordered_entries() {
    let (_temp, path) = setup_temp_sstable();
    let mut builder = SSTableBuilder::new(&path).unwrap();
    builder.add(b"a", b"1").unwrap();
    builder.add(b"b", b"2").unwrap();
    builder.finish().unwrap();

    // Swap the two keys and patch the footer CRC so the raw checksum still holds
    let mut bytes = fs::read(&path).unwrap();
    bytes.swap(14 + 8, 14 + 10 + 8);
    let footer = bytes.len() - 16;
    let index_offset = u64::from_le_bytes(bytes[footer..footer + 8].try_into().unwrap()) as usize;
    let crc = crc32fast::hash(&bytes[14..index_offset]);
    bytes[footer + 8..footer + 12].copy_from_slice(&crc.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    assert!(matches!(
        open(&path).verify_checksum(),
        Err(LevelError::Corruption(_))
    ));
}

#[test]
fn test_verify_checksum_detects_overlong_entry() {
    let (_temp, path) = setup_temp_sstable();
    build_sample(&path);

    let mut bytes = fs::read(&path).unwrap();
    // key_len of the first entry now runs far past the data block
    bytes[14..18].copy_from_slice(&0x00ff_ffffu32.to_le_bytes());
    fs::write(&path, bytes).unwrap();

    let err = open(&path).verify_checksum().unwrap_err();
    assert!(matches!(err, LevelError::Corruption(_)));
}

#[test]
fn test_cache_filled_only_when_asked() {
    let (_temp, path) = setup_temp_sstable();
    build_sample(&path);
    let cache = Arc::new(ValueCache::new(1024 * 1024));
    let reader = SSTableReader::open(&path, 1, Some(Arc::clone(&cache))).unwrap();

    reader.get(b"a", false).unwrap();
    assert_eq!(cache.stats().entries, 0);

    reader.get(b"a", true).unwrap();
    assert_eq!(cache.stats().entries, 1);

    reader.get(b"a", true).unwrap();
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn test_open_rejects_bad_magic_and_short_files() {
    let (_temp, path) = setup_temp_sstable();

    fs::write(&path, b"tiny").unwrap();
    assert!(matches!(
        SSTableReader::open(&path, 1, None),
        Err(LevelError::Corruption(_))
    ));

    build_sample(&path);
    let mut bytes = fs::read(&path).unwrap();
    bytes[0..4].copy_from_slice(b"NOPE");
    fs::write(&path, bytes).unwrap();
    assert!(matches!(
        SSTableReader::open(&path, 1, None),
        Err(LevelError::Corruption(_))
    ));
}
