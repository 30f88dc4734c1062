//! Tests for the WAL writer and reader
//!
//! These tests verify:
//! - One record per batch, LSN = sequence of the first operation
//! - LSNs continue across reopen and truncate
//! - Sync strategies
//! - Reading back what was written

use std::fs;
use std::path::PathBuf;

use levelkv::config::WalSyncStrategy;
use levelkv::operation::BatchOp;
use levelkv::wal::{ReadOutcome, WalEntry, WalReader, WalWriter, HEADER_SIZE};
use levelkv::LevelError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("wal.log");
    (temp_dir, wal_path)
}

fn read_all(path: &PathBuf) -> Vec<WalEntry> {
    WalReader::open(path)
        .unwrap()
        .entries()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

// =============================================================================
// Append Tests
// =============================================================================

#[test]
fn test_single_put_is_one_record() {
    let (_temp, path) = setup_temp_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

    let lsn = writer.append(BatchOp::put("k", "v")).unwrap();
    assert_eq!(lsn, 1);
    assert_eq!(writer.current_lsn(), 2);

    let entries = read_all(&path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operations, vec![BatchOp::put("k", "v")]);
}

#[test]
fn test_batch_consumes_one_sequence_per_operation() {
    let (_temp, path) = setup_temp_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

    let ops = vec![
        BatchOp::put("a", "1"),
        BatchOp::delete("b"),
        BatchOp::put("c", "3"),
    ];
    let first = writer.append_batch(&ops, false).unwrap();
    let next = writer.append(BatchOp::put("d", "4")).unwrap();

    assert_eq!(first, 1);
    assert_eq!(next, 4);

    let entries = read_all(&path);
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].lsn, 1);
    assert_eq!(entries[0].last_sequence(), 3);
    assert_eq!(entries[0].operations, ops);
    assert_eq!(entries[1].lsn, 4);
}

#[test]
fn test_empty_batch_is_rejected() {
    let (_temp, path) = setup_temp_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

    let result = writer.append_batch(&[], false);
    assert!(matches!(result, Err(LevelError::WalWrite(_))));
    assert_eq!(writer.current_lsn(), 1);
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
}

#[test]
fn test_reopen_continues_lsn() {
    let (_temp, path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
        writer
            .append_batch(&[BatchOp::put("a", "1"), BatchOp::put("b", "2")], false)
            .unwrap();
    }

    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
    assert_eq!(writer.current_lsn(), 3);
    assert_eq!(writer.append(BatchOp::delete("a")).unwrap(), 3);
}

#[test]
fn test_truncate_keeps_lsn() {
    let (_temp, path) = setup_temp_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

    writer.append(BatchOp::put("a", "1")).unwrap();
    writer.append(BatchOp::put("b", "2")).unwrap();
    writer.truncate().unwrap();

    assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    assert_eq!(writer.append(BatchOp::put("c", "3")).unwrap(), 3);

    let entries = read_all(&path);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 3);
}

#[test]
fn test_advance_lsn_never_goes_back() {
    let (_temp, path) = setup_temp_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();

    writer.advance_lsn(10);
    assert_eq!(writer.current_lsn(), 10);
    writer.advance_lsn(5);
    assert_eq!(writer.current_lsn(), 10);
}

// =============================================================================
// Sync Strategy Tests
// =============================================================================

#[test]
fn test_every_n_entries_still_readable_before_sync() {
    let (_temp, path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&path, WalSyncStrategy::EveryNEntries { count: 100 }).unwrap();

    for i in 0..5 {
        writer
            .append(BatchOp::put(format!("key{}", i), format!("value{}", i)))
            .unwrap();
    }

    // Records are flushed to the OS on every append, fsync is deferred
    assert_eq!(read_all(&path).len(), 5);
    writer.sync().unwrap();
    assert_eq!(read_all(&path).len(), 5);
}

#[test]
fn test_forced_sync_with_lazy_strategy() {
    let (_temp, path) = setup_temp_wal();
    let mut writer =
        WalWriter::open(&path, WalSyncStrategy::EveryNEntries { count: 1000 }).unwrap();

    writer.append_batch(&[BatchOp::put("k", "v")], true).unwrap();
    assert_eq!(read_all(&path).len(), 1);
}

// =============================================================================
// Reader Tests
// =============================================================================

#[test]
fn test_reader_reports_eof_on_empty_file() {
    let (_temp, path) = setup_temp_wal();
    fs::File::create(&path).unwrap();

    let mut reader = WalReader::open(&path).unwrap();
    assert!(matches!(reader.next_record().unwrap(), ReadOutcome::Eof));
    assert_eq!(reader.next_entry().unwrap(), None);
}

#[test]
fn test_reader_reports_torn_header() {
    let (_temp, path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(BatchOp::put("a", "1")).unwrap();
    }
    let valid_len = fs::metadata(&path).unwrap().len();
    let mut bytes = fs::read(&path).unwrap();
    bytes.extend_from_slice(&[0u8; HEADER_SIZE / 2]);
    fs::write(&path, bytes).unwrap();

    let mut reader = WalReader::open(&path).unwrap();
    assert!(matches!(reader.next_record().unwrap(), ReadOutcome::Entry(_)));
    match reader.next_record().unwrap() {
        ReadOutcome::Torn { offset } => assert_eq!(offset, valid_len),
        other => panic!("expected torn record, got {:?}", other),
    }
}

#[test]
fn test_reader_rejects_flipped_payload_byte() {
    let (_temp, path) = setup_temp_wal();
    {
        let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(BatchOp::put("key", "value")).unwrap();
    }
    let mut bytes = fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    fs::write(&path, bytes).unwrap();

    let mut reader = WalReader::open(&path).unwrap();
    assert!(matches!(
        reader.next_record().unwrap(),
        ReadOutcome::Corrupt { offset: 0, .. }
    ));

    let mut reader = WalReader::open(&path).unwrap();
    assert!(matches!(
        reader.next_entry(),
        Err(LevelError::WalCorruption(_))
    ));
}

#[test]
fn test_large_value_round_trips() {
    let (_temp, path) = setup_temp_wal();
    let value = vec![0xabu8; 256 * 1024];
    {
        let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite).unwrap();
        writer.append(BatchOp::put(b"big".to_vec(), value.clone())).unwrap();
    }

    let entries = read_all(&path);
    assert_eq!(entries[0].operations, vec![BatchOp::put(b"big".to_vec(), value)]);
}
