//! Write-Ahead Log (WAL) Module
//!
//! Provides durability and batch atomicity through append-only logging.
//!
//! ## Responsibilities
//! - Append one record per committed batch before any mutation
//! - CRC32 checksums for corruption detection
//! - Log Sequence Numbers (LSN) for ordering: a record's LSN is the sequence
//!   number of its first operation, the batch occupies `lsn..lsn + len`
//! - Crash recovery and replay (a torn record drops the whole batch)
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Record 1                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Record 2                                │
//! │ ┌─────────┬─────────┬────────┬────────┐ │
//! │ │ LSN (8) │ CRC (4) │Len (4) │ Data   │ │
//! │ └─────────┴─────────┴────────┴────────┘ │
//! └─────────────────────────────────────────┘
//! ```
//! `Data` is the bincode encoding of the batch and its timestamp; the CRC
//! covers the LSN bytes and `Data`.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{WalEntry, HEADER_SIZE};
pub use writer::{LogFile, WalWriter};
pub use reader::{ReadOutcome, WalIterator, WalReader};
pub use recovery::{WalRecovery, RecoveryResult};
