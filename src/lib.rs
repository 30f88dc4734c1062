//! # levelkv
//!
//! An embeddable, ordered key-value store with:
//! - Open/close lifecycle bound to one location
//! - Atomic batches of puts and deletes
//! - Snapshot iterators over half-open key ranges, forward or reversed
//! - Approximate on-disk size estimates per key range
//! - Write-Ahead Logging (WAL) and crash recovery underneath
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                                │
//! │     (lifecycle, batches, iterators, snapshots, sizes)        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ StorageEngine / EngineCursor
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      LsmEngine                               │
//! │           (Single Writer / Multi Reader, MVCC)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │ (versions)  │
//!   └─────────────┘          └──────┬──────┘
//!                                   │ flush
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod ordering;
pub mod operation;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{LevelError, Result, StatusCode};
pub use config::{IteratorOptions, Options, ReadOptions, WalSyncStrategy, WriteOptions};
pub use ordering::{Direction, KeyRange};
pub use operation::BatchOp;
pub use engine::{EngineCursor, LsmEngine, StorageEngine};
pub use store::{Batch, IteratorState, LifecycleState, Snapshot, SnapshotState, Store, StoreIterator};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of levelkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
