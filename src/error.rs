//! Error types for levelkv
//!
//! Provides a unified error type for all operations, split into contract
//! violations raised by the adapter and failures surfaced from the engine.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using LevelError
pub type Result<T> = std::result::Result<T, LevelError>;

/// Unified error type for levelkv operations
#[derive(Debug, Error)]
pub enum LevelError {
    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Store is not open")]
    NotOpen,

    #[error("Store is already open")]
    AlreadyOpen,

    #[error("Store is already closed")]
    AlreadyClosed,

    #[error("Location is locked by another open store: {0}")]
    LocationLocked(PathBuf),

    // -------------------------------------------------------------------------
    // Contract Errors
    // -------------------------------------------------------------------------
    #[error("Key not found")]
    NotFound,

    #[error("Batch has already been committed")]
    BatchAlreadyCommitted,

    #[error("Iterator has been released")]
    IteratorReleased,

    #[error("Iterator invalidated: store closed")]
    StoreClosed,

    #[error("Snapshot has been released")]
    SnapshotReleased,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("WAL write failed: {0}")]
    WalWrite(String),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corruption: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse status classes, one per engine status code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok = 0,
    NotFound = 1,
    Corruption = 2,
    NotSupported = 3,
    InvalidArgument = 4,
    IoError = 5,
    NotOpened = 6,
}

impl LevelError {
    /// Classify this error into a [`StatusCode`]
    pub fn status_code(&self) -> StatusCode {
        match self {
            LevelError::NotOpen | LevelError::StoreClosed => StatusCode::NotOpened,
            LevelError::NotFound => StatusCode::NotFound,
            LevelError::AlreadyOpen
            | LevelError::AlreadyClosed
            | LevelError::BatchAlreadyCommitted
            | LevelError::IteratorReleased
            | LevelError::SnapshotReleased
            | LevelError::InvalidArgument(_) => StatusCode::InvalidArgument,
            LevelError::LocationLocked(_) | LevelError::Io(_) | LevelError::WalWrite(_) => {
                StatusCode::IoError
            }
            LevelError::WalCorruption(_)
            | LevelError::Corruption(_)
            | LevelError::Serialization(_) => StatusCode::Corruption,
            LevelError::Storage(_) => StatusCode::IoError,
        }
    }

    /// Whether this error came from the storage engine rather than from
    /// misuse of the adapter contract
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            LevelError::Io(_)
                | LevelError::WalCorruption(_)
                | LevelError::WalWrite(_)
                | LevelError::Storage(_)
                | LevelError::Corruption(_)
                | LevelError::Serialization(_)
        )
    }
}
