//! Batch operations
//!
//! The tagged operation list shared by batches, the engine's atomic apply
//! primitive and the WAL.

use serde::{Deserialize, Serialize};

/// A single write inside an atomic batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
    /// Upsert a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Remove a key (no-op if absent)
    Delete { key: Vec<u8> },
}

impl BatchOp {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOp::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOp::Delete { key: key.into() }
    }

    /// The key this operation targets
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Delete { key } => key,
        }
    }
}
