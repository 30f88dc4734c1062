//! Batches
//!
//! Operations are queued locally and reach the engine in one atomic
//! `apply_batch` call on commit. A batch commits at most once.

use std::fmt;
use std::sync::Arc;

use crate::config::WriteOptions;
use crate::engine::StorageEngine;
use crate::error::{LevelError, Result};
use crate::operation::BatchOp;

use super::StoreInner;

/// Pending puts and deletes against one store
pub struct Batch<'a, E: StorageEngine> {
    store: &'a Arc<StoreInner<E>>,
    operations: Vec<BatchOp>,
    committed: bool,
}

impl<'a, E: StorageEngine> Batch<'a, E> {
    pub(crate) fn new(store: &'a Arc<StoreInner<E>>) -> Self {
        Self {
            store,
            operations: Vec::new(),
            committed: false,
        }
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.committed {
            Err(LevelError::BatchAlreadyCommitted)
        } else {
            Ok(())
        }
    }

    /// Queue a put
    pub fn put(&mut self, key: &[u8], value: &[u8]) -> Result<&mut Self> {
        self.ensure_pending()?;
        self.operations.push(BatchOp::put(key, value));
        Ok(self)
    }

    /// Queue a delete
    pub fn delete(&mut self, key: &[u8]) -> Result<&mut Self> {
        self.ensure_pending()?;
        self.operations.push(BatchOp::delete(key));
        Ok(self)
    }

    /// Drop every queued operation
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_pending()?;
        self.operations.clear();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn is_committed(&self) -> bool {
        self.committed
    }

    pub fn commit(&mut self) -> Result<()> {
        self.commit_with(&WriteOptions::default())
    }

    /// Apply every queued operation atomically
    ///
    /// The batch is spent afterwards whether or not the commit succeeded.
    pub fn commit_with(&mut self, options: &WriteOptions) -> Result<()> {
        self.ensure_pending()?;
        self.committed = true;
        let operations = std::mem::take(&mut self.operations);

        tracing::debug!(ops = operations.len(), "Committing batch");
        self.store.write(&operations, options)
    }
}

impl<E: StorageEngine> fmt::Debug for Batch<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Batch")
            .field("operations", &self.operations.len())
            .field("committed", &self.committed)
            .finish()
    }
}
