//! WAL Writer
//!
//! Handles appending records to the WAL file.
//!
//! A record is either fully in the log or not at all: when writing, flushing
//! or syncing a record fails, the file is cut back to where the record began
//! before the error is returned.

use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{LevelError, Result};
use crate::operation::BatchOp;

use super::{WalEntry, WalRecovery};

/// File operations the writer needs beyond `Write + Seek`
pub trait LogFile: Write + Seek + Send {
    fn set_len(&mut self, len: u64) -> io::Result<()>;
    fn sync_data(&mut self) -> io::Result<()>;
}

impl LogFile for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }

    fn sync_data(&mut self) -> io::Result<()> {
        File::sync_data(self)
    }
}

/// Writes records to the WAL file
pub struct WalWriter<F: LogFile = File> {
    path: PathBuf,
    file: F,
    /// Length of the log up to the end of the last complete record
    len: u64,
    /// LSN the next record will carry
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Records appended since the last fsync
    unsynced: usize,
    /// Set when a failed record could not be cut back out of the log
    broken: bool,
}

impl WalWriter<File> {
    /// Open or create a WAL file
    ///
    /// An existing file is scanned so LSNs continue after its last valid
    /// record; a torn or corrupt tail is cut off first.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let mut next_lsn = 1;
        if path.exists() {
            let (_, result) = WalRecovery::recover(path)?;
            if result.entries_recovered > 0 {
                next_lsn = result.last_lsn + 1;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let mut writer = Self::with_file(path, file, sync_strategy)?;
        writer.current_lsn = next_lsn;
        Ok(writer)
    }
}

impl<F: LogFile> WalWriter<F> {
    /// Append to an already positioned log file, starting at LSN 1
    pub(crate) fn with_file(path: &Path, mut file: F, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let len = file.seek(SeekFrom::End(0))?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            len,
            current_lsn: 1,
            sync_strategy,
            unsynced: 0,
            broken: false,
        })
    }

    /// Append a single operation, returning its LSN
    pub fn append(&mut self, operation: BatchOp) -> Result<u64> {
        self.append_batch(&[operation], false)
    }

    /// Append a batch as one record, returning the LSN of its first operation
    ///
    /// The record is written to the OS before returning; it is fsynced when
    /// `force_sync` is set or the sync strategy asks for it. On error the log
    /// is left as it was before the call.
    pub fn append_batch(&mut self, operations: &[BatchOp], force_sync: bool) -> Result<u64> {
        if operations.is_empty() {
            return Err(LevelError::WalWrite("Refusing to log an empty batch".to_string()));
        }
        if self.broken {
            return Err(LevelError::WalWrite(format!(
                "{} holds a partial record and refuses further appends",
                self.path.display()
            )));
        }

        let lsn = self.current_lsn;
        let entry = WalEntry::new(lsn, operations.to_vec());
        let bytes = entry.serialize()?;

        if let Err(e) = self.write_record(&bytes, force_sync) {
            self.rollback();
            return Err(LevelError::WalWrite(format!(
                "Append to {} failed: {}",
                self.path.display(),
                e
            )));
        }

        self.len += bytes.len() as u64;
        self.current_lsn += operations.len() as u64;
        Ok(lsn)
    }

    fn write_record(&mut self, bytes: &[u8], force_sync: bool) -> io::Result<()> {
        self.file.write_all(bytes)?;
        self.file.flush()?;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced + 1 >= count.max(1),
        };
        if force_sync || due {
            self.file.sync_data()?;
            self.unsynced = 0;
        } else {
            self.unsynced += 1;
        }
        Ok(())
    }

    /// Cut the log back to the end of the last complete record
    fn rollback(&mut self) {
        let len = self.len;
        let result = self
            .file
            .set_len(len)
            .and_then(|_| self.file.seek(SeekFrom::Start(len)).map(|_| ()));
        if let Err(e) = result {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to roll back WAL record"
            );
            self.broken = true;
        }
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Discard all records (their contents are durable elsewhere)
    ///
    /// LSNs keep counting from where they were.
    pub fn truncate(&mut self) -> Result<()> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        self.file.sync_data()?;
        self.len = 0;
        self.unsynced = 0;
        self.broken = false;
        Ok(())
    }

    /// Get the LSN the next record will carry
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Make the next record start at `lsn` or later
    pub fn advance_lsn(&mut self, lsn: u64) {
        self.current_lsn = self.current_lsn.max(lsn);
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }
}
