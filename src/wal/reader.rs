//! WAL Reader
//!
//! Handles reading records from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{LevelError, Result};

use super::entry::{WalEntry, HEADER_SIZE};

/// What the reader found at its current position
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete, checksummed record
    Entry(WalEntry),

    /// Clean end of file
    Eof,

    /// A record was cut short (crash mid-append)
    Torn { offset: u64 },

    /// A complete record failed its checksum or could not be decoded
    Corrupt { offset: u64, reason: String },
}

/// Reads records from the WAL file
pub struct WalReader {
    file: BufReader<File>,
    /// Offset of the next unread record
    position: u64,
    /// File length at open time
    file_len: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            file: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Offset just past the last record returned
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Read the next record, classifying how reading stopped
    pub fn next_record(&mut self) -> Result<ReadOutcome> {
        let offset = self.position;

        let mut header = [0u8; HEADER_SIZE];
        match read_full(&mut self.file, &mut header)? {
            0 => return Ok(ReadOutcome::Eof),
            n if n < HEADER_SIZE => return Ok(ReadOutcome::Torn { offset }),
            _ => {}
        }

        let (lsn, crc, len) = WalEntry::parse_header(&header);
        if offset + (HEADER_SIZE as u64) + u64::from(len) > self.file_len {
            return Ok(ReadOutcome::Torn { offset });
        }
        let mut payload = vec![0u8; len as usize];
        if read_full(&mut self.file, &mut payload)? < payload.len() {
            return Ok(ReadOutcome::Torn { offset });
        }

        match WalEntry::from_parts(lsn, crc, &payload) {
            Ok(entry) => {
                self.position += (HEADER_SIZE + payload.len()) as u64;
                Ok(ReadOutcome::Entry(entry))
            }
            Err(e) => Ok(ReadOutcome::Corrupt {
                offset,
                reason: e.to_string(),
            }),
        }
    }

    /// Read the next record from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file; torn or corrupt records
    /// are reported as `WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.next_record()? {
            ReadOutcome::Entry(entry) => Ok(Some(entry)),
            ReadOutcome::Eof => Ok(None),
            ReadOutcome::Torn { offset } => Err(LevelError::WalCorruption(format!(
                "Torn record at offset {}",
                offset
            ))),
            ReadOutcome::Corrupt { offset, reason } => Err(LevelError::WalCorruption(format!(
                "Corrupt record at offset {}: {}",
                offset, reason
            ))),
        }
    }

    /// Iterate over all valid records, stopping at the first bad one
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Iterator over WAL records
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Fill `buf` as far as the file allows, returning the bytes read
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
