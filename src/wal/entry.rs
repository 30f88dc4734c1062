//! WAL Entry definitions
//!
//! Defines the structure of individual WAL records and their encoding.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{LevelError, Result};
use crate::operation::BatchOp;

/// Record header: LSN (8) + CRC (4) + payload length (4)
pub const HEADER_SIZE: usize = 16;

/// A single record in the WAL: one atomically applied batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Sequence number of the first operation in the batch
    pub lsn: u64,

    /// The operations, in application order
    pub operations: Vec<BatchOp>,

    /// Timestamp (unix millis) when the record was created
    pub timestamp: u64,
}

#[derive(Serialize, Deserialize)]
struct Payload {
    operations: Vec<BatchOp>,
    timestamp: u64,
}

impl WalEntry {
    pub fn new(lsn: u64, operations: Vec<BatchOp>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operations,
            timestamp,
        }
    }

    /// Record holding a single operation
    pub fn single(lsn: u64, operation: BatchOp) -> Self {
        Self::new(lsn, vec![operation])
    }

    /// Sequence number of the last operation in the batch
    pub fn last_sequence(&self) -> u64 {
        self.lsn + (self.operations.len() as u64).saturating_sub(1)
    }

    fn encode_payload(&self) -> Result<Vec<u8>> {
        let payload = Payload {
            operations: self.operations.clone(),
            timestamp: self.timestamp,
        };
        bincode::serialize(&payload).map_err(|e| LevelError::Serialization(e.to_string()))
    }

    fn checksum(lsn: u64, payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(payload);
        hasher.finalize()
    }

    /// Encode header + payload
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = self.encode_payload()?;
        if payload.len() > u32::MAX as usize {
            return Err(LevelError::WalWrite(format!(
                "Record too large: {} bytes",
                payload.len()
            )));
        }
        let crc = Self::checksum(self.lsn, &payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode a complete record from the front of `bytes`
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(LevelError::WalCorruption(format!(
                "Incomplete header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let (lsn, crc, len) = Self::parse_header(&bytes[..HEADER_SIZE]);
        let end = HEADER_SIZE + len as usize;
        if bytes.len() < end {
            return Err(LevelError::WalCorruption(format!(
                "Incomplete payload: expected {} bytes, got {}",
                len,
                bytes.len() - HEADER_SIZE
            )));
        }

        Self::from_parts(lsn, crc, &bytes[HEADER_SIZE..end])
    }

    /// Split a header into (lsn, crc, payload length)
    pub(crate) fn parse_header(header: &[u8]) -> (u64, u32, u32) {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&header[0..8]);
        crc.copy_from_slice(&header[8..12]);
        len.copy_from_slice(&header[12..16]);
        (
            u64::from_le_bytes(lsn),
            u32::from_le_bytes(crc),
            u32::from_le_bytes(len),
        )
    }

    /// Verify the checksum and decode the payload
    pub(crate) fn from_parts(lsn: u64, crc: u32, payload: &[u8]) -> Result<Self> {
        let actual = Self::checksum(lsn, payload);
        if actual != crc {
            return Err(LevelError::WalCorruption(format!(
                "CRC mismatch at lsn {}: expected 0x{:08x}, got 0x{:08x}",
                lsn, crc, actual
            )));
        }

        let payload: Payload = bincode::deserialize(payload)
            .map_err(|e| LevelError::WalCorruption(format!("Undecodable payload: {}", e)))?;

        Ok(Self {
            lsn,
            operations: payload.operations,
            timestamp: payload.timestamp,
        })
    }
}
