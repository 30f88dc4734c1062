//! Engine cursors
//!
//! Merges the snapshot's memtable and SSTables into one ordered stream.
//! Each source keeps a head: the first entry it holds past the cursor's
//! position. A step takes the smallest head key (largest when reversed),
//! lets the newest source win ties, advances every source sitting on that
//! key and skips tombstones.

use std::ops::Bound;

use crate::error::Result;
use crate::memtable::MemTableEntry;
use crate::ordering::{Direction, KeyRange};

use super::snapshot::LsmSnapshot;
use super::EngineCursor;

type Head = Option<(Vec<u8>, MemTableEntry)>;

/// Cursor over an [`LsmSnapshot`]
pub struct LsmCursor {
    snapshot: LsmSnapshot,
    range: KeyRange,
    direction: Direction,
    fill_cache: bool,
    /// Index 0 is the memtable, then tables newest → oldest
    heads: Vec<Head>,
    positioned: bool,
    exhausted: bool,
    /// Entry found by a seek, handed out by the following `next`
    pending: Option<(Vec<u8>, Vec<u8>)>,
}

impl LsmCursor {
    pub(crate) fn new(
        snapshot: LsmSnapshot,
        range: KeyRange,
        direction: Direction,
        fill_cache: bool,
    ) -> Self {
        let sources = 1 + snapshot.version.tables.len();
        Self {
            snapshot,
            range,
            direction,
            fill_cache,
            heads: vec![None; sources],
            positioned: false,
            exhausted: false,
            pending: None,
        }
    }

    /// Sequence number of the snapshot this cursor reads
    pub fn sequence(&self) -> u64 {
        self.snapshot.sequence
    }

    fn source_seek(&self, source: usize, bound: &Bound<Vec<u8>>) -> Result<Head> {
        if source == 0 {
            Ok(self
                .snapshot
                .version
                .mem
                .seek(bound, self.direction, self.snapshot.sequence))
        } else {
            self.snapshot.version.tables[source - 1].seek(bound, self.direction, self.fill_cache)
        }
    }

    fn position(&mut self, bound: Bound<Vec<u8>>) -> Result<()> {
        for source in 0..self.heads.len() {
            self.heads[source] = self.source_seek(source, &bound)?;
        }
        self.positioned = true;
        self.exhausted = false;
        self.pending = None;
        Ok(())
    }

    /// Source holding the next key in scan order (newest source on ties)
    fn pick(&self) -> Option<usize> {
        let mut best: Option<(usize, &[u8])> = None;
        for (source, head) in self.heads.iter().enumerate() {
            let Some((key, _)) = head else { continue };
            let better = match best {
                None => true,
                Some((_, best_key)) => match self.direction {
                    Direction::Forward => key.as_slice() < best_key,
                    Direction::Reverse => key.as_slice() > best_key,
                },
            };
            if better {
                best = Some((source, key.as_slice()));
            }
        }
        best.map(|(source, _)| source)
    }

    fn finish(&mut self) {
        self.exhausted = true;
        for head in &mut self.heads {
            *head = None;
        }
    }

    /// Next live in-range entry from the current heads
    fn next_visible(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        loop {
            let Some(winner) = self.pick() else {
                self.finish();
                return Ok(None);
            };
            let Some((key, entry)) = self.heads[winner].take() else {
                self.finish();
                return Ok(None);
            };

            if !self.range.admits(&key, self.direction) {
                self.finish();
                return Ok(None);
            }

            let past = Bound::Excluded(key.clone());
            for source in 0..self.heads.len() {
                let shadowed = source == winner
                    || matches!(&self.heads[source], Some((k, _)) if *k == key);
                if shadowed {
                    self.heads[source] = self.source_seek(source, &past)?;
                }
            }

            if let MemTableEntry::Value(value) = entry {
                return Ok(Some((key, value)));
            }
        }
    }
}

impl EngineCursor for LsmCursor {
    fn seek(&mut self, target: &[u8]) -> Result<bool> {
        let bound = self.range.seek_bound(target, self.direction);
        self.position(bound)?;
        self.pending = self.next_visible()?;
        Ok(self.pending.is_some())
    }

    fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
        if let Some(entry) = self.pending.take() {
            return Ok(Some(entry));
        }
        if self.exhausted {
            return Ok(None);
        }
        if !self.positioned {
            let bound = self.range.initial_bound(self.direction);
            self.position(bound)?;
        }
        self.next_visible()
    }
}
