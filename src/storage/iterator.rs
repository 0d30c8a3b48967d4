//! Region Chunk Iterator
//!
//! Read-only forward scan over every occupied slot, in on-disk order.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom, Take};
use std::path::Path;

use tracing::warn;

use crate::error::{RegionError, Result};
use crate::record::{CompressionId, RawRecord};
use crate::slot::{SlotIndex, HEADER_SIZE};

use super::{HeaderTables, SectorBlock};

/// Record bytes of the current entry, bounded by its allocated sectors
pub type RecordReader<'a> = Take<&'a mut BufReader<File>>;

/// Header information for one occupied slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkEntry {
    pub index: SlotIndex,
    pub timestamp: i32,
    pub sector: SectorBlock,
}

/// A fully buffered record yielded by the iterator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionChunk {
    pub index: SlotIndex,
    pub timestamp: i32,
    pub sector: SectorBlock,
    /// Raw record bytes: compression id + compressed payload
    pub data: Vec<u8>,
}

impl RegionChunk {
    pub fn record(&self) -> RawRecord<'_> {
        RawRecord::new(&self.data)
    }

    pub fn compression(&self) -> Option<CompressionId> {
        self.record().compression_id()
    }
}

/// Forward-only scanner sorted by ascending start sector
///
/// Seeks only move forward, so a full scan reads the file sequentially.
pub struct RegionChunkIterator {
    reader: BufReader<File>,
    entries: Vec<ChunkEntry>,
    position: usize,
}

impl RegionChunkIterator {
    /// Read the header once and plan the scan
    ///
    /// A file shorter than the header is treated as an empty container.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut file = File::open(path.as_ref())?;
        let len = file.metadata()?.len();

        let mut entries = Vec::new();
        if len >= HEADER_SIZE as u64 {
            let tables = HeaderTables::read_from(&mut file)?;
            for (index, sector) in tables.occupied() {
                if sector.is_in_header() {
                    return Err(RegionError::CorruptFile(format!(
                        "slot {} starts at sector {} inside the header",
                        index, sector.start
                    )));
                }
                if sector.count == 0 {
                    return Err(RegionError::CorruptFile(format!(
                        "slot {} is marked occupied with zero sectors at sector {}",
                        index, sector.start
                    )));
                }
                entries.push(ChunkEntry {
                    index,
                    timestamp: tables.timestamp(index).unwrap_or(0),
                    sector,
                });
            }
        }
        entries.sort_by_key(|entry| entry.sector.start);

        Ok(Self {
            reader: BufReader::new(file),
            entries,
            position: 0,
        })
    }

    /// Number of occupied slots (total, not remaining)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The full scan plan, in visiting order
    pub fn entries(&self) -> &[ChunkEntry] {
        &self.entries
    }

    /// Advance and expose the next record as a bounded reader
    ///
    /// The reader yields the bytes after the length prefix and stops at the
    /// declared length or at the end of the record's sectors, whichever comes
    /// first, so a bad length never reads into the next record.
    pub fn next_reader(&mut self) -> Option<Result<(ChunkEntry, RecordReader<'_>)>> {
        let entry = *self.entries.get(self.position)?;
        self.position += 1;

        match self.open_record(entry) {
            Ok(limit) => Some(Ok((entry, (&mut self.reader).take(limit)))),
            Err(e) => Some(Err(e)),
        }
    }

    fn open_record(&mut self, entry: ChunkEntry) -> Result<u64> {
        self.reader.seek(SeekFrom::Start(entry.sector.byte_offset()))?;

        let mut len_bytes = [0u8; 4];
        self.reader.read_exact(&mut len_bytes)?;
        let length = i32::from_be_bytes(len_bytes);
        if length < 0 {
            return Err(RegionError::CorruptFile(format!(
                "slot {} declares negative length {}",
                entry.index, length
            )));
        }

        let span = entry.sector.byte_len() as u64 - 4;
        if length as u64 > span {
            warn!(
                slot = %entry.index,
                length,
                span,
                "Record length overruns its sectors, truncating"
            );
        }
        Ok((length as u64).min(span))
    }
}

impl Iterator for RegionChunkIterator {
    type Item = Result<RegionChunk>;

    fn next(&mut self) -> Option<Self::Item> {
        let (entry, mut reader) = match self.next_reader()? {
            Ok(next) => next,
            Err(e) => return Some(Err(e)),
        };

        let expected = reader.limit();
        let mut data = Vec::with_capacity(expected as usize);
        if let Err(e) = reader.read_to_end(&mut data) {
            return Some(Err(RegionError::Io(e)));
        }
        if data.len() as u64 != expected {
            return Some(Err(RegionError::CorruptFile(format!(
                "slot {} record ends after {} of {} bytes",
                entry.index,
                data.len(),
                expected
            ))));
        }

        Some(Ok(RegionChunk {
            index: entry.index,
            timestamp: entry.timestamp,
            sector: entry.sector,
            data,
        }))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.entries.len() - self.position;
        (remaining, Some(remaining))
    }
}
