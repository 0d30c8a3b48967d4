//! Storage Module
//!
//! Sector-allocated region containers holding up to 1024 independently sized
//! records in one file.
//!
//! ## Responsibilities
//! - Track free sector ranges and place records (first-fit)
//! - Random-access read/write/remove of single slots
//! - Compaction of internal gaps with physical relocation
//! - Append-only bulk creation and file-order bulk scanning
//!
//! ## File Format
//! ```text
//! ┌────────────────────────────────────────┐
//! │ Sector 0: Sector Table                 │
//! │   1024 × u32 BE  (start << 8) | count  │
//! │   0 = slot unused                      │
//! ├────────────────────────────────────────┤
//! │ Sector 1: Timestamp Table              │
//! │   1024 × i32 BE  epoch seconds         │
//! ├────────────────────────────────────────┤
//! │ Sector 2..: Records                    │
//! │ ┌─────────┬──────────┬──────┬────────┐ │
//! │ │ Len (4) │ Comp (1) │ Data │  Pad   │ │
//! │ └─────────┴──────────┴──────┴────────┘ │
//! │ ... sector aligned, any order ...      │
//! └────────────────────────────────────────┘
//! ```

mod allocator;
mod header;
mod iterator;
mod rebuild;
mod region;
mod streaming;

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, Write};

use bytes::{BufMut, BytesMut};

use crate::slot::{FIRST_DATA_SECTOR, SECTOR_SIZE};

pub use allocator::SectorAllocator;
pub use header::HeaderTables;
pub use iterator::{ChunkEntry, RecordReader, RegionChunk, RegionChunkIterator};
pub use rebuild::{copy_chunks, rebuild};
pub use region::{RegionFile, RegionStats};
pub use streaming::{StreamingRegionWriter, StreamingSummary};

// =============================================================================
// SectorBlock
// =============================================================================

/// A contiguous run of sectors: `[start, start + count)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SectorBlock {
    pub start: u32,
    pub count: u32,
}

impl SectorBlock {
    pub fn new(start: u32, count: u32) -> Self {
        Self { start, count }
    }

    /// Decode a sector table entry; 0 means the slot is empty
    pub fn unpack(entry: u32) -> Option<Self> {
        if entry == 0 {
            None
        } else {
            Some(Self::new(entry >> 8, entry & 0xFF))
        }
    }

    /// Encode as a sector table entry. Only valid for count <= 255.
    pub fn pack(&self) -> u32 {
        debug_assert!(self.count <= 0xFF, "sector count {} overflows entry", self.count);
        debug_assert!(self.start < 1 << 24, "sector start {} overflows entry", self.start);
        (self.start << 8) | (self.count & 0xFF)
    }

    /// First sector past this block
    pub fn end(&self) -> u32 {
        self.start + self.count
    }

    pub fn byte_offset(&self) -> u64 {
        self.start as u64 * SECTOR_SIZE as u64
    }

    pub fn byte_len(&self) -> usize {
        self.count as usize * SECTOR_SIZE
    }

    /// Whether the block overlaps the header sectors
    pub fn is_in_header(&self) -> bool {
        self.start < FIRST_DATA_SECTOR
    }
}

// =============================================================================
// SectorDevice
// =============================================================================

/// A seekable byte device that can also be resized.
///
/// Compaction needs to truncate the underlying storage, which `Seek`/`Write`
/// alone cannot express.
pub trait SectorDevice: Read + Write + Seek {
    fn set_device_len(&mut self, len: u64) -> io::Result<()>;

    fn device_len(&mut self) -> io::Result<u64>;
}

impl SectorDevice for File {
    fn set_device_len(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn device_len(&mut self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }
}

impl SectorDevice for Cursor<Vec<u8>> {
    fn set_device_len(&mut self, len: u64) -> io::Result<()> {
        self.get_mut().resize(len as usize, 0);
        Ok(())
    }

    fn device_len(&mut self) -> io::Result<u64> {
        Ok(self.get_ref().len() as u64)
    }
}

// =============================================================================
// Record Encoding (shared by RegionFile and StreamingRegionWriter)
// =============================================================================

/// Build `[len][raw][zero pad]` spanning exactly `sectors` sectors
pub(crate) fn encode_record(raw: &[u8], sectors: u32) -> BytesMut {
    let span = sectors as usize * SECTOR_SIZE;
    let mut buf = BytesMut::with_capacity(span);
    buf.put_u32(raw.len() as u32);
    buf.put_slice(raw);
    buf.resize(span, 0);
    buf
}
