//! Header Tables
//!
//! The sector table and the timestamp table, owned together.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{RegionError, Result};
use crate::slot::{SlotIndex, HEADER_SIZE, SLOT_COUNT};

use super::SectorBlock;

/// In-memory copy of the first two sectors of a region file
#[derive(Clone)]
pub struct HeaderTables {
    /// Packed `(start << 8) | count` per slot, 0 = empty
    sectors: Box<[u32; SLOT_COUNT]>,
    /// Epoch seconds per slot, meaningful only when occupied
    timestamps: Box<[i32; SLOT_COUNT]>,
}

impl HeaderTables {
    /// Empty tables (every slot unused)
    pub fn new() -> Self {
        Self {
            sectors: Box::new([0; SLOT_COUNT]),
            timestamps: Box::new([0; SLOT_COUNT]),
        }
    }

    /// Parse both tables from exactly `HEADER_SIZE` big-endian bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != HEADER_SIZE {
            return Err(RegionError::CorruptFile(format!(
                "header is {} bytes, expected {}",
                bytes.len(),
                HEADER_SIZE
            )));
        }

        let mut tables = Self::new();
        let mut buf = bytes;
        for entry in tables.sectors.iter_mut() {
            *entry = buf.get_u32();
        }
        for ts in tables.timestamps.iter_mut() {
            *ts = buf.get_i32();
        }
        Ok(tables)
    }

    /// Serialize both tables into `HEADER_SIZE` big-endian bytes
    pub fn to_bytes(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        for &entry in self.sectors.iter() {
            buf.put_u32(entry);
        }
        for &ts in self.timestamps.iter() {
            buf.put_i32(ts);
        }
        buf
    }

    /// Read the header from the current position of `reader`
    pub fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        let mut raw = vec![0u8; HEADER_SIZE];
        reader.read_exact(&mut raw)?;
        Self::from_bytes(&raw)
    }

    /// Write the header at the current position of `writer`
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }

    /// Location of the slot's record, if occupied
    pub fn block(&self, index: SlotIndex) -> Option<SectorBlock> {
        SectorBlock::unpack(self.sectors[index.get()])
    }

    /// Raw packed sector table entry
    pub fn entry(&self, index: SlotIndex) -> u32 {
        self.sectors[index.get()]
    }

    /// Timestamp of the slot, if occupied
    pub fn timestamp(&self, index: SlotIndex) -> Option<i32> {
        self.block(index).map(|_| self.timestamps[index.get()])
    }

    pub fn set(&mut self, index: SlotIndex, block: SectorBlock, timestamp: i32) {
        self.sectors[index.get()] = block.pack();
        self.timestamps[index.get()] = timestamp;
    }

    /// Mark the slot unused and zero its timestamp
    pub fn clear(&mut self, index: SlotIndex) {
        self.sectors[index.get()] = 0;
        self.timestamps[index.get()] = 0;
    }

    /// Occupied slots in ascending index order
    pub fn occupied(&self) -> impl Iterator<Item = (SlotIndex, SectorBlock)> + '_ {
        SlotIndex::all().filter_map(move |index| self.block(index).map(|block| (index, block)))
    }

    pub fn occupied_count(&self) -> usize {
        self.sectors.iter().filter(|&&entry| entry != 0).count()
    }
}

impl Default for HeaderTables {
    fn default() -> Self {
        Self::new()
    }
}
