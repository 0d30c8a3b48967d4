//! Sector Allocator
//!
//! In-memory free-space tracker for one region file.
//!
//! ## Model
//! ```text
//!  sector: 0   1   2   3   4   5   6   7   8   9
//!        ┌───┬───┬───┬───┬───┬───┬───┬───┬───┬ ─ ─
//!        │ header│ A │ . │ . │ B │ B │ . │ C │  (implicit tail)
//!        └───┴───┴───┴───┴───┴───┴───┴───┴───┴ ─ ─
//!  free list:      [3,2]             [7,1]
//!  append cursor:                              9
//! ```
//!
//! - The free list holds disjoint, non-adjacent ranges strictly below the
//!   append cursor, sorted by start sector.
//! - Space at or above the append cursor is never materialized as a free
//!   entry; releasing a block that ends at the cursor pulls the cursor back.
//! - Allocation is first-fit, splitting from the low end of a larger range.

use std::io::{Read, Seek, SeekFrom, Write};

use tracing::{debug, info};

use crate::error::{RegionError, Result};
use crate::slot::{SlotIndex, FIRST_DATA_SECTOR, SECTOR_SIZE};

use super::{HeaderTables, SectorBlock, SectorDevice};

/// Free-space tracker: free list plus append cursor
#[derive(Debug, Clone)]
pub struct SectorAllocator {
    /// Unused ranges below `append_cursor`, sorted by start
    free: Vec<SectorBlock>,
    /// First sector past every tracked range
    append_cursor: u32,
}

impl SectorAllocator {
    /// Allocator for an empty file (only the header is in use)
    pub fn new() -> Self {
        Self {
            free: Vec::new(),
            append_cursor: FIRST_DATA_SECTOR,
        }
    }

    /// Rebuild the free list and append cursor from a header snapshot
    ///
    /// Gaps before and between occupied ranges become free entries; the
    /// cursor lands at the end of the last occupied range. Overlapping
    /// ranges are rejected as corrupt.
    pub fn sync(&mut self, tables: &HeaderTables) -> Result<()> {
        let mut occupied: Vec<(SlotIndex, SectorBlock)> = tables.occupied().collect();

        for (index, block) in &occupied {
            if block.is_in_header() {
                return Err(RegionError::CorruptFile(format!(
                    "slot {} starts at sector {} inside the header",
                    index, block.start
                )));
            }
            if block.count == 0 {
                return Err(RegionError::CorruptFile(format!(
                    "slot {} is marked occupied with zero sectors at sector {}",
                    index, block.start
                )));
            }
        }

        occupied.sort_by_key(|(_, block)| block.start);

        self.free.clear();
        let mut cursor = FIRST_DATA_SECTOR;
        for (index, block) in &occupied {
            if block.start < cursor {
                self.free.clear();
                return Err(RegionError::CorruptFile(format!(
                    "slot {} at sectors {}..{} overlaps another record",
                    index,
                    block.start,
                    block.end()
                )));
            }
            if block.start > cursor {
                self.free.push(SectorBlock::new(cursor, block.start - cursor));
            }
            cursor = block.end();
        }
        self.append_cursor = cursor;

        debug!(
            occupied = occupied.len(),
            free_blocks = self.free.len(),
            append_cursor = self.append_cursor,
            "Allocator synced from header"
        );

        Ok(())
    }

    /// Reserve `count` sectors (first-fit)
    ///
    /// An exact match is removed from the free list, a larger one is split
    /// from its low end. With no fit, the block is carved from the append
    /// cursor.
    pub fn allocate(&mut self, count: u32) -> SectorBlock {
        debug_assert!(count > 0);

        if let Some(pos) = self.free.iter().position(|block| block.count >= count) {
            let candidate = &mut self.free[pos];
            if candidate.count == count {
                return self.free.remove(pos);
            }

            let block = SectorBlock::new(candidate.start, count);
            candidate.start += count;
            candidate.count -= count;
            return block;
        }

        let block = SectorBlock::new(self.append_cursor, count);
        self.append_cursor += count;
        block
    }

    /// Return a previously allocated block to the free list
    ///
    /// The block is merged with any free neighbour it touches. A block ending
    /// at the append cursor moves the cursor back instead of being listed.
    pub fn release(&mut self, block: SectorBlock) {
        if block.count == 0 {
            return;
        }

        if block.end() >= self.append_cursor {
            self.append_cursor = self.append_cursor.min(block.start);
            self.trim_tail();
            return;
        }

        let pos = self.free.partition_point(|free| free.start < block.start);

        let merged = if pos > 0 && self.free[pos - 1].end() >= block.start {
            let prev = &mut self.free[pos - 1];
            let end = prev.end().max(block.end());
            prev.count = end - prev.start;
            pos - 1
        } else {
            self.free.insert(pos, block);
            pos
        };

        while merged + 1 < self.free.len() && self.free[merged + 1].start <= self.free[merged].end() {
            let next = self.free.remove(merged + 1);
            let current = &mut self.free[merged];
            let end = current.end().max(next.end());
            current.count = end - current.start;
        }

        self.trim_tail();
    }

    /// Relocate every record above the first gap down to it, then truncate
    ///
    /// Records are moved in increasing address order, so a move never
    /// overwrites data that has not been moved yet. Returns the number of
    /// bytes the device shrank by.
    pub fn compact<D: SectorDevice>(
        &mut self,
        device: &mut D,
        tables: &mut HeaderTables,
    ) -> Result<u64> {
        let old_len = device.device_len()?;

        if self.free.is_empty() {
            return self.truncate(device, old_len);
        }

        let first_gap = self.free[0].start;
        let mut moved: Vec<(SlotIndex, SectorBlock)> = tables
            .occupied()
            .filter(|(_, block)| block.start > first_gap)
            .collect();
        moved.sort_by_key(|(_, block)| block.start);

        let largest = moved.iter().map(|(_, block)| block.byte_len()).max().unwrap_or(0);
        let mut scratch = vec![0u8; largest];

        let mut dest = first_gap;
        for (index, block) in &moved {
            let len = block.byte_len();
            let available = old_len.saturating_sub(block.byte_offset()).min(len as u64) as usize;

            // An unpadded final record reads short; the rest stays zero
            scratch[available..len].fill(0);
            device.seek(SeekFrom::Start(block.byte_offset()))?;
            device.read_exact(&mut scratch[..available])?;

            let target = SectorBlock::new(dest, block.count);
            device.seek(SeekFrom::Start(target.byte_offset()))?;
            device.write_all(&scratch[..len])?;

            let timestamp = tables.timestamp(*index).unwrap_or(0);
            tables.set(*index, target, timestamp);

            debug!(slot = %index, from = block.start, to = dest, sectors = block.count, "Relocated record");
            dest += block.count;
        }

        self.free.clear();
        self.append_cursor = dest;

        let reclaimed = self.truncate(device, old_len)?;
        info!(moved = moved.len(), reclaimed, append_cursor = dest, "Compacted region");
        Ok(reclaimed)
    }

    /// Drop all tracked state (used when the owning handle closes)
    pub fn clear(&mut self) {
        self.free = Vec::new();
        self.append_cursor = FIRST_DATA_SECTOR;
    }

    /// Free ranges in ascending order
    pub fn free_blocks(&self) -> &[SectorBlock] {
        &self.free
    }

    pub fn append_cursor(&self) -> u32 {
        self.append_cursor
    }

    /// Total sectors held by the free list
    pub fn free_sectors(&self) -> u32 {
        self.free.iter().map(|block| block.count).sum()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Fold free entries that reach the append cursor back into the tail
    fn trim_tail(&mut self) {
        while let Some(last) = self.free.last() {
            if last.end() < self.append_cursor {
                break;
            }
            self.append_cursor = last.start;
            self.free.pop();
        }
    }

    fn truncate<D: SectorDevice>(&self, device: &mut D, old_len: u64) -> Result<u64> {
        let new_len = self.append_cursor as u64 * SECTOR_SIZE as u64;
        if old_len > new_len {
            device.set_device_len(new_len)?;
            Ok(old_len - new_len)
        } else {
            Ok(0)
        }
    }
}

impl Default for SectorAllocator {
    fn default() -> Self {
        Self::new()
    }
}
