//! Slot addressing
//!
//! A region container is a 32×32 grid of slots. Each slot is addressed by a
//! linear index `local_z * 32 + local_x`.

use std::fmt;

use crate::error::{RegionError, Result};

// =============================================================================
// Format Constants
// =============================================================================

/// Size of one sector in bytes
pub const SECTOR_SIZE: usize = 4096;

/// Header size: sector table + timestamp table
pub const HEADER_SIZE: usize = SECTOR_SIZE * 2;

/// First sector available for records
pub const FIRST_DATA_SECTOR: u32 = 2;

/// Number of slots along one axis of a region
pub const REGION_WIDTH: usize = 32;

/// Number of slots per container
pub const SLOT_COUNT: usize = REGION_WIDTH * REGION_WIDTH;

/// Largest sector count a packed table entry can hold
pub const MAX_SECTOR_COUNT: usize = 255;

/// Largest on-disk record, length prefix included
pub const MAX_RECORD_SIZE: usize = MAX_SECTOR_COUNT * SECTOR_SIZE;

/// Number of sectors needed to hold `len` bytes
pub const fn required_sectors(len: usize) -> usize {
    len.div_ceil(SECTOR_SIZE)
}

// =============================================================================
// SlotIndex
// =============================================================================

/// Validated slot index in `[0, 1023]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SlotIndex(usize);

impl SlotIndex {
    /// Create a slot index, failing if it is outside the grid
    pub fn new(index: usize) -> Result<Self> {
        if index >= SLOT_COUNT {
            return Err(RegionError::IndexOutOfBounds {
                what: "slot index",
                value: index as i64,
            });
        }
        Ok(Self(index))
    }

    /// Create a slot index from local coordinates, each in `[0, 31]`
    pub fn from_local(local_x: i32, local_z: i32) -> Result<Self> {
        let width = REGION_WIDTH as i32;
        if !(0..width).contains(&local_x) {
            return Err(RegionError::IndexOutOfBounds {
                what: "local x",
                value: local_x as i64,
            });
        }
        if !(0..width).contains(&local_z) {
            return Err(RegionError::IndexOutOfBounds {
                what: "local z",
                value: local_z as i64,
            });
        }
        Ok(Self(local_z as usize * REGION_WIDTH + local_x as usize))
    }

    /// Every slot in ascending index order
    pub fn all() -> impl Iterator<Item = SlotIndex> {
        (0..SLOT_COUNT).map(SlotIndex)
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn local_x(self) -> i32 {
        (self.0 % REGION_WIDTH) as i32
    }

    pub fn local_z(self) -> i32 {
        (self.0 / REGION_WIDTH) as i32
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({},{})", self.0, self.local_x(), self.local_z())
    }
}

impl TryFrom<usize> for SlotIndex {
    type Error = RegionError;

    fn try_from(index: usize) -> Result<Self> {
        Self::new(index)
    }
}

// =============================================================================
// RegionAddress
// =============================================================================

/// Identifies one container in the region grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionAddress {
    pub x: i32,
    pub z: i32,
}

impl RegionAddress {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// World chunk coordinates of a slot in this region
    pub fn chunk_at(&self, slot: SlotIndex) -> (i32, i32) {
        let width = REGION_WIDTH as i32;
        (
            self.x * width + slot.local_x(),
            self.z * width + slot.local_z(),
        )
    }
}

impl fmt::Display for RegionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "region({}, {})", self.x, self.z)
    }
}
