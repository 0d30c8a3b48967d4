//! Region File
//!
//! Random-access engine over one region container.
//!
//! ## Lifecycle
//! ```text
//!   open() ──► Uninitialized ──(first call)──► Initialized ──close()──► Finalized
//! ```
//! The header is loaded lazily on the first operation. Every operation on a
//! finalized handle except `close()` fails with `FileClosed`.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::RegionConfig;
use crate::error::{RegionError, Result};
use crate::record::{PayloadCodec, RawRecord, RegionSink};
use crate::slot::{required_sectors, SlotIndex, HEADER_SIZE, MAX_SECTOR_COUNT, SECTOR_SIZE};

use super::{encode_record, HeaderTables, RegionChunkIterator, SectorAllocator, SectorBlock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HandleState {
    Uninitialized,
    Initialized,
    Finalized,
}

/// Space usage snapshot of an open region file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionStats {
    pub occupied_slots: usize,
    /// Sectors held by records (header excluded)
    pub used_sectors: u32,
    /// Sectors on the free list (internal gaps)
    pub free_sectors: u32,
    pub free_blocks: usize,
    pub append_cursor: u32,
    pub file_len: u64,
}

/// Random-access handle on a region container
///
/// ## Ownership
/// - Owns exactly one file handle for its lifetime
/// - `HeaderTables` and `SectorAllocator` are private to this handle; two
///   handles on the same path see independent snapshots
/// - Dropping the handle closes it
pub struct RegionFile {
    path: PathBuf,
    config: RegionConfig,
    /// None once finalized
    file: Option<File>,
    state: HandleState,
    tables: HeaderTables,
    allocator: SectorAllocator,
    /// Tables differ from what is on disk
    dirty: bool,
}

impl RegionFile {
    /// Open a region file with the default config (writable, created if missing)
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, RegionConfig::default())
    }

    /// Open a region file. The header is not read until the first operation.
    pub fn open_with(path: impl AsRef<Path>, config: RegionConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let file = if config.read_only {
            File::open(&path)?
        } else {
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(config.create_if_missing)
                .truncate(false)
                .open(&path)?
        };

        debug!(path = %path.display(), read_only = config.read_only, "Opened region file");

        Ok(Self {
            path,
            config,
            file: Some(file),
            state: HandleState::Uninitialized,
            tables: HeaderTables::new(),
            allocator: SectorAllocator::new(),
            dirty: false,
        })
    }

    /// Forward-only scan of a region file in on-disk order
    pub fn chunks(path: impl AsRef<Path>) -> Result<RegionChunkIterator> {
        RegionChunkIterator::open(path)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    pub fn has_slot(&mut self, index: SlotIndex) -> Result<bool> {
        self.ensure_initialized()?;
        Ok(self.tables.block(index).is_some())
    }

    /// Timestamp of the slot, or None when it is empty
    pub fn timestamp(&mut self, index: SlotIndex) -> Result<Option<i32>> {
        self.ensure_initialized()?;
        Ok(self.tables.timestamp(index))
    }

    /// Occupied slots in ascending index order
    pub fn occupied_slots(&mut self) -> Result<Vec<SlotIndex>> {
        self.ensure_initialized()?;
        Ok(self.tables.occupied().map(|(index, _)| index).collect())
    }

    /// Location of the slot's record, if occupied
    pub fn sector_block(&mut self, index: SlotIndex) -> Result<Option<SectorBlock>> {
        self.ensure_initialized()?;
        Ok(self.tables.block(index))
    }

    /// Read the raw record bytes (compression id + compressed payload)
    ///
    /// Returns:
    /// - `Ok(Some(bytes))`: slot occupied
    /// - `Ok(None)`: slot empty
    /// - `Err(CorruptFile)`: declared length overruns the allocated sectors
    pub fn read(&mut self, index: SlotIndex) -> Result<Option<Vec<u8>>> {
        self.ensure_initialized()?;

        let Some(block) = self.tables.block(index) else {
            return Ok(None);
        };

        let file = self.file.as_mut().ok_or(RegionError::FileClosed)?;
        file.seek(SeekFrom::Start(block.byte_offset()))?;

        let mut len_bytes = [0u8; 4];
        file.read_exact(&mut len_bytes)?;
        let length = i32::from_be_bytes(len_bytes);

        if length < 0 || length as u64 + 4 > block.byte_len() as u64 {
            return Err(RegionError::CorruptFile(format!(
                "slot {} declares {} bytes but owns {} sectors at sector {}",
                index, length, block.count, block.start
            )));
        }

        let mut data = vec![0u8; length as usize];
        file.read_exact(&mut data)?;
        Ok(Some(data))
    }

    /// Read and decode a slot with a caller-supplied codec
    pub fn read_decoded<C: PayloadCodec>(
        &mut self,
        index: SlotIndex,
        codec: &C,
    ) -> Result<Option<C::Model>> {
        match self.read(index)? {
            Some(raw) => codec.decode(RawRecord::new(&raw)).map(Some),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Store raw record bytes in a slot
    ///
    /// Placement:
    /// - empty slot → fresh allocation
    /// - same sector count → rewrite in place
    /// - fewer sectors → keep the start, release the trailing remainder
    /// - more sectors → release the old block, allocate a new one
    pub fn write(&mut self, index: SlotIndex, timestamp: i32, raw: &[u8]) -> Result<()> {
        self.ensure_initialized()?;
        self.ensure_writable("write")?;

        let required = required_sectors(raw.len() + 4);
        if required > MAX_SECTOR_COUNT {
            return Err(RegionError::PayloadTooLarge {
                index: index.get(),
                sectors: required,
            });
        }
        let required = required as u32;

        let file = self.file.as_mut().ok_or(RegionError::FileClosed)?;
        let current = self.tables.block(index);
        let block = store_record(file, &mut self.allocator, current, raw, required)?;

        debug!(
            slot = %index,
            bytes = raw.len(),
            start = block.start,
            sectors = block.count,
            "Wrote record"
        );

        // Only after the payload is on disk
        self.tables.set(index, block, timestamp);
        self.dirty = true;

        Ok(())
    }

    /// Encode a model with a caller-supplied codec and store it
    pub fn write_encoded<C: PayloadCodec>(
        &mut self,
        index: SlotIndex,
        timestamp: i32,
        model: &C::Model,
        codec: &C,
    ) -> Result<()> {
        let raw = codec.encode(model)?;
        self.write(index, timestamp, &raw)
    }

    /// Mark a slot empty and release its sectors
    ///
    /// The record bytes stay on disk until `optimize()` or an overwrite
    /// reclaims them. Returns false if the slot was already empty.
    pub fn remove(&mut self, index: SlotIndex) -> Result<bool> {
        self.ensure_initialized()?;
        self.ensure_writable("remove")?;

        let Some(block) = self.tables.block(index) else {
            return Ok(false);
        };

        self.allocator.release(block);
        self.tables.clear(index);
        self.dirty = true;

        debug!(slot = %index, start = block.start, sectors = block.count, "Removed record");
        Ok(true)
    }

    /// Compact the file and persist the relocated header
    ///
    /// Returns the number of bytes the file shrank by.
    pub fn optimize(&mut self) -> Result<u64> {
        self.ensure_initialized()?;
        self.ensure_writable("optimize")?;

        let file = self.file.as_mut().ok_or(RegionError::FileClosed)?;
        let reclaimed = self.allocator.compact(file, &mut self.tables)?;
        self.dirty = true;
        self.flush()?;

        info!(path = %self.path.display(), reclaimed, "Optimized region file");
        Ok(reclaimed)
    }

    /// Write the in-memory tables to the header sectors
    ///
    /// Always rewrites both tables. No-op on read-only handles and on handles
    /// that were never initialized.
    pub fn flush(&mut self) -> Result<()> {
        match self.state {
            HandleState::Finalized => return Err(RegionError::FileClosed),
            HandleState::Uninitialized => return Ok(()),
            HandleState::Initialized => {}
        }

        if self.config.read_only {
            return Ok(());
        }

        let file = self.file.as_mut().ok_or(RegionError::FileClosed)?;
        file.seek(SeekFrom::Start(0))?;
        self.tables.write_to(file)?;
        file.flush()?;
        self.dirty = false;

        debug!(path = %self.path.display(), "Flushed region header");
        Ok(())
    }

    /// Flush (optionally optimizing first) and release the file handle
    ///
    /// Idempotent. The handle and allocator state are released even when the
    /// final flush fails; the error is still returned.
    pub fn close(&mut self) -> Result<()> {
        if self.state == HandleState::Finalized {
            return Ok(());
        }

        let result = if self.state == HandleState::Initialized && !self.config.read_only {
            let optimized = if self.config.optimize_on_close {
                self.optimize().map(|_| ())
            } else {
                Ok(())
            };
            optimized.and_then(|_| self.flush())
        } else {
            Ok(())
        };

        self.file = None;
        self.allocator.clear();
        self.tables = HeaderTables::new();
        self.state = HandleState::Finalized;

        info!(path = %self.path.display(), "Closed region file");
        result
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Space usage snapshot
    pub fn stats(&mut self) -> Result<RegionStats> {
        self.ensure_initialized()?;

        let file = self.file.as_ref().ok_or(RegionError::FileClosed)?;
        let file_len = file.metadata()?.len();

        Ok(RegionStats {
            occupied_slots: self.tables.occupied_count(),
            used_sectors: self.tables.occupied().map(|(_, block)| block.count).sum(),
            free_sectors: self.allocator.free_sectors(),
            free_blocks: self.allocator.free_blocks().len(),
            append_cursor: self.allocator.append_cursor(),
            file_len,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    pub fn is_closed(&self) -> bool {
        self.state == HandleState::Finalized
    }

    /// Tables changed since the last flush
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_initialized(&mut self) -> Result<()> {
        match self.state {
            HandleState::Initialized => Ok(()),
            HandleState::Finalized => Err(RegionError::FileClosed),
            HandleState::Uninitialized => self.initialize(),
        }
    }

    /// Load the header (or lay down an empty one) and sync the allocator
    fn initialize(&mut self) -> Result<()> {
        let file = self.file.as_mut().ok_or(RegionError::FileClosed)?;
        let len = file.metadata()?.len();

        let tables = if len >= HEADER_SIZE as u64 {
            file.seek(SeekFrom::Start(0))?;
            HeaderTables::read_from(file)?
        } else {
            if !self.config.read_only {
                if len > 0 {
                    warn!(path = %self.path.display(), len, "Header truncated, resetting file");
                }
                file.set_len(0)?;
                file.set_len(HEADER_SIZE as u64)?;
            }
            HeaderTables::new()
        };

        self.allocator.sync(&tables)?;
        self.tables = tables;
        self.state = HandleState::Initialized;

        if len % SECTOR_SIZE as u64 != 0 {
            debug!(path = %self.path.display(), len, "File length is not sector aligned");
        }

        debug!(
            path = %self.path.display(),
            occupied = self.tables.occupied_count(),
            append_cursor = self.allocator.append_cursor(),
            "Loaded region header"
        );
        Ok(())
    }

    fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        if self.config.read_only {
            return Err(RegionError::ReadOnlyViolation { operation });
        }
        Ok(())
    }
}

/// Place a record for a slot currently holding `current` and write it
///
/// On a device error the allocator is rolled back, leaving it in step with
/// the unchanged tables.
fn store_record<D: Write + Seek>(
    device: &mut D,
    allocator: &mut SectorAllocator,
    current: Option<SectorBlock>,
    raw: &[u8],
    required: u32,
) -> Result<SectorBlock> {
    let snapshot = allocator.clone();

    let block = match current {
        None => allocator.allocate(required),
        Some(old) if old.count == required => old,
        Some(old) if old.count > required => {
            allocator.release(SectorBlock::new(old.start + required, old.count - required));
            SectorBlock::new(old.start, required)
        }
        Some(old) => {
            allocator.release(old);
            allocator.allocate(required)
        }
    };

    let record = encode_record(raw, required);
    let written = device
        .seek(SeekFrom::Start(block.byte_offset()))
        .and_then(|_| device.write_all(&record));

    if let Err(e) = written {
        *allocator = snapshot;
        return Err(e.into());
    }
    Ok(block)
}

impl RegionSink for RegionFile {
    fn write_slot(&mut self, index: SlotIndex, timestamp: i32, raw: &[u8]) -> Result<()> {
        self.write(index, timestamp, raw)
    }
}

impl Drop for RegionFile {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = %self.path.display(), error = %e, "Failed to close region file");
        }
    }
}
