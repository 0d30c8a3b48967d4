//! Streaming Region Writer
//!
//! Append-only, single-pass construction of a region container.
//!
//! Records are laid out back to back in write order, starting at sector 2.
//! Existing content is discarded on the first write, not at `create()`. The
//! header is only written by `close()`/`finish()`, so a writer abandoned after
//! its first write leaves a file that every reader sees as empty, and one
//! abandoned before any write leaves the file as it was.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{RegionError, Result};
use crate::record::RegionSink;
use crate::slot::{required_sectors, SlotIndex, FIRST_DATA_SECTOR, HEADER_SIZE, MAX_SECTOR_COUNT};

use super::{encode_record, HeaderTables, SectorBlock};

/// Summary returned by [`StreamingRegionWriter::finish`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreamingSummary {
    pub slots_written: usize,
    /// Record sectors, header excluded
    pub sectors_written: u32,
}

/// Write-only builder for a fresh region container
pub struct StreamingRegionWriter {
    path: PathBuf,
    /// None once closed
    writer: Option<BufWriter<File>>,
    /// Entries recorded this session
    tables: HeaderTables,
    /// Sector where the next record starts
    next_sector: u32,
    /// Header region has been zero-filled
    started: bool,
    summary: StreamingSummary,
}

impl StreamingRegionWriter {
    /// Open (or create) the target file. Existing content is discarded on
    /// the first write.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            tables: HeaderTables::new(),
            next_sector: FIRST_DATA_SECTOR,
            started: false,
            summary: StreamingSummary::default(),
        })
    }

    /// Append a record for a slot not yet written in this session
    pub fn write(&mut self, index: SlotIndex, timestamp: i32, raw: &[u8]) -> Result<()> {
        if self.writer.is_none() {
            return Err(RegionError::FileClosed);
        }
        if self.tables.block(index).is_some() {
            return Err(RegionError::AlreadyWritten { index: index.get() });
        }

        let required = required_sectors(raw.len() + 4);
        if required > MAX_SECTOR_COUNT {
            return Err(RegionError::PayloadTooLarge {
                index: index.get(),
                sectors: required,
            });
        }
        let required = required as u32;

        self.start()?;

        let block = SectorBlock::new(self.next_sector, required);
        let writer = self.writer.as_mut().ok_or(RegionError::FileClosed)?;
        writer.write_all(&encode_record(raw, required))?;

        self.tables.set(index, block, timestamp);
        self.next_sector = block.end();
        self.summary.slots_written += 1;
        self.summary.sectors_written += required;

        debug!(slot = %index, start = block.start, sectors = required, "Streamed record");
        Ok(())
    }

    /// Write the header and release the file. Idempotent.
    pub fn close(&mut self) -> Result<()> {
        if self.writer.is_none() {
            return Ok(());
        }

        self.start()?;

        // Take the writer first so a failed header write still releases it
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer.flush()?;
        writer.seek(SeekFrom::Start(0))?;
        self.tables.write_to(&mut writer)?;
        writer.flush()?;

        info!(
            path = %self.path.display(),
            slots = self.summary.slots_written,
            sectors = self.summary.sectors_written,
            "Finished streaming region file"
        );
        Ok(())
    }

    /// Close and report what was written
    pub fn finish(mut self) -> Result<StreamingSummary> {
        self.close()?;
        Ok(self.summary)
    }

    pub fn summary(&self) -> StreamingSummary {
        self.summary
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Truncate the target and zero-fill the header region, once
    fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }

        let writer = self.writer.as_mut().ok_or(RegionError::FileClosed)?;
        writer.get_ref().set_len(0)?;
        writer.seek(SeekFrom::Start(0))?;
        writer.write_all(&[0u8; HEADER_SIZE])?;
        self.started = true;
        Ok(())
    }
}

impl RegionSink for StreamingRegionWriter {
    fn write_slot(&mut self, index: SlotIndex, timestamp: i32, raw: &[u8]) -> Result<()> {
        self.write(index, timestamp, raw)
    }
}
