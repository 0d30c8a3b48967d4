//! Bulk copy between region containers
//!
//! Scans a source in file order and feeds every record into a sink. Rebuilding
//! through a [`StreamingRegionWriter`] yields a gap-free container.

use std::fs;
use std::io;
use std::path::Path;

use tracing::info;

use crate::error::Result;
use crate::record::RegionSink;

use super::{RegionChunkIterator, StreamingRegionWriter, StreamingSummary};

/// Feed every remaining chunk into `sink`, returning how many were copied
pub fn copy_chunks<S: RegionSink>(chunks: &mut RegionChunkIterator, sink: &mut S) -> Result<usize> {
    let mut copied = 0;
    for chunk in chunks {
        let chunk = chunk?;
        sink.write_slot(chunk.index, chunk.timestamp, &chunk.data)?;
        copied += 1;
    }
    Ok(copied)
}

/// Rewrite `src` into a fresh, densely packed container at `dst`
///
/// Indices, timestamps and raw record bytes are preserved. `dst` must not be
/// the same file as `src`.
pub fn rebuild(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<StreamingSummary> {
    let (src, dst) = (src.as_ref(), dst.as_ref());

    if dst.exists() && fs::canonicalize(src)? == fs::canonicalize(dst)? {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("cannot rebuild {} onto itself", src.display()),
        )
        .into());
    }

    let mut chunks = RegionChunkIterator::open(src)?;
    let mut writer = StreamingRegionWriter::create(dst)?;
    copy_chunks(&mut chunks, &mut writer)?;
    let summary = writer.finish()?;

    info!(
        src = %src.display(),
        dst = %dst.display(),
        slots = summary.slots_written,
        "Rebuilt region file"
    );
    Ok(summary)
}
