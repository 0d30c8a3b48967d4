//! # regionstore
//!
//! A random-access storage engine for region containers: one file holding up
//! to 1024 independently sized, compressed records with:
//! - First-fit sector allocation with a merging free list
//! - In-place update and lazy removal
//! - On-demand compaction with physical relocation
//! - Append-only bulk writing and file-order bulk scanning
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Caller + PayloadCodec                        │
//! │            (encodes/decodes raw record bytes)                │
//! └───────┬──────────────────────┬──────────────────────┬───────┘
//!         │                      │                      │
//!         ▼                      ▼                      ▼
//!  ┌─────────────┐     ┌───────────────────┐   ┌────────────────┐
//!  │ RegionFile  │     │ StreamingRegion-  │   │ RegionChunk-   │
//!  │ (random     │     │ Writer (append    │   │ Iterator (file │
//!  │  access)    │     │  only)            │   │  order scan)   │
//!  └──────┬──────┘     └───────────────────┘   └────────────────┘
//!         │
//!         ▼
//!  ┌─────────────────┐   ┌──────────────┐
//!  │ SectorAllocator │◄──│ HeaderTables │
//!  │ (free list)     │   │ (2 sectors)  │
//!  └─────────────────┘   └──────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod slot;
pub mod record;
pub mod storage;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{RegionError, Result};
pub use config::RegionConfig;
pub use record::{CompressionId, PassthroughCodec, PayloadCodec, RawRecord, RegionSink};
pub use slot::{RegionAddress, SlotIndex};
pub use storage::{RegionChunkIterator, RegionFile, StreamingRegionWriter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of regionstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current time as epoch seconds, the unit of the timestamp table
pub fn current_timestamp() -> i32 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i32)
        .unwrap_or(0)
}
