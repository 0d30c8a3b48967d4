//! Record payloads and the codec capability
//!
//! The engine stores raw record bytes: one compression id byte followed by
//! the compressed payload. Interpreting those bytes belongs to a caller
//! supplied [`PayloadCodec`].
//!
//! ## Record Layout
//! ```text
//! ┌────────────┬──────────────────┬─────────────────────┬──────────────┐
//! │ Length (4) │ CompressionId(1) │  Compressed bytes   │ Zero padding │
//! └────────────┴──────────────────┴─────────────────────┴──────────────┘
//!               └──────────── raw record bytes ───────┘
//! ```

use crate::error::{RegionError, Result};
use crate::slot::SlotIndex;

/// Compression id byte stored at the start of every record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompressionId {
    Gzip,
    Zlib,
    Uncompressed,
    Lz4,
    /// Any id this crate has no name for
    Custom(u8),
}

impl CompressionId {
    pub fn as_u8(self) -> u8 {
        match self {
            CompressionId::Gzip => 1,
            CompressionId::Zlib => 2,
            CompressionId::Uncompressed => 3,
            CompressionId::Lz4 => 4,
            CompressionId::Custom(id) => id,
        }
    }
}

impl From<u8> for CompressionId {
    fn from(id: u8) -> Self {
        match id {
            1 => CompressionId::Gzip,
            2 => CompressionId::Zlib,
            3 => CompressionId::Uncompressed,
            4 => CompressionId::Lz4,
            other => CompressionId::Custom(other),
        }
    }
}

/// Borrowed view over raw record bytes
#[derive(Debug, Clone, Copy)]
pub struct RawRecord<'a> {
    bytes: &'a [u8],
}

impl<'a> RawRecord<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// The compression id, or None for an empty record
    pub fn compression_id(&self) -> Option<CompressionId> {
        self.bytes.first().map(|&id| CompressionId::from(id))
    }

    /// Bytes after the compression id
    pub fn payload(&self) -> &'a [u8] {
        self.bytes.get(1..).unwrap_or(&[])
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }
}

// =============================================================================
// Capabilities
// =============================================================================

/// Converts between an in-memory model and raw record bytes
pub trait PayloadCodec {
    type Model;

    /// Encode a model into raw record bytes, compression id included
    fn encode(&self, model: &Self::Model) -> Result<Vec<u8>>;

    /// Decode raw record bytes back into a model
    fn decode(&self, record: RawRecord<'_>) -> Result<Self::Model>;
}

/// Anything that accepts raw records slot by slot
pub trait RegionSink {
    fn write_slot(&mut self, index: SlotIndex, timestamp: i32, raw: &[u8]) -> Result<()>;
}

/// Codec that stores payload bytes as-is behind a fixed compression id
#[derive(Debug, Clone, Copy)]
pub struct PassthroughCodec {
    compression: CompressionId,
}

impl PassthroughCodec {
    pub fn new(compression: CompressionId) -> Self {
        Self { compression }
    }
}

impl Default for PassthroughCodec {
    fn default() -> Self {
        Self::new(CompressionId::Uncompressed)
    }
}

impl PayloadCodec for PassthroughCodec {
    type Model = Vec<u8>;

    fn encode(&self, model: &Vec<u8>) -> Result<Vec<u8>> {
        let mut raw = Vec::with_capacity(1 + model.len());
        raw.push(self.compression.as_u8());
        raw.extend_from_slice(model);
        Ok(raw)
    }

    fn decode(&self, record: RawRecord<'_>) -> Result<Vec<u8>> {
        match record.compression_id() {
            Some(id) if id == self.compression => Ok(record.payload().to_vec()),
            Some(id) => Err(RegionError::Codec(format!(
                "expected compression {:?}, found {:?}",
                self.compression, id
            ))),
            None => Err(RegionError::Codec("empty record".to_string())),
        }
    }
}
