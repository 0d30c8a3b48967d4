//! Error types for regionstore
//!
//! Provides a unified error type for all region container operations.

use thiserror::Error;

/// Result type alias using RegionError
pub type Result<T> = std::result::Result<T, RegionError>;

/// Unified error type for regionstore operations
#[derive(Debug, Error)]
pub enum RegionError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Format Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt region file: {0}")]
    CorruptFile(String),

    #[error("Payload for slot {index} needs {sectors} sectors (max 255)")]
    PayloadTooLarge { index: usize, sectors: usize },

    // -------------------------------------------------------------------------
    // Handle State Errors
    // -------------------------------------------------------------------------
    #[error("Cannot {operation}: region file is opened read-only")]
    ReadOnlyViolation { operation: &'static str },

    #[error("Region file is closed")]
    FileClosed,

    #[error("Slot {index} was already written in this session")]
    AlreadyWritten { index: usize },

    // -------------------------------------------------------------------------
    // Addressing Errors
    // -------------------------------------------------------------------------
    #[error("{what} out of bounds: {value}")]
    IndexOutOfBounds { what: &'static str, value: i64 },

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Payload codec error: {0}")]
    Codec(String),
}
