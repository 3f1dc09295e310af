//! Error types for SegLog
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using SegLogError
pub type Result<T> = std::result::Result<T, SegLogError>;

/// Unified error type for SegLog operations
#[derive(Debug, Error)]
pub enum SegLogError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Entry Errors
    // -------------------------------------------------------------------------
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Entry at {location} belongs to stream {found_stream} seq {found_sequence}, expected stream {expected_stream} seq {expected_sequence}")]
    EntryMismatch {
        location: String,
        expected_stream: u64,
        expected_sequence: u64,
        found_stream: u64,
        found_sequence: u64,
    },

    // -------------------------------------------------------------------------
    // Segment Errors
    // -------------------------------------------------------------------------
    #[error("Segment {0} not found")]
    SegmentNotFound(u64),

    #[error("Segment allocation failed: {0}")]
    AllocationFailure(String),

    #[error("Segment corruption detected: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Log engine is shut down")]
    ShutDown,
}

impl SegLogError {
    /// Returns true if this error came from the backing store.
    pub fn is_io(&self) -> bool {
        matches!(self, SegLogError::Io(_))
    }
}
