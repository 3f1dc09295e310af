//! Segment Module
//!
//! One segment is one append-only file holding interleaved entries from many
//! streams.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │ Header (1024 bytes, zero padded)                            │
//! │   Magic: "SGLG" (4) | Version: u32 (4) | IndexOffset: u64 (8)│
//! │   IndexLen: u32 (4) | IndexCRC: u32 (4)                      │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Entry Frames (variable)                                     │
//! │   [Len: u32][Stream: u64][Sequence: u64][Data]              │
//! │   ... repeated for each entry ...                           │
//! │   (Len counts stream + sequence + data)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │ Index Region (written when the segment is rotated)          │
//! │   bincode(Vec<(stream: u64, bytes: u64)>)                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! `IndexOffset == 0` means the segment was never sealed and its metadata has
//! to be rebuilt by scanning the frames.

mod allocator;
mod channel;
pub mod entry;
mod header;
mod reader;
mod store;
#[cfg(test)]
pub(crate) mod testing;

use std::path::{Path, PathBuf};

use crate::types::SegmentId;

pub use allocator::SegmentAllocator;
pub use channel::SegmentChannel;
pub use header::SegmentHeader;
pub use reader::SegmentReader;
pub use store::{FileStore, SegmentStore};

// =============================================================================
// Shared Constants (used by channel, reader, allocator)
// =============================================================================

/// Magic bytes identifying a SegLog segment file
pub(crate) const MAGIC: &[u8; 4] = b"SGLG";

/// Current segment format version
pub(crate) const VERSION: u32 = 1;

/// Bytes reserved for the header; the first entry frame starts here
pub const HEADER_SIZE: u64 = 1024;

/// Bytes of the header actually used by fields:
/// Magic (4) + Version (4) + IndexOffset (8) + IndexLen (4) + IndexCRC (4)
pub(crate) const HEADER_FIELDS_SIZE: usize = 24;

/// Largest offset an entry frame may start at. Keeps packed locations in
/// the low 32 bits and below the signed range.
pub const MAX_SEGMENT_OFFSET: u64 = i32::MAX as u64;

/// Name of the per-directory marker holding the last allocated id (hex)
pub(crate) const LAST_ID_FILENAME: &str = "lastId";

// =============================================================================
// Path Helpers
// =============================================================================

/// File name of a segment: "segment_000042.log"
pub fn segment_file_name(id: SegmentId) -> String {
    format!("segment_{:06}.log", id.get())
}

/// Path of a segment inside a directory
pub fn segment_path(dir: &Path, id: SegmentId) -> PathBuf {
    dir.join(segment_file_name(id))
}

/// Parse a segment id from a file name
/// "segment_000042.log" → Some(42)
pub fn parse_segment_id(path: &Path) -> Option<SegmentId> {
    if path.extension()? != "log" {
        return None;
    }
    let name = path.file_stem()?.to_string_lossy();
    let id_str = name.strip_prefix("segment_")?;
    id_str.parse().ok().map(SegmentId::new)
}
