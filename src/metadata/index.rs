//! Index region codec
//!
//! The index region is written once, when a segment is rotated, and lets the
//! metadata be rebuilt without walking every frame.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SegLogError};
use crate::types::{SegmentId, StreamId};

use super::SegmentMetadata;

#[derive(Debug, Serialize, Deserialize)]
struct IndexRegion {
    /// (stream, bytes) pairs in stream order
    streams: Vec<(u64, u64)>,
}

/// Encode the metadata into index-region bytes and their CRC32
pub(crate) fn encode(metadata: &SegmentMetadata) -> Result<(Vec<u8>, u32)> {
    let region = IndexRegion {
        streams: metadata
            .streams()
            .iter()
            .map(|(stream, size)| (stream.get(), *size))
            .collect(),
    };

    let bytes = bincode::serialize(&region)?;
    let crc = crc32fast::hash(&bytes);
    Ok((bytes, crc))
}

/// Decode index-region bytes after checking their CRC32
pub(crate) fn decode(segment_id: SegmentId, bytes: &[u8], expected_crc: u32) -> Result<SegmentMetadata> {
    let actual_crc = crc32fast::hash(bytes);
    if actual_crc != expected_crc {
        return Err(SegLogError::Corruption(format!(
            "Index CRC mismatch in segment {}: expected {:#010x}, got {:#010x}",
            segment_id, expected_crc, actual_crc
        )));
    }

    let region: IndexRegion = bincode::deserialize(bytes)?;

    let mut metadata = SegmentMetadata::new(segment_id);
    for (stream, size) in region.streams {
        let stream = StreamId::new(stream);
        if metadata.contains_stream(stream) {
            return Err(SegLogError::Corruption(format!(
                "Stream {} listed twice in index of segment {}",
                stream, segment_id
            )));
        }
        metadata.add_stream_size(stream, size);
    }

    Ok(metadata)
}
