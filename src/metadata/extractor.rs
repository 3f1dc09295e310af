//! Metadata Extractor
//!
//! Locates segment files and rebuilds their metadata on demand.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;

use crate::dirs::SegmentDirs;
use crate::error::{Result, SegLogError};
use crate::segment::entry::{self, ENTRY_HEADER_SIZE};
use crate::segment::{segment_path, SegmentReader};
use crate::types::{EntryLocation, SegmentId, StreamId};

use super::SegmentMetadata;

/// Rebuilds [`SegmentMetadata`] and reads entries from segment files
pub struct MetadataExtractor {
    dirs: Arc<dyn SegmentDirs>,
}

impl MetadataExtractor {
    pub fn new(dirs: Arc<dyn SegmentDirs>) -> Self {
        Self { dirs }
    }

    /// Path of an existing segment file
    ///
    /// Returns `SegmentNotFound` if no directory holds the segment.
    pub fn locate(&self, segment_id: SegmentId) -> Result<PathBuf> {
        if segment_id.is_uninitialized() {
            return Err(SegLogError::SegmentNotFound(segment_id.get()));
        }

        self.dirs
            .all_dirs()
            .iter()
            .map(|dir| segment_path(dir, segment_id))
            .find(|path| path.is_file())
            .ok_or(SegLogError::SegmentNotFound(segment_id.get()))
    }

    /// Metadata of a segment: from its index when present and valid,
    /// otherwise by scanning its entries
    pub fn extract(&self, segment_id: SegmentId) -> Result<SegmentMetadata> {
        match self.extract_from_index(segment_id) {
            Ok(metadata) => Ok(metadata),
            Err(SegLogError::SegmentNotFound(id)) => Err(SegLogError::SegmentNotFound(id)),
            Err(e) => {
                tracing::warn!(
                    segment = %segment_id,
                    error = %e,
                    "index unavailable, scanning segment"
                );
                self.extract_by_scanning(segment_id)
            }
        }
    }

    /// Metadata read from the index region only. A segment that was never
    /// sealed has no index and yields `Corruption`.
    pub fn extract_from_index(&self, segment_id: SegmentId) -> Result<SegmentMetadata> {
        let path = self.locate(segment_id)?;
        let mut reader = SegmentReader::open(segment_id, &path)?;

        reader.read_index()?.ok_or_else(|| {
            SegLogError::Corruption(format!("segment {} has no index", segment_id))
        })
    }

    /// Metadata rebuilt by walking every entry frame
    pub fn extract_by_scanning(&self, segment_id: SegmentId) -> Result<SegmentMetadata> {
        let path = self.locate(segment_id)?;
        let mut reader = SegmentReader::open(segment_id, &path)?;
        reader.scan()
    }

    /// Read the entry at `location` and check it belongs to
    /// `stream_id`/`sequence`
    pub fn read_entry(
        &self,
        stream_id: StreamId,
        sequence: u64,
        location: EntryLocation,
    ) -> Result<Bytes> {
        let path = self.locate(location.segment_id)?;
        let mut reader = SegmentReader::open(location.segment_id, &path)?;
        let payload = reader.read_frame(location.offset)?;

        if payload.len() < ENTRY_HEADER_SIZE {
            return Err(SegLogError::Corruption(format!(
                "Entry at {} is {} bytes, shorter than its header",
                location,
                payload.len()
            )));
        }

        let header = entry::parse_header(&payload)?;
        if header.stream_id != stream_id || header.sequence != sequence {
            return Err(SegLogError::EntryMismatch {
                location: location.to_string(),
                expected_stream: stream_id.get(),
                expected_sequence: sequence,
                found_stream: header.stream_id.get(),
                found_sequence: header.sequence,
            });
        }

        Ok(payload)
    }
}
