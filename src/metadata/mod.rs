//! Segment Metadata Module
//!
//! Per-segment accounting of which streams wrote into a segment and how many
//! bytes each contributed. Space reclamation uses it to decide how much of a
//! segment is still live.
//!
//! ## Responsibilities
//! - Running metadata of open segments (maintained by the channel)
//! - Encoding/decoding the trailing index region
//! - Rebuilding metadata of any segment on demand (index or scan)

mod extractor;
pub(crate) mod index;

use std::collections::BTreeMap;

use crate::types::{SegmentId, StreamId};

pub use extractor::MetadataExtractor;

/// Streams contained in one segment and the bytes each contributed
///
/// Sizes include the 4-byte length prefix of every entry frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMetadata {
    segment_id: SegmentId,
    streams: BTreeMap<StreamId, u64>,
    total_size: u64,
    remaining_size: u64,
}

impl SegmentMetadata {
    pub fn new(segment_id: SegmentId) -> Self {
        Self {
            segment_id,
            streams: BTreeMap::new(),
            total_size: 0,
            remaining_size: 0,
        }
    }

    /// Account `size` more bytes to `stream_id`
    pub fn add_stream_size(&mut self, stream_id: StreamId, size: u64) {
        *self.streams.entry(stream_id).or_insert(0) += size;
        self.total_size += size;
        self.remaining_size += size;
    }

    /// Drop a stream whose data is no longer live. Total size is kept so that
    /// `usage()` reflects how much of the segment is still referenced.
    pub fn remove_stream(&mut self, stream_id: StreamId) -> Option<u64> {
        let size = self.streams.remove(&stream_id)?;
        self.remaining_size -= size;
        Some(size)
    }

    pub fn segment_id(&self) -> SegmentId {
        self.segment_id
    }

    pub fn contains_stream(&self, stream_id: StreamId) -> bool {
        self.streams.contains_key(&stream_id)
    }

    pub fn stream_size(&self, stream_id: StreamId) -> Option<u64> {
        self.streams.get(&stream_id).copied()
    }

    pub fn streams(&self) -> &BTreeMap<StreamId, u64> {
        &self.streams
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn remaining_size(&self) -> u64 {
        self.remaining_size
    }

    /// Fraction of the written bytes still live (0.0 for an empty segment)
    pub fn usage(&self) -> f64 {
        if self.total_size == 0 {
            return 0.0;
        }
        self.remaining_size as f64 / self.total_size as f64
    }

    /// True when no stream has live data in the segment
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_accumulate_per_stream() {
        let mut meta = SegmentMetadata::new(SegmentId::new(0));
        meta.add_stream_size(StreamId::new(1), 30);
        meta.add_stream_size(StreamId::new(2), 10);
        meta.add_stream_size(StreamId::new(1), 20);

        assert_eq!(meta.stream_size(StreamId::new(1)), Some(50));
        assert_eq!(meta.stream_size(StreamId::new(2)), Some(10));
        assert_eq!(meta.total_size(), 60);
        assert_eq!(meta.stream_count(), 2);
    }

    #[test]
    fn removing_streams_lowers_usage() {
        let mut meta = SegmentMetadata::new(SegmentId::new(0));
        meta.add_stream_size(StreamId::new(1), 75);
        meta.add_stream_size(StreamId::new(2), 25);

        assert_eq!(meta.remove_stream(StreamId::new(1)), Some(75));
        assert_eq!(meta.remove_stream(StreamId::new(1)), None);
        assert_eq!(meta.remaining_size(), 25);
        assert!((meta.usage() - 0.25).abs() < f64::EPSILON);

        meta.remove_stream(StreamId::new(2));
        assert!(meta.is_empty());
        assert_eq!(meta.usage(), 0.0);
    }
}
