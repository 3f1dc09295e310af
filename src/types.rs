//! Identifier types shared across the engine.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a logical stream (a ledger) multiplexed into segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamId(u64);

impl StreamId {
    /// Marks rotations and administrative calls not attributed to any stream.
    pub const UNASSIGNED: StreamId = StreamId(u64::MAX);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_unassigned(self) -> bool {
        self.0 == u64::MAX
    }
}

impl From<u64> for StreamId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unassigned() {
            write!(f, "unassigned")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Identifier of one segment file.
///
/// Ids are handed out by the allocator in strictly increasing order.
/// `UNINITIALIZED` is what the manager reports before any segment exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentId(u64);

impl SegmentId {
    pub const UNINITIALIZED: SegmentId = SegmentId(u64::MAX);

    /// The first id handed out in a directory set with no prior segments.
    pub const FIRST: SegmentId = SegmentId(0);

    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub const fn is_uninitialized(self) -> bool {
        self.0 == u64::MAX
    }

    /// The id allocated after this one. `UNINITIALIZED` is followed by `FIRST`.
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl From<u64> for SegmentId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_uninitialized() {
            write!(f, "uninitialized")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Address of an entry: the segment it lives in and the byte offset of its
/// frame inside that segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntryLocation {
    pub segment_id: SegmentId,
    pub offset: u64,
}

impl EntryLocation {
    pub const fn new(segment_id: SegmentId, offset: u64) -> Self {
        Self { segment_id, offset }
    }

    /// Packs the location into one word: segment id in the high 32 bits,
    /// offset in the low 32 bits.
    ///
    /// Returns `None` when either half does not fit in 32 bits.
    pub const fn to_packed(self) -> Option<u64> {
        let segment = self.segment_id.get();
        if segment > u32::MAX as u64 || self.offset > u32::MAX as u64 {
            return None;
        }
        Some((segment << 32) | self.offset)
    }

    pub const fn from_packed(packed: u64) -> Self {
        Self {
            segment_id: SegmentId::new(packed >> 32),
            offset: packed & 0xFFFF_FFFF,
        }
    }
}

impl fmt::Display for EntryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.segment_id, self.offset)
    }
}
