//! Entry framing
//!
//! An entry payload always begins with the stream id and sequence number it
//! belongs to, followed by opaque data. On disk every payload is prefixed with
//! its length.
//!
//! ```text
//! ┌─────────┬────────────┬──────────────┬──────────┐
//! │ Len (4) │ Stream (8) │ Sequence (8) │   Data   │
//! └─────────┴────────────┴──────────────┴──────────┘
//!           └──────────── payload (Len bytes) ──────┘
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, SegLogError};
use crate::types::StreamId;

use super::header::read_u64;
use super::{HEADER_SIZE, MAX_SEGMENT_OFFSET};

/// Size of the length prefix in front of every payload
pub const FRAME_LEN_SIZE: usize = 4;

/// Stream (8) + Sequence (8) at the start of every payload
pub const ENTRY_HEADER_SIZE: usize = 16;

/// Largest payload that still fits in an otherwise empty segment
pub const MAX_PAYLOAD_SIZE: usize = (MAX_SEGMENT_OFFSET - HEADER_SIZE) as usize - FRAME_LEN_SIZE;

/// Stream and sequence carried at the start of a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryHeader {
    pub stream_id: StreamId,
    pub sequence: u64,
}

/// Build a payload for `stream_id`/`sequence` carrying `data`
pub fn encode_payload(stream_id: StreamId, sequence: u64, data: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(ENTRY_HEADER_SIZE + data.len());
    buf.put_u64_le(stream_id.get());
    buf.put_u64_le(sequence);
    buf.put_slice(data);
    buf.freeze()
}

/// Read the stream/sequence header of a payload
pub fn parse_header(payload: &[u8]) -> Result<EntryHeader> {
    if payload.len() < ENTRY_HEADER_SIZE {
        return Err(SegLogError::InvalidEntry(format!(
            "payload of {} bytes cannot carry the {}-byte entry header",
            payload.len(),
            ENTRY_HEADER_SIZE
        )));
    }

    Ok(EntryHeader {
        stream_id: StreamId::new(read_u64(payload, 0)),
        sequence: read_u64(payload, 8),
    })
}

/// Check that `payload` is a complete entry for `stream_id`.
///
/// Empty or truncated payloads, payloads written under
/// [`StreamId::UNASSIGNED`], and payloads whose embedded stream differs from
/// `stream_id` are all rejected before anything reaches a segment.
pub fn validate(stream_id: StreamId, payload: &[u8]) -> Result<EntryHeader> {
    if stream_id.is_unassigned() {
        return Err(SegLogError::InvalidEntry(
            "entries cannot be written to the unassigned stream".to_string(),
        ));
    }

    let header = parse_header(payload)?;

    if header.stream_id != stream_id {
        return Err(SegLogError::InvalidEntry(format!(
            "payload belongs to stream {} but was appended to stream {}",
            header.stream_id, stream_id
        )));
    }

    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(SegLogError::InvalidEntry(format!(
            "payload of {} bytes exceeds the maximum of {}",
            payload.len(),
            MAX_PAYLOAD_SIZE
        )));
    }

    Ok(header)
}

/// Bytes a payload occupies in a segment, length prefix included
pub fn frame_size(payload_len: usize) -> u64 {
    (FRAME_LEN_SIZE + payload_len) as u64
}

/// Prefix a payload with its length
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(FRAME_LEN_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(payload);
    frame
}
