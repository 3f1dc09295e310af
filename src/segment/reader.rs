//! Segment Reader
//!
//! Opens segment files for metadata extraction and entry reads.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;

use crate::error::{Result, SegLogError};
use crate::metadata::{index, SegmentMetadata};
use crate::types::{SegmentId, StreamId};

use super::entry::{ENTRY_HEADER_SIZE, FRAME_LEN_SIZE};
use super::header::read_u64;
use super::{SegmentHeader, HEADER_FIELDS_SIZE, HEADER_SIZE};

/// Reader over one segment file
pub struct SegmentReader {
    id: SegmentId,
    file: BufReader<File>,
    header: SegmentHeader,
    file_len: u64,
}

impl SegmentReader {
    /// Open a segment and validate its header
    pub fn open(id: SegmentId, path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        if file_len < HEADER_SIZE {
            return Err(SegLogError::Corruption(format!(
                "Segment {} is {} bytes, shorter than its header",
                id, file_len
            )));
        }

        let mut fields = [0u8; HEADER_FIELDS_SIZE];
        file.read_exact(&mut fields)?;
        let header = SegmentHeader::decode(&fields)?;

        Ok(Self {
            id,
            file: BufReader::new(file),
            header,
            file_len,
        })
    }

    pub fn header(&self) -> &SegmentHeader {
        &self.header
    }

    /// End of the entry frames: the index region if one was written,
    /// otherwise the end of the file
    fn frames_end(&self) -> u64 {
        if self.header.has_index() {
            self.header.index_offset
        } else {
            self.file_len
        }
    }

    /// Metadata from the index region; `None` if the segment was never sealed
    pub fn read_index(&mut self) -> Result<Option<SegmentMetadata>> {
        if !self.header.has_index() {
            return Ok(None);
        }

        let end = self.header.index_offset + self.header.index_len as u64;
        if end > self.file_len {
            return Err(SegLogError::Corruption(format!(
                "Index of segment {} ends at {} past file length {}",
                self.id, end, self.file_len
            )));
        }

        self.file.seek(SeekFrom::Start(self.header.index_offset))?;
        let mut region = vec![0u8; self.header.index_len as usize];
        self.file.read_exact(&mut region)?;

        index::decode(self.id, &region, self.header.index_crc).map(Some)
    }

    /// Metadata rebuilt by walking every entry frame.
    ///
    /// A frame cut off by the end of the file is the tail of an unfinished
    /// write; the scan stops there.
    pub fn scan(&mut self) -> Result<SegmentMetadata> {
        let end = self.frames_end();
        let mut metadata = SegmentMetadata::new(self.id);
        let mut pos = HEADER_SIZE;

        self.file.seek(SeekFrom::Start(pos))?;

        while pos + FRAME_LEN_SIZE as u64 <= end {
            let mut len_buf = [0u8; FRAME_LEN_SIZE];
            self.file.read_exact(&mut len_buf)?;
            let len = u32::from_le_bytes(len_buf) as u64;

            let frame_end = pos + FRAME_LEN_SIZE as u64 + len;
            if frame_end > end {
                tracing::warn!(
                    segment = %self.id,
                    offset = pos,
                    "partial entry at end of segment, stopping scan"
                );
                break;
            }

            if len < ENTRY_HEADER_SIZE as u64 {
                return Err(SegLogError::Corruption(format!(
                    "Entry at {} in segment {} is {} bytes, shorter than its header",
                    pos, self.id, len
                )));
            }

            let mut entry_header = [0u8; ENTRY_HEADER_SIZE];
            self.file.read_exact(&mut entry_header)?;
            let stream = StreamId::new(read_u64(&entry_header, 0));

            self.file
                .seek_relative((len - ENTRY_HEADER_SIZE as u64) as i64)?;

            metadata.add_stream_size(stream, FRAME_LEN_SIZE as u64 + len);
            pos = frame_end;
        }

        Ok(metadata)
    }

    /// Payload of the frame starting at `offset`
    pub fn read_frame(&mut self, offset: u64) -> Result<Bytes> {
        let end = self.frames_end();
        let len_end = offset.checked_add(FRAME_LEN_SIZE as u64);
        if offset < HEADER_SIZE || len_end.map_or(true, |len_end| len_end > end) {
            return Err(SegLogError::Corruption(format!(
                "Offset {} is outside the entries of segment {}",
                offset, self.id
            )));
        }

        self.file.seek(SeekFrom::Start(offset))?;
        let mut len_buf = [0u8; FRAME_LEN_SIZE];
        self.file.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as u64;

        let frame_end = (offset + FRAME_LEN_SIZE as u64).checked_add(len);
        if frame_end.map_or(true, |frame_end| frame_end > end) {
            return Err(SegLogError::Corruption(format!(
                "Entry at {} in segment {} runs past the end of its entries",
                offset, self.id
            )));
        }

        let mut payload = vec![0u8; len as usize];
        self.file.read_exact(&mut payload)?;
        Ok(Bytes::from(payload))
    }
}
