//! Segment Header
//!
//! Fixed-size header at the start of every segment file.

use crate::error::{Result, SegLogError};

use super::{HEADER_FIELDS_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Decoded segment header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SegmentHeader {
    /// Where the index region starts (0 = no index written yet)
    pub index_offset: u64,
    /// Length of the index region in bytes
    pub index_len: u32,
    /// CRC32 of the index region
    pub index_crc: u32,
}

impl SegmentHeader {
    /// Header of a freshly created segment: no index yet
    pub fn unsealed() -> Self {
        Self::default()
    }

    pub fn has_index(&self) -> bool {
        self.index_offset != 0
    }

    /// Encode only the used header fields
    pub fn encode_fields(&self) -> [u8; HEADER_FIELDS_SIZE] {
        let mut buf = [0u8; HEADER_FIELDS_SIZE];
        buf[0..4].copy_from_slice(MAGIC);
        buf[4..8].copy_from_slice(&VERSION.to_le_bytes());
        buf[8..16].copy_from_slice(&self.index_offset.to_le_bytes());
        buf[16..20].copy_from_slice(&self.index_len.to_le_bytes());
        buf[20..24].copy_from_slice(&self.index_crc.to_le_bytes());
        buf
    }

    /// Encode the full zero-padded header block
    pub fn encode(&self) -> Vec<u8> {
        let mut block = vec![0u8; HEADER_SIZE as usize];
        block[..HEADER_FIELDS_SIZE].copy_from_slice(&self.encode_fields());
        block
    }

    /// Decode and validate a header from the first bytes of a segment
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < HEADER_FIELDS_SIZE {
            return Err(SegLogError::Corruption(format!(
                "Segment header too short: {} bytes",
                buf.len()
            )));
        }

        if &buf[0..4] != MAGIC {
            return Err(SegLogError::Corruption(format!(
                "Invalid segment magic: expected SGLG, got {:?}",
                &buf[0..4]
            )));
        }

        let version = read_u32(buf, 4);
        if version != VERSION {
            return Err(SegLogError::Corruption(format!(
                "Unsupported segment version: {}",
                version
            )));
        }

        let index_offset = read_u64(buf, 8);
        if index_offset != 0 && index_offset < HEADER_SIZE {
            return Err(SegLogError::Corruption(format!(
                "Index offset {} points into the header",
                index_offset
            )));
        }

        Ok(Self {
            index_offset,
            index_len: read_u32(buf, 16),
            index_crc: read_u32(buf, 20),
        })
    }
}

pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

pub(crate) fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_header_has_no_index() {
        let block = SegmentHeader::unsealed().encode();
        assert_eq!(block.len(), HEADER_SIZE as usize);

        let header = SegmentHeader::decode(&block).unwrap();
        assert!(!header.has_index());
    }

    #[test]
    fn sealed_header_decodes() {
        let header = SegmentHeader {
            index_offset: 4096,
            index_len: 40,
            index_crc: 0xDEAD_BEEF,
        };

        assert_eq!(SegmentHeader::decode(&header.encode_fields()).unwrap(), header);
    }

    #[test]
    fn bad_magic_is_corruption() {
        let mut block = SegmentHeader::unsealed().encode();
        block[0] = b'X';

        assert!(matches!(
            SegmentHeader::decode(&block),
            Err(SegLogError::Corruption(_))
        ));
    }

    #[test]
    fn index_offset_inside_header_is_corruption() {
        let header = SegmentHeader {
            index_offset: 12,
            index_len: 0,
            index_crc: 0,
        };

        assert!(SegmentHeader::decode(&header.encode_fields()).is_err());
    }
}
