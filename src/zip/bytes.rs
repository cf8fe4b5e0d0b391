//! Bounds-checked little-endian field access for fixed-layout records.
//!
//! Every helper returns `None` when the requested field would run past the
//! end of the buffer, so truncated input surfaces as a parse error instead
//! of a panic.

use byteorder::{ByteOrder, LittleEndian};

pub fn read_u16_le(buf: &[u8], offset: usize) -> Option<u16> {
    buf.get(offset..offset.checked_add(2)?).map(LittleEndian::read_u16)
}

pub fn read_u32_le(buf: &[u8], offset: usize) -> Option<u32> {
    buf.get(offset..offset.checked_add(4)?).map(LittleEndian::read_u32)
}

pub fn read_u64_le(buf: &[u8], offset: usize) -> Option<u64> {
    buf.get(offset..offset.checked_add(8)?).map(LittleEndian::read_u64)
}

/// True when `buf` holds the 4-byte little-endian `signature` at `offset`.
pub fn has_signature(buf: &[u8], offset: usize, signature: u32) -> bool {
    read_u32_le(buf, offset) == Some(signature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_little_endian() {
        let buf = [0x50, 0x4b, 0x05, 0x06, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_u16_le(&buf, 0), Some(0x4b50));
        assert_eq!(read_u32_le(&buf, 0), Some(0x06054b50));
        assert_eq!(read_u64_le(&buf, 4), Some(0x0807060504030201));
        assert!(has_signature(&buf, 0, 0x06054b50));
        assert!(!has_signature(&buf, 1, 0x06054b50));
    }

    #[test]
    fn out_of_bounds_is_none() {
        let buf = [0u8; 6];
        assert_eq!(read_u16_le(&buf, 5), None);
        assert_eq!(read_u32_le(&buf, 3), None);
        assert_eq!(read_u64_le(&buf, 0), None);
        assert_eq!(read_u32_le(&buf, usize::MAX), None);
    }
}
