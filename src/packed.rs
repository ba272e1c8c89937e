//! Bounds-checked little-endian field access over packed byte blocks.

use std::ops::Range;

use crate::error::{DynamicError, Result};

pub(crate) const U16: usize = 2;
pub(crate) const U32: usize = 4;

/// `at..at + len`, or `Corrupt` when the end overflows or passes the block.
fn span(buf_len: usize, at: usize, len: usize) -> Result<Range<usize>> {
    at.checked_add(len)
        .filter(|&end| end <= buf_len)
        .map(|end| at..end)
        .ok_or(DynamicError::Corrupt { offset: at })
}

pub(crate) fn read_u16(buf: &[u8], at: usize) -> Result<u16> {
    let bytes = &buf[span(buf.len(), at, U16)?];
    Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
}

pub(crate) fn write_u16(buf: &mut [u8], at: usize, value: u16) -> Result<()> {
    let range = span(buf.len(), at, U16)?;
    buf[range].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

pub(crate) fn read_u32(buf: &[u8], at: usize) -> Result<u32> {
    let bytes = &buf[span(buf.len(), at, U32)?];
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

pub(crate) fn write_u32(buf: &mut [u8], at: usize, value: u32) -> Result<()> {
    let range = span(buf.len(), at, U32)?;
    buf[range].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

pub(crate) fn read_bytes(buf: &[u8], at: usize, len: usize) -> Result<&[u8]> {
    Ok(&buf[span(buf.len(), at, len)?])
}

pub(crate) fn write_bytes(buf: &mut [u8], at: usize, bytes: &[u8]) -> Result<()> {
    let range = span(buf.len(), at, bytes.len())?;
    buf[range].copy_from_slice(bytes);
    Ok(())
}

/// Converts a size or position into a `u32` field, treating overflow as a capacity failure.
pub(crate) fn to_u32(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| DynamicError::capacity(value, u32::MAX as usize))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fields_round_trip_and_reject_out_of_bounds() {
        let mut buf = vec![0u8; 6];
        write_u32(&mut buf, 0, 0xDEAD_BEEF).unwrap();
        write_u16(&mut buf, 4, 0x1234).unwrap();
        assert_eq!(read_u32(&buf, 0).unwrap(), 0xDEAD_BEEF);
        assert_eq!(read_u16(&buf, 4).unwrap(), 0x1234);
        assert_eq!(
            read_u32(&buf, 4).unwrap_err(),
            DynamicError::Corrupt { offset: 4 }
        );
        assert!(write_bytes(&mut buf, 5, b"ab").is_err());
    }

    #[test]
    fn offsets_near_usize_max_are_corrupt() {
        let mut buf = vec![0u8; 4];
        let at = usize::MAX - 1;
        assert_eq!(
            read_u16(&buf, at).unwrap_err(),
            DynamicError::Corrupt { offset: at }
        );
        assert!(read_u32(&buf, at).is_err());
        assert!(write_u16(&mut buf, usize::MAX, 1).is_err());
        assert!(read_bytes(&buf, 2, usize::MAX).is_err());
        assert!(write_bytes(&mut buf, at, b"xyz").is_err());
    }
}
