//! Bounded reader over a region of session bytes
//!
//! A cursor over a declared region (a container's `byte_size`) reports reads
//! past its end as [`JsonzError::BoundsViolation`]; a cursor over the file
//! stream itself reports them as [`JsonzError::TruncatedInput`].

use jsonz_format::varint::{decode_signed_varint, decode_varint, decode_varint_bytes};
use jsonz_format::{JsonzError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    Declared,
    Stream,
}

/// Forward-only reader
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    origin: usize,
    region: Region,
}

impl<'a> Cursor<'a> {
    /// Cursor over a region whose size was declared by the format
    pub fn declared(bytes: &'a [u8], origin: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            origin,
            region: Region::Declared,
        }
    }

    /// Cursor over the remainder of the file
    pub fn stream(bytes: &'a [u8], origin: usize) -> Self {
        Self {
            bytes,
            pos: 0,
            origin,
            region: Region::Stream,
        }
    }

    /// Absolute offset of the next byte
    pub fn absolute(&self) -> usize {
        self.origin + self.pos
    }

    /// Offset of the next byte relative to the region start
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left in the region
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    /// True once the region is exhausted
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn overrun(&self, needed: usize) -> JsonzError {
        match self.region {
            Region::Declared => JsonzError::BoundsViolation {
                offset: self.pos.saturating_add(needed) as u64,
                size: self.bytes.len() as u64,
            },
            Region::Stream => JsonzError::truncated(self.absolute(), needed, self.remaining()),
        }
    }

    fn ensure(&self, needed: usize) -> Result<()> {
        if needed > self.remaining() {
            return Err(self.overrun(needed));
        }
        Ok(())
    }

    /// Read one byte
    pub fn read_u8(&mut self) -> Result<u8> {
        self.ensure(1)?;
        let byte = self.bytes[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Borrow the next `n` bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.ensure(n)?;
        let slice = &self.bytes[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Advance by `n` bytes
    pub fn skip(&mut self, n: usize) -> Result<()> {
        self.read_bytes(n).map(|_| ())
    }

    /// Fixed-width little-endian `u64`
    pub fn read_u64(&mut self) -> Result<u64> {
        let raw = self.read_bytes(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(raw);
        Ok(u64::from_le_bytes(buf))
    }

    /// Fixed-width little-endian magnitude of `width` bytes
    pub fn read_uint(&mut self, width: usize) -> Result<u64> {
        let raw = self.read_bytes(width)?;
        let mut buf = [0u8; 8];
        buf[..width].copy_from_slice(raw);
        Ok(u64::from_le_bytes(buf))
    }

    fn varint_extent(&self) -> Result<usize> {
        self.ensure(1)?;
        let extent = 1 + self.bytes[self.pos] as usize;
        self.ensure(extent)?;
        Ok(extent)
    }

    /// VarInt that must fit in a `u64`
    pub fn read_varint(&mut self) -> Result<u64> {
        let extent = self.varint_extent()?;
        let (value, consumed) = decode_varint(&self.bytes[self.pos..self.pos + extent])?;
        self.pos += consumed;
        Ok(value)
    }

    /// VarInt used as a length or count inside this region
    pub fn read_len(&mut self) -> Result<usize> {
        let value = self.read_varint()?;
        usize::try_from(value).map_err(|_| {
            JsonzError::ResourceLimitExceeded(format!("length {} does not fit in memory", value))
        })
    }

    /// VarInt of any width, as little-endian magnitude bytes
    pub fn read_varint_bytes(&mut self) -> Result<&'a [u8]> {
        let extent = self.varint_extent()?;
        let (magnitude, consumed) = decode_varint_bytes(&self.bytes[self.pos..self.pos + extent])?;
        self.pos += consumed;
        Ok(magnitude)
    }

    /// Signed VarInt as `(negative, magnitude)`
    pub fn read_signed_varint(&mut self) -> Result<(bool, u64)> {
        self.ensure(1)?;
        let extent = 1 + (self.bytes[self.pos] as i8).unsigned_abs() as usize;
        self.ensure(extent)?;
        let (negative, magnitude, consumed) =
            decode_signed_varint(&self.bytes[self.pos..self.pos + extent])?;
        self.pos += consumed;
        Ok((negative, magnitude))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_region_reports_bounds() {
        let bytes = [2u8, 0x10, 0x27, 5];
        let mut cursor = Cursor::declared(&bytes[..3], 100);
        assert_eq!(cursor.read_varint().unwrap(), 10_000);
        match cursor.read_u8() {
            Err(JsonzError::BoundsViolation { offset, size }) => {
                assert_eq!(offset, 4);
                assert_eq!(size, 3);
            }
            other => panic!("expected BoundsViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_stream_region_reports_truncation() {
        let bytes = [3u8, 1, 2];
        let mut cursor = Cursor::stream(&bytes, 40);
        match cursor.read_varint() {
            Err(JsonzError::TruncatedInput {
                offset,
                needed,
                available,
            }) => {
                assert_eq!(offset, 40);
                assert_eq!(needed, 4);
                assert_eq!(available, 3);
            }
            other => panic!("expected TruncatedInput, got {other:?}"),
        }
    }

    #[test]
    fn test_huge_skip_is_bounds_violation() {
        let bytes = [0u8; 4];
        let mut cursor = Cursor::declared(&bytes, 0);
        cursor.read_u8().unwrap();
        match cursor.skip(usize::MAX) {
            Err(JsonzError::BoundsViolation { offset, size }) => {
                assert_eq!(offset, usize::MAX as u64);
                assert_eq!(size, 4);
            }
            other => panic!("expected BoundsViolation, got {other:?}"),
        }
    }

    #[test]
    fn test_fixed_width_reads() {
        let mut bytes = 0xDEAD_BEEFu64.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0x01, 0x02, 0x03]);
        let mut cursor = Cursor::declared(&bytes, 0);
        assert_eq!(cursor.read_u64().unwrap(), 0xDEAD_BEEF);
        assert_eq!(cursor.read_uint(3).unwrap(), 0x030201);
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_signed_varint_read() {
        let bytes = [(-2i8) as u8, 0x00, 0x01];
        let mut cursor = Cursor::declared(&bytes, 0);
        assert_eq!(cursor.read_signed_varint().unwrap(), (true, 256));
        assert_eq!(cursor.position(), 3);
    }
}
