//! Length-prefixed variable-width integers
//!
//! A VarInt is a single length byte `n` followed by `n` little-endian bytes of
//! magnitude. Zero is encoded as the lone byte `0`. The signed variant reads
//! the length byte as `i8`; a negated length marks the value as negative (or,
//! in string maps and byte payloads, as compressed). The payload never carries
//! a sign bit of its own.

use smallvec::SmallVec;

use crate::error::{JsonzError, Result};

/// Largest magnitude, in bytes, an unsigned VarInt can carry.
pub const MAX_VARINT_BYTES: usize = u8::MAX as usize;

/// Largest magnitude, in bytes, a signed VarInt can carry.
pub const MAX_SIGNED_VARINT_BYTES: usize = i8::MAX as usize;

/// Number of magnitude bytes needed to hold `val` (0 for zero).
pub fn varint_len(val: u64) -> usize {
    (64 - val.leading_zeros() as usize).div_ceil(8)
}

/// Encode a u64 as a minimal VarInt
pub fn encode_varint(val: u64) -> SmallVec<[u8; 9]> {
    let n = varint_len(val);
    let mut result = SmallVec::new();
    result.push(n as u8);
    result.extend_from_slice(&val.to_le_bytes()[..n]);
    result
}

/// Decode a VarInt that must fit in a u64
pub fn decode_varint(bytes: &[u8]) -> Result<(u64, usize)> {
    let (magnitude, consumed) = decode_varint_bytes(bytes)?;
    if magnitude.len() > 8 {
        return Err(JsonzError::ResourceLimitExceeded(format!(
            "VarInt of {} bytes does not fit in 64 bits",
            magnitude.len()
        )));
    }
    let mut buf = [0u8; 8];
    buf[..magnitude.len()].copy_from_slice(magnitude);
    Ok((u64::from_le_bytes(buf), consumed))
}

/// Encode an arbitrary little-endian magnitude as a VarInt.
///
/// High-order zero bytes are dropped so the output is minimal.
pub fn encode_varint_bytes(magnitude: &[u8]) -> Result<Vec<u8>> {
    let trimmed = trim_le(magnitude);
    if trimmed.len() > MAX_VARINT_BYTES {
        return Err(JsonzError::ResourceLimitExceeded(format!(
            "magnitude of {} bytes exceeds VarInt range",
            trimmed.len()
        )));
    }
    let mut result = Vec::with_capacity(trimmed.len() + 1);
    result.push(trimmed.len() as u8);
    result.extend_from_slice(trimmed);
    Ok(result)
}

/// Decode a VarInt of any width, returning its little-endian magnitude bytes
pub fn decode_varint_bytes(bytes: &[u8]) -> Result<(&[u8], usize)> {
    let n = *bytes
        .first()
        .ok_or_else(|| JsonzError::truncated(0, 1, 0))? as usize;
    if bytes.len() < 1 + n {
        return Err(JsonzError::truncated(0, 1 + n, bytes.len()));
    }
    Ok((&bytes[1..1 + n], 1 + n))
}

/// Encode a flagged magnitude using the negated-length convention
pub fn encode_signed_varint(negative: bool, magnitude: u64) -> SmallVec<[u8; 9]> {
    let n = varint_len(magnitude);
    let len_byte = if negative { (-(n as i8)) as u8 } else { n as u8 };
    let mut result = SmallVec::new();
    result.push(len_byte);
    result.extend_from_slice(&magnitude.to_le_bytes()[..n]);
    result
}

/// Decode a signed VarInt into `(negative, magnitude, consumed)`
pub fn decode_signed_varint(bytes: &[u8]) -> Result<(bool, u64, usize)> {
    let len = *bytes
        .first()
        .ok_or_else(|| JsonzError::truncated(0, 1, 0))? as i8;
    let n = len.unsigned_abs() as usize;
    if n > 8 {
        return Err(JsonzError::ResourceLimitExceeded(format!(
            "signed VarInt of {} bytes does not fit in 64 bits",
            n
        )));
    }
    if bytes.len() < 1 + n {
        return Err(JsonzError::truncated(0, 1 + n, bytes.len()));
    }
    let mut buf = [0u8; 8];
    buf[..n].copy_from_slice(&bytes[1..1 + n]);
    Ok((len < 0, u64::from_le_bytes(buf), 1 + n))
}

/// Strip high-order zero bytes from a little-endian magnitude
pub fn trim_le(magnitude: &[u8]) -> &[u8] {
    let end = magnitude
        .iter()
        .rposition(|&byte| byte != 0)
        .map_or(0, |idx| idx + 1);
    &magnitude[..end]
}
