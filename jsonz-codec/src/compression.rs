//! Per-string compression primitive

use std::io::Read;

use jsonz_format::{JsonzError, Result};

/// Default zstd level for string and bytes payloads
pub const DEFAULT_ZSTD_LEVEL: i32 = 6;

/// Payloads shorter than this are never offered to the codec
pub const MIN_COMPRESS_LEN: usize = 32;

/// Compression codec applied to individual strings and byte payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    /// Store everything raw
    None,
    /// Zstandard at the given level
    Zstd(i32),
}

impl Default for Codec {
    fn default() -> Self {
        Codec::Zstd(DEFAULT_ZSTD_LEVEL)
    }
}

impl Codec {
    /// Codec name for display and configuration
    pub fn name(&self) -> &'static str {
        match self {
            Codec::None => "none",
            Codec::Zstd(_) => "zstd",
        }
    }

    /// Compress `data`, returning `None` unless the result is strictly smaller
    pub fn compress_if_smaller(&self, data: &[u8]) -> Result<Option<Vec<u8>>> {
        match self {
            Codec::None => Ok(None),
            Codec::Zstd(_) if data.len() < MIN_COMPRESS_LEN => Ok(None),
            Codec::Zstd(level) => {
                let compressed = zstd::bulk::compress(data, *level)
                    .map_err(|e| JsonzError::Compression(e.to_string()))?;
                Ok((compressed.len() < data.len()).then_some(compressed))
            }
        }
    }
}

/// Streaming zstd decode with an output cap
pub fn decompress_zstd(data: &[u8], max_len: u64) -> Result<Vec<u8>> {
    let decoder =
        zstd::stream::read::Decoder::new(data).map_err(|e| JsonzError::Compression(e.to_string()))?;
    let mut out = Vec::new();
    decoder
        .take(max_len.saturating_add(1))
        .read_to_end(&mut out)
        .map_err(|e| JsonzError::Compression(e.to_string()))?;
    if out.len() as u64 > max_len {
        return Err(JsonzError::ResourceLimitExceeded(format!(
            "decompressed payload exceeds {} bytes",
            max_len
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_payloads_stay_raw() {
        let codec = Codec::default();
        assert!(codec.compress_if_smaller(b"hello").unwrap().is_none());
        assert!(Codec::None
            .compress_if_smaller(&[b'a'; 4096])
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_repetitive_payload_compresses() {
        let codec = Codec::default();
        let data = "abcabcabc".repeat(200);
        let compressed = codec.compress_if_smaller(data.as_bytes()).unwrap().unwrap();
        assert!(compressed.len() < data.len());
        let restored = decompress_zstd(&compressed, 1 << 20).unwrap();
        assert_eq!(restored, data.as_bytes());
    }

    #[test]
    fn test_decompress_respects_cap() {
        let codec = Codec::default();
        let data = vec![b'z'; 10_000];
        let compressed = codec.compress_if_smaller(&data).unwrap().unwrap();
        assert!(matches!(
            decompress_zstd(&compressed, 100),
            Err(JsonzError::ResourceLimitExceeded(_))
        ));
        assert_eq!(decompress_zstd(&compressed, 10_000).unwrap().len(), 10_000);
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(matches!(
            decompress_zstd(b"not a zstd frame", 10),
            Err(JsonzError::Compression(_))
        ));
    }
}
