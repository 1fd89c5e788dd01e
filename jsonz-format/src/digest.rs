//! 128-bit digests identifying shared dictionaries

use md5::{Digest as _, Md5};

use crate::constants::DIGEST_BYTES;

/// Digest of a shared-dictionary file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest(pub [u8; DIGEST_BYTES]);

impl Digest {
    /// Lowercase hex rendering
    pub fn to_hex(&self) -> String {
        self.0.iter().map(|byte| format!("{:02x}", byte)).collect()
    }
}

impl std::fmt::Display for Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the 128-bit digest of `data`
pub fn hash128(data: &[u8]) -> Digest {
    let mut hasher = Md5::new();
    hasher.update(data);
    Digest(hasher.finalize().into())
}

/// Verify `data` against an expected digest
pub fn verify_hash128(data: &[u8], expected: &Digest) -> bool {
    hash128(data) == *expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash128_known_vector() {
        assert_eq!(hash128(b"").to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(hash128(b"abc").to_hex(), "900150983cd24fb0d6963f7d28e17f72");
    }

    #[test]
    fn test_verify_hash128() {
        let digest = hash128(b"dictionary");
        assert!(verify_hash128(b"dictionary", &digest));
        assert!(!verify_hash128(b"dictionarY", &digest));
    }
}
