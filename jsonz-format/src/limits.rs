//! Security limits and configuration

/// Resource limits applied while opening untrusted containers
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum strings in one string section (default: 4,194,304)
    pub max_string_count: u64,
    /// Maximum size-optimized string map bytes parsed on open (default: 64 MiB)
    pub max_string_map_bytes: u64,
    /// Maximum decoded length of a single string (default: 64 MiB)
    pub max_string_len: u64,
    /// Maximum container nesting depth walked by one access (default: 512)
    pub max_depth: usize,
    /// Maximum digits in one decimal (default: 65,536)
    pub max_decimal_digits: usize,
    /// Maximum shared dictionaries imported by one container (default: 64)
    pub max_dictionaries: u64,
    /// Maximum elements of an array whose elements occupy no bytes (default: 1,048,576)
    pub max_array_len: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_string_count: 4 * 1024 * 1024,
            max_string_map_bytes: 64 * 1024 * 1024,
            max_string_len: 64 * 1024 * 1024,
            max_depth: 512,
            max_decimal_digits: 65_536,
            max_dictionaries: 64,
            max_array_len: 1024 * 1024,
        }
    }
}

impl Limits {
    /// Limits that never trigger; for trusted inputs only
    pub fn unlimited() -> Self {
        Self {
            max_string_count: u64::MAX,
            max_string_map_bytes: u64::MAX,
            max_string_len: u64::MAX,
            max_depth: usize::MAX,
            max_decimal_digits: usize::MAX,
            max_dictionaries: u64::MAX,
            max_array_len: u64::MAX,
        }
    }

    /// Reject a value above its cap with [`crate::JsonzError::ResourceLimitExceeded`]
    pub fn check(what: &str, value: u64, limit: u64) -> crate::Result<()> {
        if value > limit {
            return Err(crate::JsonzError::ResourceLimitExceeded(format!(
                "{} {} exceeds limit {}",
                what, value, limit
            )));
        }
        Ok(())
    }
}
