//! Error types for JSONZ format

use thiserror::Error;

/// JSONZ error types
#[derive(Debug, Error)]
pub enum JsonzError {
    /// Header contents are inconsistent or corrupt.
    #[error("Malformed header: {0}")]
    MalformedHeader(String),
    /// Container or dictionary version is not supported by this decoder.
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(u8),
    /// Input ended before a declared size was satisfied.
    #[error("Truncated input: needed {needed} bytes at offset {offset}, {available} available")]
    TruncatedInput {
        /// Offset the read started at
        offset: u64,
        /// Bytes the read required
        needed: u64,
        /// Bytes actually remaining
        available: u64,
    },
    /// A shared dictionary listed in the header was not supplied.
    #[error("Missing shared dictionary #{index} (digest {digest})")]
    MissingDictionary {
        /// Position in the header's load order
        index: usize,
        /// Hex digest the header requires
        digest: String,
    },
    /// A supplied shared dictionary does not match the digest in the header.
    #[error("Shared dictionary #{index} digest mismatch: expected {expected}, found {actual}")]
    DictionaryHashMismatch {
        /// Position in the header's load order
        index: usize,
        /// Hex digest the header requires
        expected: String,
        /// Hex digest of the supplied dictionary
        actual: String,
    },
    /// An access computed an offset or index outside a declared size.
    #[error("Bounds violation: {offset} outside declared size {size}")]
    BoundsViolation {
        /// Offending offset or index
        offset: u64,
        /// Declared size of the enclosing region
        size: u64,
    },
    /// Value kind is disabled or its tag is not registered.
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    /// Tag appeared in a position where it is not legal.
    #[error("Tag {0} is not valid in this context")]
    InvalidTagContext(u8),
    /// A configured resource limit was exceeded.
    #[error("Resource limit exceeded: {0}")]
    ResourceLimitExceeded(String),
    /// Path lookup did not find the requested key, or an index token was not numeric.
    #[error("Path not found: {0}")]
    PathNotFound(String),
    /// Value could not be interpreted as the expected type.
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// String bytes were not valid UTF-8.
    #[error("Invalid UTF-8 in string {0}")]
    InvalidUtf8(u64),
    /// Underlying compression codec reported an error.
    #[error("Compression error: {0}")]
    Compression(String),
    /// I/O operation failed while reading or writing data.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// JSON parsing or serialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Internal invariant was violated.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl JsonzError {
    /// Build a [`JsonzError::TruncatedInput`] from usize bookkeeping.
    pub fn truncated(offset: usize, needed: usize, available: usize) -> Self {
        JsonzError::TruncatedInput {
            offset: offset as u64,
            needed: needed as u64,
            available: available as u64,
        }
    }

    /// True for errors that only affect a single entry and leave the
    /// enclosing document usable.
    pub fn is_entry_local(&self) -> bool {
        matches!(
            self,
            JsonzError::BoundsViolation { .. }
                | JsonzError::UnsupportedType(_)
                | JsonzError::PathNotFound(_)
                | JsonzError::TypeMismatch(_)
        )
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, JsonzError>;
