//! Byte accumulator with fixed-width backpatch slots
//!
//! Sizes that precede their content (string section sizes, container
//! `byte_size` fields) are reserved as zeroed `u64` slots and filled in once
//! the content is written. Bytes are only handed out after every slot has
//! been resolved.

use jsonz_format::constants::BYTE_SIZE_FIELD;
use jsonz_format::{JsonzError, Result};

/// Handle to a reserved `u64` slot
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a reserved slot must be patched before the builder finishes"]
pub struct Placeholder {
    offset: usize,
}

impl Placeholder {
    /// Absolute offset of the slot
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Offset of the first byte after the slot
    pub fn end(&self) -> usize {
        self.offset + BYTE_SIZE_FIELD
    }
}

/// Growable output buffer tracking unresolved placeholders
#[derive(Debug, Default)]
pub struct ByteBuilder {
    buf: Vec<u8>,
    pending: usize,
}

impl ByteBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder with preallocated capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            pending: 0,
        }
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when nothing has been written
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Placeholders not yet patched
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Append one byte
    pub fn push(&mut self, byte: u8) {
        self.buf.push(byte);
    }

    /// Append a slice
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Reserve a zeroed `u64` slot at the current position
    pub fn reserve_u64(&mut self) -> Placeholder {
        let offset = self.buf.len();
        self.buf.extend_from_slice(&[0u8; BYTE_SIZE_FIELD]);
        self.pending += 1;
        Placeholder { offset }
    }

    /// Adopt an existing zeroed slot at `offset` (e.g. inside a header)
    pub fn placeholder_at(&mut self, offset: usize) -> Result<Placeholder> {
        if offset + BYTE_SIZE_FIELD > self.buf.len() {
            return Err(JsonzError::Internal(format!(
                "placeholder at {} lies outside {} written bytes",
                offset,
                self.buf.len()
            )));
        }
        self.pending += 1;
        Ok(Placeholder { offset })
    }

    /// Fill a reserved slot; consumes the handle so a slot is patched once
    pub fn patch_u64(&mut self, placeholder: Placeholder, value: u64) {
        let at = placeholder.offset;
        self.buf[at..at + BYTE_SIZE_FIELD].copy_from_slice(&value.to_le_bytes());
        self.pending -= 1;
    }

    /// Fill a slot with the number of bytes written after it
    pub fn patch_size_since(&mut self, placeholder: Placeholder) {
        let size = (self.buf.len() - placeholder.end()) as u64;
        self.patch_u64(placeholder, size);
    }

    /// Hand out the bytes; fails if any placeholder is unresolved
    pub fn finish(self) -> Result<Vec<u8>> {
        if self.pending != 0 {
            return Err(JsonzError::Internal(format!(
                "{} backpatch placeholder(s) left unresolved",
                self.pending
            )));
        }
        Ok(self.buf)
    }
}
