//! JSONZ Format - Core primitives for the JSONZ binary container
//!
//! This crate provides the fundamental encoding/decoding utilities for the
//! JSONZ format with no I/O dependencies. It includes:
//!
//! - Tag numbers and constants
//! - Length-prefixed variable-width integers (VarInt) and the signed variant
//! - Bit packing for boolean arrays
//! - 128-bit dictionary digests
//! - Error types
//! - Security limits
//! - Container and shared-dictionary headers
//! - Canonical decimal text
//! - Built-in type tags

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod bitpack;
pub mod constants;
pub mod decimal;
pub mod digest;
pub mod error;
pub mod header;
pub mod limits;
pub mod types;
pub mod varint;

// Re-export commonly used types
pub use decimal::Decimal;
pub use digest::{hash128, Digest};
pub use error::{JsonzError, Result};
pub use header::{ContainerHeader, DictionaryHeader, StringMapMode, StringSection};
pub use limits::Limits;
pub use types::TypeTag;
