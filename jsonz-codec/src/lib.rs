//! JSONZ Codec - Writer and lazy reader for JSONZ containers
//!
//! This crate turns value trees into containers and back:
//!
//! - Type classification and custom tag codecs
//! - String collection, ID assignment and string sections
//! - Shared dictionaries and the corpus dictionary builder
//! - The backpatching writer
//! - Reader sessions with lazily built object and array skeletons

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod builder;
pub mod compression;
pub mod cursor;
pub mod document;
pub mod path;
pub mod registry;
pub mod shared;
pub mod skeleton;
pub mod strings;
pub mod value;
pub mod writer;

// Re-export commonly used types
pub use jsonz_format::{
    ContainerHeader, Decimal, Digest, JsonzError, Limits, Result, StringMapMode, TypeTag,
};

// Re-export our own types
pub use builder::{ByteBuilder, Placeholder};
pub use compression::Codec;
pub use document::{Document, ReadOptions};
pub use path::{Path, PathSegment};
pub use registry::{RawTagCodec, TagCodec, TagRegistry};
pub use shared::{DictionaryBuilder, SharedDictionary};
pub use value::{Map, SignedInt, SpecialFloat, Value};
pub use writer::{encode, WriteOptions};
