//! Container and shared-dictionary header structures

use crate::constants::{ACCESS_RECORD_BYTES, DIGEST_BYTES, FORMAT_VERSION, MODE_ACCESS_OPTIMIZED, MODE_SIZE_OPTIMIZED};
use crate::digest::Digest;
use crate::error::{JsonzError, Result};
use crate::limits::Limits;
use crate::types::{is_custom_tag, TypeTag};

/// Physical layout of a string map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringMapMode {
    /// One signed VarInt size per string; offsets are running sums
    #[default]
    SizeOptimized,
    /// Fixed `(i64 size, u64 offset)` records; O(1) lookup
    AccessOptimized,
}

impl StringMapMode {
    /// Decode the mode byte
    pub fn from_u8(val: u8) -> Result<Self> {
        match val {
            MODE_SIZE_OPTIMIZED => Ok(StringMapMode::SizeOptimized),
            MODE_ACCESS_OPTIMIZED => Ok(StringMapMode::AccessOptimized),
            other => Err(JsonzError::MalformedHeader(format!(
                "unknown string map mode {}",
                other
            ))),
        }
    }

    /// Mode byte
    pub fn as_u8(self) -> u8 {
        match self {
            StringMapMode::SizeOptimized => MODE_SIZE_OPTIMIZED,
            StringMapMode::AccessOptimized => MODE_ACCESS_OPTIMIZED,
        }
    }

    fn validate_map_size(self, map_size: u64) -> Result<()> {
        if self == StringMapMode::AccessOptimized && map_size % ACCESS_RECORD_BYTES as u64 != 0 {
            return Err(JsonzError::MalformedHeader(format!(
                "access-optimized string map size {} is not a multiple of {}",
                map_size, ACCESS_RECORD_BYTES
            )));
        }
        Ok(())
    }
}

/// String-section fields of a container header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringSection {
    /// String map layout
    pub mode: StringMapMode,
    /// Number of local strings used as object keys
    pub key_count: u64,
    /// Byte size of the string data region
    pub string_data_size: u64,
    /// Byte size of the string map region
    pub string_map_size: u64,
    /// Shared dictionaries in required load order
    pub dictionaries: Vec<Digest>,
}

/// Container header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerHeader {
    /// Tag of the root value
    pub root_tag: u8,
    /// String section, present for string-bearing roots
    pub strings: Option<StringSection>,
}

impl ContainerHeader {
    /// Offset of the backpatched `string_data_size` field
    pub const STRING_DATA_SIZE_OFFSET: usize = 3 + 8;
    /// Offset of the backpatched `string_map_size` field
    pub const STRING_MAP_SIZE_OFFSET: usize = 3 + 16;

    /// True when a root with this tag carries a string section
    pub fn root_bears_strings(root_tag: u8) -> bool {
        !is_custom_tag(root_tag)
            && TypeTag::from_u8(root_tag)
                .map(TypeTag::bears_strings)
                .unwrap_or(false)
    }

    /// Encode header to bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        if Self::root_bears_strings(self.root_tag) != self.strings.is_some() {
            return Err(JsonzError::Internal(format!(
                "root tag {} does not match string section presence",
                self.root_tag
            )));
        }

        let mut result = Vec::with_capacity(64);
        result.push(FORMAT_VERSION);
        result.push(self.root_tag);

        if let Some(strings) = &self.strings {
            result.push(strings.mode.as_u8());
            result.extend_from_slice(&strings.key_count.to_le_bytes());
            result.extend_from_slice(&strings.string_data_size.to_le_bytes());
            result.extend_from_slice(&strings.string_map_size.to_le_bytes());
            result.extend_from_slice(&(strings.dictionaries.len() as u64).to_le_bytes());
            for digest in &strings.dictionaries {
                result.extend_from_slice(&digest.0);
            }
        }

        Ok(result)
    }

    /// Decode header from bytes
    pub fn decode(bytes: &[u8], limits: &Limits) -> Result<(Self, usize)> {
        if bytes.len() < 2 {
            return Err(JsonzError::truncated(0, 2, bytes.len()));
        }
        if bytes[0] != FORMAT_VERSION {
            return Err(JsonzError::UnsupportedVersion(bytes[0]));
        }
        let root_tag = bytes[1];
        let mut pos = 2;

        if !Self::root_bears_strings(root_tag) {
            return Ok((
                Self {
                    root_tag,
                    strings: None,
                },
                pos,
            ));
        }

        // mode + key_count + data_size + map_size + dict_count
        let fixed = 1 + 8 * 4;
        if bytes.len() < pos + fixed {
            return Err(JsonzError::truncated(pos, fixed, bytes.len() - pos));
        }
        let mode = StringMapMode::from_u8(bytes[pos])?;
        pos += 1;
        let key_count = read_u64(bytes, &mut pos);
        let string_data_size = read_u64(bytes, &mut pos);
        let string_map_size = read_u64(bytes, &mut pos);
        let dict_count = read_u64(bytes, &mut pos);

        mode.validate_map_size(string_map_size)?;
        Limits::check("shared dictionary count", dict_count, limits.max_dictionaries)?;

        let digest_bytes = usize::try_from(dict_count)
            .ok()
            .and_then(|count| count.checked_mul(DIGEST_BYTES))
            .unwrap_or(usize::MAX);
        let digests = pos
            .checked_add(digest_bytes)
            .and_then(|end| bytes.get(pos..end))
            .ok_or_else(|| JsonzError::truncated(pos, digest_bytes, bytes.len() - pos))?;
        let dictionaries = digests
            .chunks_exact(DIGEST_BYTES)
            .map(|chunk| {
                let mut digest = [0u8; DIGEST_BYTES];
                digest.copy_from_slice(chunk);
                Digest(digest)
            })
            .collect();
        pos += digest_bytes;

        Ok((
            Self {
                root_tag,
                strings: Some(StringSection {
                    mode,
                    key_count,
                    string_data_size,
                    string_map_size,
                    dictionaries,
                }),
            },
            pos,
        ))
    }
}

/// Shared-dictionary file header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DictionaryHeader {
    /// String map layout
    pub mode: StringMapMode,
    /// Number of strings
    pub string_count: u64,
    /// Number of leading strings used as object keys
    pub key_string_count: u64,
    /// Byte size of the string data region
    pub string_data_size: u64,
}

impl DictionaryHeader {
    /// Encoded size
    pub const LEN: usize = 2 + 8 * 3;

    /// Encode header to bytes
    pub fn encode(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(Self::LEN);
        result.push(FORMAT_VERSION);
        result.push(self.mode.as_u8());
        result.extend_from_slice(&self.string_count.to_le_bytes());
        result.extend_from_slice(&self.key_string_count.to_le_bytes());
        result.extend_from_slice(&self.string_data_size.to_le_bytes());
        result
    }

    /// Decode header from bytes
    pub fn decode(bytes: &[u8], limits: &Limits) -> Result<Self> {
        if bytes.len() < Self::LEN {
            return Err(JsonzError::truncated(0, Self::LEN, bytes.len()));
        }
        if bytes[0] != FORMAT_VERSION {
            return Err(JsonzError::UnsupportedVersion(bytes[0]));
        }
        let mode = StringMapMode::from_u8(bytes[1])?;
        let mut pos = 2;
        let string_count = read_u64(bytes, &mut pos);
        let key_string_count = read_u64(bytes, &mut pos);
        let string_data_size = read_u64(bytes, &mut pos);

        if key_string_count > string_count {
            return Err(JsonzError::MalformedHeader(format!(
                "key string count {} exceeds string count {}",
                key_string_count, string_count
            )));
        }
        Limits::check("dictionary string count", string_count, limits.max_string_count)?;

        Ok(Self {
            mode,
            string_count,
            key_string_count,
            string_data_size,
        })
    }
}

fn read_u64(bytes: &[u8], pos: &mut usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[*pos..*pos + 8]);
    *pos += 8;
    u64::from_le_bytes(buf)
}
