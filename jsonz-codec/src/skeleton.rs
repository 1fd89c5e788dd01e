//! Skeletons: one level of a container, decoded without descending
//!
//! Parsing a key map or index map records each entry's tag and either its
//! resolved scalar, its string ID, or the byte range of its payload. Nested
//! containers stay as byte ranges until something asks for them.

use std::sync::Arc;

use indexmap::IndexMap;
use jsonz_format::bitpack::{packed_len, PackedBools};
use jsonz_format::constants::{TAG_BYTES, TAG_DECIMAL, TAG_NULL, TAG_OBJECT, TAG_STRING};
use jsonz_format::types::is_custom_tag;
use jsonz_format::{JsonzError, Limits, Result, TypeTag};

use crate::cursor::Cursor;
use crate::registry::{decode_integer, decode_signed, TagRegistry};
use crate::strings::StringDictionary;
use crate::value::{SpecialFloat, Value};

/// Resolution state of one entry
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// Scalar decoded in place
    Value(Value),
    /// String resolved through the dictionary on access
    StringId(u64),
    /// Decimal text resolved through the dictionary on access
    DecimalId(u64),
    /// Payload bytes at `offset..offset + len` of the session bytes
    Range {
        /// Absolute start of the payload
        offset: usize,
        /// Payload length
        len: usize,
    },
    /// Payload the session cannot decode; skipped, fails on access
    Unsupported(String),
}

/// One key map or index map slot
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    /// Tag byte
    pub tag: u8,
    /// Resolution state
    pub slot: Slot,
}

impl Entry {
    fn value(tag: u8, value: Value) -> Self {
        Self {
            tag,
            slot: Slot::Value(value),
        }
    }
}

/// Session capabilities consulted while parsing entries
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'s> {
    /// Custom tag codecs
    pub registry: &'s TagRegistry,
    /// Whether bytes payloads may be decoded
    pub allow_bytes: bool,
    /// Cap on null-array element counts
    pub max_array_len: u64,
}

fn to_usize(value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| {
        JsonzError::ResourceLimitExceeded(format!("size {} does not fit in memory", value))
    })
}

fn span(count: usize, width: usize) -> Result<usize> {
    count.checked_mul(width).ok_or_else(|| {
        JsonzError::ResourceLimitExceeded(format!("{} elements of {} bytes", count, width))
    })
}

/// Parse the payload of a `tag` entry at the cursor
pub fn parse_entry(cursor: &mut Cursor<'_>, tag: u8, ctx: &ParseContext<'_>) -> Result<Entry> {
    if is_custom_tag(tag) {
        let len = cursor.read_len()?;
        let offset = cursor.absolute();
        cursor.skip(len)?;
        let slot = match ctx.registry.get(tag) {
            Some(_) => Slot::Range { offset, len },
            None => Slot::Unsupported(format!("unregistered custom tag {}", tag)),
        };
        return Ok(Entry { tag, slot });
    }

    let kind = TypeTag::from_u8(tag)?;
    let slot = match kind {
        TypeTag::Null => Slot::Value(Value::Null),
        TypeTag::True => Slot::Value(Value::Bool(true)),
        TypeTag::False => Slot::Value(Value::Bool(false)),
        TypeTag::NaN => Slot::Value(Value::Float(SpecialFloat::NaN)),
        TypeTag::PosInfinity => Slot::Value(Value::Float(SpecialFloat::Infinity)),
        TypeTag::NegInfinity => Slot::Value(Value::Float(SpecialFloat::NegInfinity)),
        TypeTag::String => Slot::StringId(cursor.read_varint()?),
        TypeTag::Decimal => Slot::DecimalId(cursor.read_varint()?),
        TypeTag::SignedI8 | TypeTag::SignedI32 | TypeTag::SignedI64 => {
            Slot::Value(Value::Signed(decode_signed(kind, cursor)?))
        }
        TypeTag::Bytes => {
            let offset = cursor.absolute();
            let (_, len) = cursor.read_signed_varint()?;
            cursor.skip(to_usize(len)?)?;
            if ctx.allow_bytes {
                Slot::Range {
                    offset,
                    len: cursor.absolute() - offset,
                }
            } else {
                Slot::Unsupported("bytes capability disabled".to_string())
            }
        }
        TypeTag::Object | TypeTag::MultiArray | TypeTag::ObjectArray => {
            let len = to_usize(cursor.read_u64()?)?;
            let offset = cursor.absolute();
            cursor.skip(len)?;
            Slot::Range { offset, len }
        }
        TypeTag::RootString => return Err(JsonzError::InvalidTagContext(tag)),
        kind if kind.is_integer() => Slot::Value(Value::Integer(decode_integer(kind, cursor)?)),
        kind => {
            let offset = cursor.absolute();
            skip_array_payload(kind, cursor)?;
            Slot::Range {
                offset,
                len: cursor.absolute() - offset,
            }
        }
    };
    Ok(Entry { tag, slot })
}

fn skip_array_payload(kind: TypeTag, cursor: &mut Cursor<'_>) -> Result<()> {
    match kind {
        TypeTag::NullArray => {
            cursor.read_len()?;
        }
        TypeTag::BoolArray => {
            let count = cursor.read_len()?;
            cursor.skip(packed_len(count))?;
        }
        TypeTag::FastStringArray | TypeTag::FastDecimalArray => {
            let count = cursor.read_len()?;
            cursor.skip(span(count, 4)?)?;
        }
        TypeTag::StringArray
        | TypeTag::DecimalArray
        | TypeTag::PosResizingArray
        | TypeTag::NegResizingArray
        | TypeTag::PosBigArray
        | TypeTag::NegBigArray
        | TypeTag::BytesArray => {
            let len = cursor.read_len()?;
            cursor.skip(len)?;
        }
        kind => match kind.defined_width() {
            Some(width) if kind.is_array() => {
                let count = cursor.read_len()?;
                cursor.skip(span(count, width)?)?;
            }
            _ => return Err(JsonzError::InvalidTagContext(kind.as_u8())),
        },
    }
    Ok(())
}

/// Key map of one object
#[derive(Debug, Default)]
pub struct LazyObject {
    entries: IndexMap<Arc<str>, Entry>,
}

impl LazyObject {
    /// Parse the key map held in `body` (which starts at absolute `origin`)
    pub fn parse(
        body: &[u8],
        origin: usize,
        strings: &StringDictionary,
        ctx: &ParseContext<'_>,
    ) -> Result<Self> {
        let mut cursor = Cursor::declared(body, origin);
        let mut entries = IndexMap::new();
        while !cursor.is_empty() {
            let key_id = cursor.read_varint()?;
            let tag = cursor.read_u8()?;
            let entry = parse_entry(&mut cursor, tag, ctx)?;
            entries.insert(strings.resolve(key_id)?, entry);
        }
        Ok(Self { entries })
    }

    /// Entry for `key`
    pub fn get(&self, key: &str) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Keys in write order
    pub fn keys(&self) -> impl Iterator<Item = &Arc<str>> {
        self.entries.keys()
    }

    /// Entries in write order
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, &Entry)> {
        self.entries.iter()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True for `{}`
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Index map of one array, in whichever shape its encoding allows
#[derive(Debug)]
pub enum LazyArray {
    /// Pre-scanned entries (multi-type, object and variable-width forms)
    Entries(Vec<Entry>),
    /// Null array: only a count
    Nulls(usize),
    /// Packed booleans at `start`
    Bools {
        /// Absolute offset of the packed bits
        start: usize,
        /// Number of elements
        count: usize,
    },
    /// Fixed-width elements at `start`, addressable by index
    Fixed {
        /// Scalar tag of each element
        element: TypeTag,
        /// Absolute offset of element 0
        start: usize,
        /// Number of elements
        count: usize,
        /// Bytes per element
        width: usize,
    },
}

impl LazyArray {
    /// Parse an array payload of encoding `kind` held in `body`
    pub fn parse(
        kind: TypeTag,
        body: &[u8],
        origin: usize,
        ctx: &ParseContext<'_>,
    ) -> Result<Self> {
        let mut cursor = Cursor::declared(body, origin);
        let array = match kind {
            TypeTag::MultiArray => {
                let mut entries = Vec::new();
                while !cursor.is_empty() {
                    let tag = cursor.read_u8()?;
                    entries.push(parse_entry(&mut cursor, tag, ctx)?);
                }
                LazyArray::Entries(entries)
            }
            TypeTag::ObjectArray => {
                let mut entries = Vec::new();
                while !cursor.is_empty() {
                    let len = to_usize(cursor.read_u64()?)?;
                    let offset = cursor.absolute();
                    cursor.skip(len)?;
                    entries.push(Entry {
                        tag: TAG_OBJECT,
                        slot: Slot::Range { offset, len },
                    });
                }
                LazyArray::Entries(entries)
            }
            TypeTag::NullArray => {
                let count = cursor.read_varint()?;
                Limits::check("null array length", count, ctx.max_array_len)?;
                LazyArray::Nulls(to_usize(count)?)
            }
            TypeTag::BoolArray => {
                let count = cursor.read_len()?;
                let start = cursor.absolute();
                cursor.skip(packed_len(count))?;
                LazyArray::Bools { start, count }
            }
            TypeTag::FastStringArray | TypeTag::FastDecimalArray => {
                let count = cursor.read_len()?;
                let start = cursor.absolute();
                cursor.skip(span(count, 4)?)?;
                let element = kind.element_form().unwrap_or(TypeTag::String);
                LazyArray::Fixed {
                    element,
                    start,
                    count,
                    width: 4,
                }
            }
            TypeTag::StringArray | TypeTag::DecimalArray => {
                let mut body = sub_cursor(&mut cursor)?;
                let mut entries = Vec::new();
                while !body.is_empty() {
                    let id = body.read_varint()?;
                    entries.push(if kind == TypeTag::StringArray {
                        Entry {
                            tag: TAG_STRING,
                            slot: Slot::StringId(id),
                        }
                    } else {
                        Entry {
                            tag: TAG_DECIMAL,
                            slot: Slot::DecimalId(id),
                        }
                    });
                }
                LazyArray::Entries(entries)
            }
            TypeTag::PosResizingArray
            | TypeTag::NegResizingArray
            | TypeTag::PosBigArray
            | TypeTag::NegBigArray => {
                let element = kind
                    .element_form()
                    .ok_or(JsonzError::InvalidTagContext(kind.as_u8()))?;
                let mut body = sub_cursor(&mut cursor)?;
                let mut entries = Vec::new();
                while !body.is_empty() {
                    let value = decode_integer(element, &mut body)?;
                    entries.push(Entry::value(element.as_u8(), Value::Integer(value)));
                }
                LazyArray::Entries(entries)
            }
            TypeTag::BytesArray => {
                let mut body = sub_cursor(&mut cursor)?;
                let mut entries = Vec::new();
                while !body.is_empty() {
                    entries.push(parse_entry(&mut body, TAG_BYTES, ctx)?);
                }
                LazyArray::Entries(entries)
            }
            kind => match (kind.defined_width(), kind.element_form()) {
                (Some(width), Some(element)) => {
                    let count = cursor.read_len()?;
                    let start = cursor.absolute();
                    cursor.skip(span(count, width)?)?;
                    LazyArray::Fixed {
                        element,
                        start,
                        count,
                        width,
                    }
                }
                _ => return Err(JsonzError::InvalidTagContext(kind.as_u8())),
            },
        };
        Ok(array)
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        match self {
            LazyArray::Entries(entries) => entries.len(),
            LazyArray::Nulls(count) => *count,
            LazyArray::Bools { count, .. } | LazyArray::Fixed { count, .. } => *count,
        }
    }

    /// True for `[]`
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entry at `idx`; `bytes` are the session bytes the array was parsed from
    pub fn entry(&self, idx: usize, bytes: &[u8]) -> Result<Option<Entry>> {
        if idx >= self.len() {
            return Ok(None);
        }
        let entry = match self {
            LazyArray::Entries(entries) => entries[idx].clone(),
            LazyArray::Nulls(_) => Entry::value(TAG_NULL, Value::Null),
            LazyArray::Bools { start, count } => {
                let packed = &bytes[*start..*start + packed_len(*count)];
                let bit = PackedBools::new(packed, *count)
                    .and_then(|bools| bools.get(idx))
                    .ok_or(JsonzError::BoundsViolation {
                        offset: idx as u64,
                        size: *count as u64,
                    })?;
                let tag = if bit { TypeTag::True } else { TypeTag::False };
                Entry::value(tag.as_u8(), Value::Bool(bit))
            }
            LazyArray::Fixed {
                element,
                start,
                width,
                ..
            } => {
                let at = start + idx * width;
                let mut cursor = Cursor::declared(&bytes[at..at + width], at);
                match element {
                    TypeTag::String => Entry {
                        tag: TAG_STRING,
                        slot: Slot::StringId(cursor.read_uint(*width)?),
                    },
                    TypeTag::Decimal => Entry {
                        tag: TAG_DECIMAL,
                        slot: Slot::DecimalId(cursor.read_uint(*width)?),
                    },
                    element => Entry::value(
                        element.as_u8(),
                        Value::Integer(decode_integer(*element, &mut cursor)?),
                    ),
                }
            }
        };
        Ok(Some(entry))
    }
}

fn sub_cursor<'a>(cursor: &mut Cursor<'a>) -> Result<Cursor<'a>> {
    let len = cursor.read_len()?;
    let origin = cursor.absolute();
    Ok(Cursor::declared(cursor.read_bytes(len)?, origin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonz_format::bitpack::pack_bools;
    use jsonz_format::constants::*;
    use jsonz_format::varint::encode_varint;
    use num_bigint::BigInt;

    fn ctx(registry: &TagRegistry) -> ParseContext<'_> {
        ParseContext {
            registry,
            allow_bytes: false,
            max_array_len: 1_000,
        }
    }

    #[test]
    fn test_scalar_entries_resolve_in_place() {
        let registry = TagRegistry::new();
        let bytes = [0x01, 0x2A, 0x00, 0xFF, 0x00];
        let mut cursor = Cursor::declared(&bytes, 0);
        let entry = parse_entry(&mut cursor, TAG_NEG_U8, &ctx(&registry)).unwrap();
        assert_eq!(entry.slot, Slot::Value(Value::Integer(BigInt::from(-1))));
        let entry = parse_entry(&mut cursor, TAG_POS_U8 + 1, &ctx(&registry)).unwrap();
        assert_eq!(entry.slot, Slot::Value(Value::Integer(BigInt::from(42))));
        let entry = parse_entry(&mut cursor, TAG_POS_U8, &ctx(&registry)).unwrap();
        assert_eq!(entry.slot, Slot::Value(Value::Integer(BigInt::from(255))));
        let entry = parse_entry(&mut cursor, TAG_NULL, &ctx(&registry)).unwrap();
        assert_eq!(entry.slot, Slot::Value(Value::Null));
        assert_eq!(cursor.remaining(), 1);
    }

    #[test]
    fn test_root_string_rejected_inside_maps() {
        let registry = TagRegistry::new();
        let bytes = [0x01, b'x'];
        let mut cursor = Cursor::declared(&bytes, 0);
        assert!(matches!(
            parse_entry(&mut cursor, TAG_ROOT_STRING, &ctx(&registry)),
            Err(JsonzError::InvalidTagContext(TAG_ROOT_STRING))
        ));
    }

    #[test]
    fn test_unregistered_custom_tag_is_skipped() {
        let registry = TagRegistry::new();
        let mut bytes = encode_varint(3).to_vec();
        bytes.extend_from_slice(&[9, 9, 9]);
        bytes.push(TAG_TRUE);
        let mut cursor = Cursor::declared(&bytes, 0);
        let entry = parse_entry(&mut cursor, 0x90, &ctx(&registry)).unwrap();
        assert!(matches!(entry.slot, Slot::Unsupported(_)));
        assert_eq!(cursor.read_u8().unwrap(), TAG_TRUE);
    }

    #[test]
    fn test_bytes_entry_without_capability() {
        let registry = TagRegistry::new();
        let bytes = [0x01, 0x02, 0xAB, 0xCD];
        let mut cursor = Cursor::declared(&bytes, 0);
        let entry = parse_entry(&mut cursor, TAG_BYTES, &ctx(&registry)).unwrap();
        assert!(matches!(entry.slot, Slot::Unsupported(_)));
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_reserved_tag_fails() {
        let registry = TagRegistry::new();
        let mut cursor = Cursor::declared(&[], 0);
        assert!(matches!(
            parse_entry(&mut cursor, 0x40, &ctx(&registry)),
            Err(JsonzError::UnsupportedType(_))
        ));
    }

    #[test]
    fn test_bool_array_by_index() {
        let registry = TagRegistry::new();
        let values = [true, false, false, true, true, false, true, false, true];
        let mut body = encode_varint(values.len() as u64).to_vec();
        body.extend_from_slice(&pack_bools(&values));
        let array =
            LazyArray::parse(TypeTag::BoolArray, &body, 0, &ctx(&registry)).unwrap();
        assert_eq!(array.len(), values.len());
        for (idx, expected) in values.iter().enumerate() {
            let entry = array.entry(idx, &body).unwrap().unwrap();
            assert_eq!(entry.slot, Slot::Value(Value::Bool(*expected)));
        }
        assert!(array.entry(values.len(), &body).unwrap().is_none());
    }

    #[test]
    fn test_fixed_width_array_by_index() {
        let registry = TagRegistry::new();
        let mut body = encode_varint(3).to_vec();
        for v in [1u16, 500, 65_535] {
            body.extend_from_slice(&v.to_le_bytes());
        }
        let array =
            LazyArray::parse(TypeTag::NegU16Array, &body, 0, &ctx(&registry)).unwrap();
        let entry = array.entry(1, &body).unwrap().unwrap();
        assert_eq!(entry.tag, TAG_NEG_U8 + 1);
        assert_eq!(entry.slot, Slot::Value(Value::Integer(BigInt::from(-500))));
    }

    #[test]
    fn test_null_array_length_is_capped() {
        let registry = TagRegistry::new();
        let array = LazyArray::parse(
            TypeTag::NullArray,
            &encode_varint(1_000),
            0,
            &ctx(&registry),
        )
        .unwrap();
        assert_eq!(array.len(), 1_000);
        assert!(matches!(
            LazyArray::parse(TypeTag::NullArray, &encode_varint(1_001), 0, &ctx(&registry)),
            Err(JsonzError::ResourceLimitExceeded(_))
        ));
    }

    #[test]
    fn test_truncated_array_payload_is_bounds_violation() {
        let registry = TagRegistry::new();
        let mut body = encode_varint(4).to_vec();
        body.extend_from_slice(&[1, 2, 3]);
        assert!(matches!(
            LazyArray::parse(TypeTag::PosU8Array, &body, 0, &ctx(&registry)),
            Err(JsonzError::BoundsViolation { .. })
        ));
    }

    #[test]
    fn test_multi_array_body_overrun() {
        let registry = TagRegistry::new();
        // [1, "x"-id 0, 70000 (U24) cut short]
        let body = [TAG_POS_U8, 1, TAG_STRING, 0, TAG_POS_U8 + 2, 0x70, 0x11];
        match LazyArray::parse(TypeTag::MultiArray, &body, 0, &ctx(&registry)) {
            Err(JsonzError::BoundsViolation { offset, size }) => {
                assert!(offset >= size);
                assert_eq!(size, body.len() as u64);
            }
            other => panic!("expected BoundsViolation, got {other:?}"),
        }
    }
}
