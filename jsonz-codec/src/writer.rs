//! Container writer
//!
//! Encoding happens in one pass over an in-memory [`ByteBuilder`]: the header
//! goes out with zeroed size fields, the string section follows and the
//! header sizes are patched, then the root payload is written with every
//! container `byte_size` reserved up front and patched once its body is done.

use jsonz_format::bitpack::pack_bools;
use jsonz_format::constants::{FORMAT_VERSION, TAG_ROOT_STRING};
use jsonz_format::types::is_custom_tag;
use jsonz_format::varint::{encode_signed_varint, encode_varint};
use jsonz_format::{
    ContainerHeader, JsonzError, Limits, Result, StringMapMode, StringSection, TypeTag,
};
use tracing::debug;

use crate::builder::ByteBuilder;
use crate::compression::Codec;
use crate::registry::{encode_integer, encode_signed, integer_parts, TagRegistry, TypeClassifier};
use crate::shared::SharedDictionary;
use crate::strings::{encode_strings, StringCollector, StringTable};
use crate::value::Value;

/// Writer configuration
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// String map layout
    pub mode: StringMapMode,
    /// Codec used for individually compressed strings and bytes payloads
    pub codec: Codec,
    /// Compress strings and bytes payloads when that makes them smaller
    pub compress_strings: bool,
    /// Use fixed 32-bit IDs for string and decimal arrays
    pub fast_string_arrays: bool,
    /// Accept [`Value::Bytes`]
    pub allow_bytes: bool,
    /// Depth and string count caps
    pub limits: Limits,
    /// Custom tag codecs
    pub registry: TagRegistry,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            mode: StringMapMode::SizeOptimized,
            codec: Codec::default(),
            compress_strings: true,
            fast_string_arrays: false,
            allow_bytes: false,
            limits: Limits::default(),
            registry: TagRegistry::default(),
        }
    }
}

impl WriteOptions {
    fn payload_codec(&self) -> Option<&Codec> {
        self.compress_strings.then_some(&self.codec)
    }
}

/// Encode `value` as a complete container
///
/// Strings contained in `dictionaries` are referenced by their shared IDs;
/// the container header records the dictionaries' digests in the given order.
pub fn encode(
    value: &Value,
    options: &WriteOptions,
    dictionaries: &[SharedDictionary],
) -> Result<Vec<u8>> {
    let classifier = TypeClassifier::new(
        &options.registry,
        options.fast_string_arrays,
        options.allow_bytes,
    );
    let root_tag = match value {
        Value::String(_) if options.registry.find_for(value).is_none() => TAG_ROOT_STRING,
        _ => classifier.classify(value)?,
    };

    let mut out = ByteBuilder::with_capacity(256);
    let table = if ContainerHeader::root_bears_strings(root_tag) {
        Some(write_string_section(value, root_tag, options, dictionaries, &mut out)?)
    } else {
        out.push(FORMAT_VERSION);
        out.push(root_tag);
        None
    };

    let mut encoder = Encoder {
        out: &mut out,
        table: table.as_ref(),
        classifier,
        options,
    };
    encoder.root(root_tag, value)?;

    let bytes = out.finish()?;
    debug!(
        root_tag,
        bytes = bytes.len(),
        strings = table.as_ref().map_or(0, |t| t.local().len()),
        dictionaries = dictionaries.len(),
        "encoded container"
    );
    Ok(bytes)
}

fn write_string_section<'a>(
    value: &'a Value,
    root_tag: u8,
    options: &WriteOptions,
    dictionaries: &[SharedDictionary],
    out: &mut ByteBuilder,
) -> Result<StringTable<'a>> {
    let mut collector = StringCollector::new();
    collector.collect(value, &options.registry, options.limits.max_depth)?;
    let table = StringTable::build(collector, dictionaries)?;
    Limits::check(
        "string count",
        table.local().len() as u64,
        options.limits.max_string_count,
    )?;

    let header = ContainerHeader {
        root_tag,
        strings: Some(StringSection {
            mode: options.mode,
            key_count: table.key_count(),
            string_data_size: 0,
            string_map_size: 0,
            dictionaries: dictionaries.iter().map(SharedDictionary::digest).collect(),
        }),
    };
    out.extend_from_slice(&header.encode()?);
    let data_slot = out.placeholder_at(ContainerHeader::STRING_DATA_SIZE_OFFSET)?;
    let map_slot = out.placeholder_at(ContainerHeader::STRING_MAP_SIZE_OFFSET)?;

    let encoded = encode_strings(
        table.local().iter().map(|text| text.as_ref()),
        options.mode,
        options.payload_codec(),
    )?;
    out.extend_from_slice(&encoded.data);
    out.patch_u64(data_slot, encoded.data.len() as u64);
    out.extend_from_slice(&encoded.map);
    out.patch_u64(map_slot, encoded.map.len() as u64);

    debug!(
        strings = table.local().len(),
        keys = table.key_count(),
        compressed = encoded.compressed,
        data_bytes = encoded.data.len(),
        map_bytes = encoded.map.len(),
        "wrote string section"
    );
    Ok(table)
}

struct Encoder<'w, 'a> {
    out: &'w mut ByteBuilder,
    table: Option<&'w StringTable<'a>>,
    classifier: TypeClassifier<'w>,
    options: &'w WriteOptions,
}

impl Encoder<'_, '_> {
    fn root(&mut self, tag: u8, value: &Value) -> Result<()> {
        if tag == TAG_ROOT_STRING {
            let Value::String(text) = value else {
                return Err(JsonzError::Internal("root string tag on non-string".to_string()));
            };
            let mut payload = Vec::new();
            self.bytes_payload(text.as_bytes(), &mut payload)?;
            self.out.extend_from_slice(&payload);
            return Ok(());
        }
        self.payload(tag, value, 0)
    }

    fn string_id(&self, text: &str) -> Result<u64> {
        self.table
            .ok_or_else(|| JsonzError::Internal("string outside a string-bearing root".to_string()))?
            .id_of(text)
    }

    fn value_id(&self, value: &Value) -> Result<u64> {
        match value {
            Value::String(text) => self.string_id(text),
            Value::Decimal(decimal) => self.string_id(&decimal.to_canonical_string()),
            other => Err(JsonzError::Internal(format!(
                "{} has no string ID",
                other.kind()
            ))),
        }
    }

    /// Signed length (negative when compressed) followed by the stored bytes
    fn bytes_payload(&self, raw: &[u8], buf: &mut Vec<u8>) -> Result<()> {
        match self
            .options
            .payload_codec()
            .map(|codec| codec.compress_if_smaller(raw))
            .transpose()?
            .flatten()
        {
            Some(packed) => {
                buf.extend_from_slice(&encode_signed_varint(true, packed.len() as u64));
                buf.extend_from_slice(&packed);
            }
            None => {
                buf.extend_from_slice(&encode_signed_varint(false, raw.len() as u64));
                buf.extend_from_slice(raw);
            }
        }
        Ok(())
    }

    /// Custom payloads are always length-prefixed
    fn custom_payload(&self, tag: u8, value: &Value, buf: &mut Vec<u8>) -> Result<()> {
        let codec = self.options.registry.get(tag).ok_or_else(|| {
            JsonzError::UnsupportedType(format!("custom tag {} has no registered codec", tag))
        })?;
        let mut payload = Vec::new();
        codec.encode(value, &mut payload)?;
        buf.extend_from_slice(&encode_varint(payload.len() as u64));
        buf.extend_from_slice(&payload);
        Ok(())
    }

    /// Payload of a scalar that needs no backpatching
    fn scalar(&self, kind: TypeTag, value: &Value, buf: &mut Vec<u8>) -> Result<()> {
        match (kind, value) {
            (
                TypeTag::Null
                | TypeTag::True
                | TypeTag::False
                | TypeTag::NaN
                | TypeTag::PosInfinity
                | TypeTag::NegInfinity,
                _,
            ) => {}
            (TypeTag::String | TypeTag::Decimal, _) => {
                buf.extend_from_slice(&encode_varint(self.value_id(value)?));
            }
            (_, Value::Integer(i)) if kind.is_integer() => {
                let (_, magnitude) = integer_parts(i);
                encode_integer(kind, &magnitude, buf)?;
            }
            (TypeTag::SignedI8 | TypeTag::SignedI32 | TypeTag::SignedI64, Value::Signed(s)) => {
                encode_signed(*s, buf);
            }
            (TypeTag::Bytes, Value::Bytes(raw)) => self.bytes_payload(raw, buf)?,
            (kind, value) => {
                return Err(JsonzError::Internal(format!(
                    "cannot write {} as {:?}",
                    value.kind(),
                    kind
                )))
            }
        }
        Ok(())
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth > self.options.limits.max_depth {
            return Err(JsonzError::ResourceLimitExceeded(format!(
                "nesting depth exceeds {}",
                self.options.limits.max_depth
            )));
        }
        Ok(())
    }

    fn payload(&mut self, tag: u8, value: &Value, depth: usize) -> Result<()> {
        self.check_depth(depth)?;
        if is_custom_tag(tag) {
            let mut buf = Vec::new();
            self.custom_payload(tag, value, &mut buf)?;
            self.out.extend_from_slice(&buf);
            return Ok(());
        }
        let kind = TypeTag::from_u8(tag)?;
        match (kind, value) {
            (TypeTag::Object, Value::Object(map)) => {
                let slot = self.out.reserve_u64();
                for (key, item) in map {
                    let key_id = self.string_id(key)?;
                    let item_tag = self.classifier.classify(item)?;
                    self.out.extend_from_slice(&encode_varint(key_id));
                    self.out.push(item_tag);
                    self.payload(item_tag, item, depth + 1)?;
                }
                self.out.patch_size_since(slot);
            }
            (TypeTag::MultiArray, Value::Array(items)) => {
                let slot = self.out.reserve_u64();
                for item in items {
                    let item_tag = self.classifier.classify(item)?;
                    self.out.push(item_tag);
                    self.payload(item_tag, item, depth + 1)?;
                }
                self.out.patch_size_since(slot);
            }
            (TypeTag::ObjectArray, Value::Array(items)) => {
                let slot = self.out.reserve_u64();
                for item in items {
                    self.payload(TypeTag::Object.as_u8(), item, depth + 1)?;
                }
                self.out.patch_size_since(slot);
            }
            (kind, Value::Array(items)) if kind.is_array() => {
                let mut buf = Vec::new();
                self.specialised_array(kind, items, &mut buf)?;
                self.out.extend_from_slice(&buf);
            }
            (kind, value) => {
                let mut buf = Vec::new();
                self.scalar(kind, value, &mut buf)?;
                self.out.extend_from_slice(&buf);
            }
        }
        Ok(())
    }

    fn specialised_array(&self, kind: TypeTag, items: &[Value], buf: &mut Vec<u8>) -> Result<()> {
        let count = encode_varint(items.len() as u64);
        match kind {
            TypeTag::NullArray => buf.extend_from_slice(&count),
            TypeTag::BoolArray => {
                let bools = items
                    .iter()
                    .map(|item| match item {
                        Value::Bool(b) => Ok(*b),
                        other => Err(mismatch(kind, other)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                buf.extend_from_slice(&count);
                buf.extend_from_slice(&pack_bools(&bools));
            }
            TypeTag::FastStringArray | TypeTag::FastDecimalArray => {
                buf.extend_from_slice(&count);
                for item in items {
                    let id = self.value_id(item)?;
                    let id = u32::try_from(id).map_err(|_| {
                        JsonzError::ResourceLimitExceeded(format!(
                            "string ID {} does not fit a fast array",
                            id
                        ))
                    })?;
                    buf.extend_from_slice(&id.to_le_bytes());
                }
            }
            TypeTag::StringArray | TypeTag::DecimalArray => {
                let mut body = Vec::with_capacity(items.len() * 2);
                for item in items {
                    body.extend_from_slice(&encode_varint(self.value_id(item)?));
                }
                length_prefixed(&body, buf);
            }
            TypeTag::PosResizingArray
            | TypeTag::NegResizingArray
            | TypeTag::PosBigArray
            | TypeTag::NegBigArray => {
                let element = kind.element_form().ok_or_else(|| mismatch_tag(kind))?;
                let mut body = Vec::new();
                for item in items {
                    self.scalar(element, item, &mut body)?;
                }
                length_prefixed(&body, buf);
            }
            TypeTag::BytesArray => {
                let mut body = Vec::new();
                for item in items {
                    self.scalar(TypeTag::Bytes, item, &mut body)?;
                }
                length_prefixed(&body, buf);
            }
            kind => {
                let element = kind
                    .element_form()
                    .filter(|element| element.defined_width().is_some())
                    .ok_or_else(|| mismatch_tag(kind))?;
                buf.extend_from_slice(&count);
                for item in items {
                    self.scalar(element, item, buf)?;
                }
            }
        }
        Ok(())
    }
}

fn length_prefixed(body: &[u8], buf: &mut Vec<u8>) {
    buf.extend_from_slice(&encode_varint(body.len() as u64));
    buf.extend_from_slice(body);
}

fn mismatch(kind: TypeTag, value: &Value) -> JsonzError {
    JsonzError::Internal(format!("{} element in {:?}", value.kind(), kind))
}

fn mismatch_tag(kind: TypeTag) -> JsonzError {
    JsonzError::Internal(format!("{:?} is not a specialised array", kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonz_format::constants::*;
    use jsonz_format::Limits;
    use serde_json::json;

    fn encode_json(json: serde_json::Value, options: &WriteOptions) -> Vec<u8> {
        encode(&Value::from_json(&json).unwrap(), options, &[]).unwrap()
    }

    #[test]
    fn test_scalar_root_has_no_string_section() {
        let bytes = encode_json(json!(300), &WriteOptions::default());
        assert_eq!(bytes, vec![FORMAT_VERSION, TAG_POS_U8 + 1, 0x2C, 0x01]);
    }

    #[test]
    fn test_root_string_is_inline() {
        let bytes = encode_json(json!("hi"), &WriteOptions::default());
        assert_eq!(bytes, vec![FORMAT_VERSION, TAG_ROOT_STRING, 1, 2, b'h', b'i']);
    }

    #[test]
    fn test_object_layout_and_backpatched_sizes() {
        let options = WriteOptions {
            compress_strings: false,
            ..WriteOptions::default()
        };
        let bytes = encode_json(json!({"a": 1, "b": "x", "c": [1, 2, 3]}), &options);
        let (header, consumed) = ContainerHeader::decode(&bytes, &Limits::default()).unwrap();
        let strings = header.strings.unwrap();
        assert_eq!(header.root_tag, TAG_OBJECT);
        assert_eq!(strings.key_count, 3);
        assert_eq!(strings.string_data_size, 4);
        assert_eq!(strings.string_map_size, 8);

        let data = &bytes[consumed..consumed + 4];
        assert_eq!(data, b"abcx");
        let body = &bytes[consumed + 12..];
        let byte_size = u64::from_le_bytes(body[..8].try_into().unwrap());
        assert_eq!(byte_size as usize, body.len() - 8);
        assert_eq!(
            &body[8..],
            &[
                0, TAG_POS_U8, 1, // "a": 1
                1, 1, TAG_STRING, 1, 3, // "b": id 3
                1, 2, TAG_POS_U8_ARRAY, 1, 3, 1, 2, 3, // "c": [1,2,3]
            ]
        );
    }

    #[test]
    fn test_bytes_require_capability() {
        let value = Value::Bytes(vec![1, 2, 3]);
        assert!(matches!(
            encode(&value, &WriteOptions::default(), &[]),
            Err(JsonzError::UnsupportedType(_))
        ));
        let options = WriteOptions {
            allow_bytes: true,
            ..WriteOptions::default()
        };
        let bytes = encode(&value, &options, &[]).unwrap();
        assert_eq!(bytes, vec![FORMAT_VERSION, TAG_BYTES, 1, 3, 1, 2, 3]);
    }

    #[test]
    fn test_depth_limit() {
        let mut value = Value::Null;
        for _ in 0..10 {
            value = Value::Array(vec![value]);
        }
        let options = WriteOptions {
            limits: Limits {
                max_depth: 4,
                ..Limits::default()
            },
            ..WriteOptions::default()
        };
        assert!(matches!(
            encode(&value, &options, &[]),
            Err(JsonzError::ResourceLimitExceeded(_))
        ));
    }
}
