//! Type registry: tag selection, integer payloads and custom tag codecs
//!
//! Built-in tags are fixed (see [`jsonz_format::constants`]). Tags from
//! `0x80` upward belong to user code: a [`TagCodec`] registered in a
//! [`TagRegistry`] is offered every value before the built-in rules run, and
//! decodes payloads carrying its tag. Custom payloads are always written with
//! a VarInt length prefix so readers without the codec can step over them.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use jsonz_format::constants::{DEFINED_WIDTHS, TAG_MULTI_ARRAY};
use jsonz_format::types::is_custom_tag;
use jsonz_format::varint::{encode_varint, encode_varint_bytes, trim_le, MAX_VARINT_BYTES};
use jsonz_format::{JsonzError, Result, TypeTag};
use num_bigint::{BigInt, Sign};

use crate::cursor::Cursor;
use crate::value::{SignedInt, SpecialFloat, Value};

/// Encode/decode capability for one custom tag
pub trait TagCodec: Send + Sync {
    /// Tag byte, `0x80..=0xFF`
    fn tag(&self) -> u8;

    /// Human-readable name
    fn name(&self) -> &str;

    /// True if this codec should encode `value`
    fn accepts(&self, value: &Value) -> bool;

    /// Append the payload for `value` (without the length prefix)
    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()>;

    /// Rebuild a value from its payload
    fn decode(&self, payload: &[u8]) -> Result<Value>;
}

/// Codec that carries [`Value::Custom`] payloads for one tag unchanged
#[derive(Debug, Clone)]
pub struct RawTagCodec {
    tag: u8,
    name: String,
}

impl RawTagCodec {
    /// Pass-through codec for `tag`
    pub fn new(tag: u8, name: impl Into<String>) -> Self {
        Self {
            tag,
            name: name.into(),
        }
    }
}

impl TagCodec for RawTagCodec {
    fn tag(&self) -> u8 {
        self.tag
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn accepts(&self, value: &Value) -> bool {
        matches!(value, Value::Custom { tag, .. } if *tag == self.tag)
    }

    fn encode(&self, value: &Value, out: &mut Vec<u8>) -> Result<()> {
        match value {
            Value::Custom { payload, .. } => {
                out.extend_from_slice(payload);
                Ok(())
            }
            other => Err(JsonzError::TypeMismatch(format!(
                "{} codec cannot encode {}",
                self.name,
                other.kind()
            ))),
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<Value> {
        Ok(Value::Custom {
            tag: self.tag,
            payload: payload.to_vec(),
        })
    }
}

/// Registered custom tag codecs
#[derive(Clone, Default)]
pub struct TagRegistry {
    codecs: BTreeMap<u8, Arc<dyn TagCodec>>,
}

impl fmt::Debug for TagRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.codecs.iter().map(|(tag, codec)| (tag, codec.name())))
            .finish()
    }
}

impl TagRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a codec for its tag
    pub fn register(&mut self, codec: Arc<dyn TagCodec>) -> Result<()> {
        let tag = codec.tag();
        if !is_custom_tag(tag) {
            return Err(JsonzError::UnsupportedType(format!(
                "tag {} is reserved for built-in types",
                tag
            )));
        }
        if self.codecs.contains_key(&tag) {
            return Err(JsonzError::UnsupportedType(format!(
                "tag {} is already registered",
                tag
            )));
        }
        self.codecs.insert(tag, codec);
        Ok(())
    }

    /// Builder-style [`TagRegistry::register`]
    pub fn with(mut self, codec: Arc<dyn TagCodec>) -> Result<Self> {
        self.register(codec)?;
        Ok(self)
    }

    /// Codec for `tag`
    pub fn get(&self, tag: u8) -> Option<&Arc<dyn TagCodec>> {
        self.codecs.get(&tag)
    }

    /// First codec (lowest tag) accepting `value`
    pub fn find_for(&self, value: &Value) -> Option<&Arc<dyn TagCodec>> {
        self.codecs.values().find(|codec| codec.accepts(value))
    }

    /// Number of registered codecs
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }
}

/// Chooses the tag for each value
#[derive(Debug, Clone, Copy)]
pub struct TypeClassifier<'r> {
    registry: &'r TagRegistry,
    fast_string_arrays: bool,
    allow_bytes: bool,
}

impl<'r> TypeClassifier<'r> {
    /// Classifier over a registry and write capabilities
    pub fn new(registry: &'r TagRegistry, fast_string_arrays: bool, allow_bytes: bool) -> Self {
        Self {
            registry,
            fast_string_arrays,
            allow_bytes,
        }
    }

    /// Registry consulted before the built-in rules
    pub fn registry(&self) -> &'r TagRegistry {
        self.registry
    }

    /// Tag byte for `value` in a key map or index map position
    pub fn classify(&self, value: &Value) -> Result<u8> {
        if let Some(codec) = self.registry.find_for(value) {
            return Ok(codec.tag());
        }
        let tag = match value {
            Value::Null => TypeTag::Null,
            Value::Bool(true) => TypeTag::True,
            Value::Bool(false) => TypeTag::False,
            Value::Float(SpecialFloat::NaN) => TypeTag::NaN,
            Value::Float(SpecialFloat::Infinity) => TypeTag::PosInfinity,
            Value::Float(SpecialFloat::NegInfinity) => TypeTag::NegInfinity,
            Value::String(_) => TypeTag::String,
            Value::Decimal(_) => TypeTag::Decimal,
            Value::Integer(i) => {
                let (negative, magnitude) = integer_parts(i);
                integer_tag(negative, magnitude.len())
            }
            Value::Signed(SignedInt::I8(_)) => TypeTag::SignedI8,
            Value::Signed(SignedInt::I32(_)) => TypeTag::SignedI32,
            Value::Signed(SignedInt::I64(_)) => TypeTag::SignedI64,
            Value::Bytes(_) if self.allow_bytes => TypeTag::Bytes,
            Value::Bytes(_) => {
                return Err(JsonzError::UnsupportedType(
                    "bytes values require the bytes capability".to_string(),
                ))
            }
            Value::Object(_) => TypeTag::Object,
            Value::Array(items) => return self.array_tag(items),
            Value::Custom { tag, .. } => {
                return Err(JsonzError::UnsupportedType(format!(
                    "custom tag {} has no registered codec",
                    tag
                )))
            }
        };
        Ok(tag.as_u8())
    }

    /// Array encoding: a specialised form when every element shares one
    /// array class, otherwise the multi-type array
    pub fn array_tag(&self, items: &[Value]) -> Result<u8> {
        let mut class: Option<TypeTag> = None;
        for item in items {
            if matches!(item, Value::Array(_)) {
                return Ok(TAG_MULTI_ARRAY);
            }
            let tag = self.classify(item)?;
            let form = if is_custom_tag(tag) {
                None
            } else {
                TypeTag::from_u8(tag)?.array_form()
            };
            match (form, class) {
                (None, _) => return Ok(TAG_MULTI_ARRAY),
                (Some(form), None) => class = Some(form),
                (Some(form), Some(seen)) if form == seen => {}
                _ => return Ok(TAG_MULTI_ARRAY),
            }
        }

        let tag = match class {
            None => return Ok(TAG_MULTI_ARRAY),
            Some(TypeTag::StringArray) if self.fast_string_arrays => TypeTag::FastStringArray,
            Some(TypeTag::DecimalArray) if self.fast_string_arrays => TypeTag::FastDecimalArray,
            Some(form) => form,
        };
        Ok(tag.as_u8())
    }
}

/// Split an integer into its sign and trimmed little-endian magnitude
pub fn integer_parts(value: &BigInt) -> (bool, Vec<u8>) {
    let (sign, mut magnitude) = value.to_bytes_le();
    let len = trim_le(&magnitude).len();
    magnitude.truncate(len);
    (sign == Sign::Minus, magnitude)
}

/// Integer tag for a magnitude of `len` bytes
pub fn integer_tag(negative: bool, len: usize) -> TypeTag {
    let pick = |pos: TypeTag, neg: TypeTag| if negative { neg } else { pos };
    match len {
        0..=4 => TypeTag::defined_integer(len.saturating_sub(1), negative),
        8 => TypeTag::defined_integer(DEFINED_WIDTHS.len() - 1, negative),
        5..=MAX_VARINT_BYTES => pick(TypeTag::PosResizing, TypeTag::NegResizing),
        _ => pick(TypeTag::PosBig, TypeTag::NegBig),
    }
}

/// Append the payload of integer `tag` for a trimmed magnitude
pub fn encode_integer(tag: TypeTag, magnitude: &[u8], out: &mut Vec<u8>) -> Result<()> {
    if let Some(width) = tag.defined_width() {
        if magnitude.len() > width {
            return Err(JsonzError::Internal(format!(
                "{}-byte magnitude does not fit {:?}",
                magnitude.len(),
                tag
            )));
        }
        out.extend_from_slice(magnitude);
        out.resize(out.len() + width - magnitude.len(), 0);
        return Ok(());
    }
    match tag {
        TypeTag::PosResizing | TypeTag::NegResizing => {
            out.extend_from_slice(&encode_varint_bytes(magnitude)?);
        }
        TypeTag::PosBig | TypeTag::NegBig => {
            out.extend_from_slice(&encode_varint(magnitude.len() as u64));
            out.extend_from_slice(magnitude);
        }
        other => {
            return Err(JsonzError::Internal(format!(
                "{:?} is not an integer tag",
                other
            )))
        }
    }
    Ok(())
}

/// Read the payload of integer `tag`
pub fn decode_integer(tag: TypeTag, cursor: &mut Cursor<'_>) -> Result<BigInt> {
    let magnitude = match (tag.defined_width(), tag) {
        (Some(width), _) => cursor.read_bytes(width)?,
        (None, TypeTag::PosResizing | TypeTag::NegResizing) => cursor.read_varint_bytes()?,
        (None, TypeTag::PosBig | TypeTag::NegBig) => {
            let len = cursor.read_len()?;
            cursor.read_bytes(len)?
        }
        (None, other) => return Err(JsonzError::InvalidTagContext(other.as_u8())),
    };
    let sign = if tag.is_negative() {
        Sign::Minus
    } else {
        Sign::Plus
    };
    Ok(BigInt::from_bytes_le(sign, magnitude))
}

/// Append a fixed-width signed pass-through payload
pub fn encode_signed(value: SignedInt, out: &mut Vec<u8>) {
    match value {
        SignedInt::I8(v) => out.extend_from_slice(&v.to_le_bytes()),
        SignedInt::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
        SignedInt::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
    }
}

/// Read a fixed-width signed pass-through payload
pub fn decode_signed(tag: TypeTag, cursor: &mut Cursor<'_>) -> Result<SignedInt> {
    Ok(match tag {
        TypeTag::SignedI8 => SignedInt::I8(cursor.read_u8()? as i8),
        TypeTag::SignedI32 => SignedInt::I32(cursor.read_uint(4)? as u32 as i32),
        TypeTag::SignedI64 => SignedInt::I64(cursor.read_u64()? as i64),
        other => return Err(JsonzError::InvalidTagContext(other.as_u8())),
    })
}
