//! Abstract value tree consumed and produced by the codec

use std::str::FromStr;

use indexmap::IndexMap;
use jsonz_format::{Decimal, JsonzError, Result};
use num_bigint::BigInt;
use num_traits::ToPrimitive;

/// Ordered object map; iteration follows insertion order
pub type Map = IndexMap<String, Value>;

/// Non-finite floating point values with dedicated tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpecialFloat {
    /// Not-a-number
    NaN,
    /// Positive infinity
    Infinity,
    /// Negative infinity
    NegInfinity,
}

/// Fixed-width signed integers carried through in their binary shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignedInt {
    /// 8-bit
    I8(i8),
    /// 32-bit
    I32(i32),
    /// 64-bit
    I64(i64),
}

/// JSON-shaped value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Arbitrary-precision integer
    Integer(BigInt),
    /// Exact decimal
    Decimal(Decimal),
    /// NaN or an infinity
    Float(SpecialFloat),
    /// UTF-8 string
    String(String),
    /// Raw bytes (requires the bytes capability)
    Bytes(Vec<u8>),
    /// Fixed-width signed pass-through
    Signed(SignedInt),
    /// Array
    Array(Vec<Value>),
    /// Object with insertion-ordered keys
    Object(Map),
    /// Opaque payload handled by a registered custom tag codec
    Custom {
        /// Registered tag number
        tag: u8,
        /// Codec-defined payload
        payload: Vec<u8>,
    },
}

impl Value {
    /// Convert from a `serde_json` value, keeping key order and number text
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        Ok(match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => Self::from_number_text(&n.to_string())?,
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(Value::from_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            serde_json::Value::Object(obj) => {
                let mut map = Map::with_capacity(obj.len());
                for (key, value) in obj {
                    map.insert(key.clone(), Value::from_json(value)?);
                }
                Value::Object(map)
            }
        })
    }

    /// Classify JSON number text as an integer or a decimal
    pub fn from_number_text(text: &str) -> Result<Self> {
        if text.contains(['.', 'e', 'E']) {
            Ok(Value::Decimal(Decimal::from_str_exact(text)?))
        } else {
            BigInt::from_str(text)
                .map(Value::Integer)
                .map_err(|_| JsonzError::TypeMismatch(format!("'{}' is not an integer", text)))
        }
    }

    /// Convert into a `serde_json` value
    ///
    /// Fails with [`JsonzError::TypeMismatch`] for values JSON text cannot
    /// express (NaN, infinities, bytes, custom payloads).
    pub fn to_json(&self) -> Result<serde_json::Value> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => number(&i.to_string())?,
            Value::Decimal(d) => number(&d.to_canonical_string())?,
            Value::Signed(SignedInt::I8(v)) => serde_json::Value::from(*v),
            Value::Signed(SignedInt::I32(v)) => serde_json::Value::from(*v),
            Value::Signed(SignedInt::I64(v)) => serde_json::Value::from(*v),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(items) => serde_json::Value::Array(
                items
                    .iter()
                    .map(Value::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Value::Object(map) => {
                let mut obj = serde_json::Map::with_capacity(map.len());
                for (key, value) in map {
                    obj.insert(key.clone(), value.to_json()?);
                }
                serde_json::Value::Object(obj)
            }
            Value::Float(special) => {
                return Err(JsonzError::TypeMismatch(format!(
                    "{:?} has no JSON representation",
                    special
                )))
            }
            Value::Bytes(_) => {
                return Err(JsonzError::TypeMismatch(
                    "bytes have no JSON representation".to_string(),
                ))
            }
            Value::Custom { tag, .. } => {
                return Err(JsonzError::TypeMismatch(format!(
                    "custom tag {} has no JSON representation",
                    tag
                )))
            }
        })
    }

    /// Short kind name used in diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Signed(_) => "signed",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Custom { .. } => "custom",
        }
    }

    /// String contents, if this is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer value as i64, if it fits
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => i.to_i64(),
            Value::Signed(SignedInt::I8(v)) => Some(i64::from(*v)),
            Value::Signed(SignedInt::I32(v)) => Some(i64::from(*v)),
            Value::Signed(SignedInt::I64(v)) => Some(*v),
            _ => None,
        }
    }

    /// Object map, if this is an object
    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    /// Array items, if this is an array
    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Deep equality that also requires identical object key order
    pub fn ordered_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len()
                    && a
                        .iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && va.ordered_eq(vb))
            }
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.ordered_eq(y))
            }
            _ => self == other,
        }
    }
}

fn number(text: &str) -> Result<serde_json::Value> {
    serde_json::Number::from_str(text)
        .map(serde_json::Value::Number)
        .map_err(JsonzError::from)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(BigInt::from(i))
    }
}

impl From<u64> for Value {
    fn from(i: u64) -> Self {
        Value::Integer(BigInt::from(i))
    }
}

impl From<BigInt> for Value {
    fn from(i: BigInt) -> Self {
        Value::Integer(i)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl TryFrom<&serde_json::Value> for Value {
    type Error = JsonzError;

    fn try_from(json: &serde_json::Value) -> Result<Self> {
        Value::from_json(json)
    }
}
