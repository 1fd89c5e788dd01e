//! Built-in type tag enumeration

use crate::constants::{FIRST_CUSTOM_TAG, LAST_BUILTIN_TAG};
use crate::error::{JsonzError, Result};

/// Built-in type tag codes (one byte each, see [`crate::constants`])
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TypeTag {
    /// `null`
    Null = 0,
    /// `true`
    True = 1,
    /// `false`
    False = 2,
    /// Not-a-number
    NaN = 3,
    /// Positive infinity
    PosInfinity = 4,
    /// Negative infinity
    NegInfinity = 5,
    /// String ID
    String = 6,
    /// Decimal text string ID
    Decimal = 7,
    /// Positive 8-bit magnitude
    PosU8 = 8,
    /// Positive 16-bit magnitude
    PosU16 = 9,
    /// Positive 24-bit magnitude
    PosU24 = 10,
    /// Positive 32-bit magnitude
    PosU32 = 11,
    /// Positive 64-bit magnitude
    PosU64 = 12,
    /// Negative 8-bit magnitude
    NegU8 = 13,
    /// Negative 16-bit magnitude
    NegU16 = 14,
    /// Negative 24-bit magnitude
    NegU24 = 15,
    /// Negative 32-bit magnitude
    NegU32 = 16,
    /// Negative 64-bit magnitude
    NegU64 = 17,
    /// Positive VarInt magnitude
    PosResizing = 18,
    /// Negative VarInt magnitude
    NegResizing = 19,
    /// Positive big integer
    PosBig = 20,
    /// Negative big integer
    NegBig = 21,
    /// Two's-complement i8
    SignedI8 = 22,
    /// Two's-complement i32
    SignedI32 = 23,
    /// Two's-complement i64
    SignedI64 = 24,
    /// Byte payload
    Bytes = 25,
    /// Object
    Object = 26,
    /// Multi-type array
    MultiArray = 27,
    /// Null array
    NullArray = 28,
    /// Boolean array
    BoolArray = 29,
    /// String array
    StringArray = 30,
    /// Decimal array
    DecimalArray = 31,
    /// Fixed-width string array
    FastStringArray = 32,
    /// Fixed-width decimal array
    FastDecimalArray = 33,
    /// Positive 8-bit integer array
    PosU8Array = 34,
    /// Positive 16-bit integer array
    PosU16Array = 35,
    /// Positive 24-bit integer array
    PosU24Array = 36,
    /// Positive 32-bit integer array
    PosU32Array = 37,
    /// Positive 64-bit integer array
    PosU64Array = 38,
    /// Negative 8-bit integer array
    NegU8Array = 39,
    /// Negative 16-bit integer array
    NegU16Array = 40,
    /// Negative 24-bit integer array
    NegU24Array = 41,
    /// Negative 32-bit integer array
    NegU32Array = 42,
    /// Negative 64-bit integer array
    NegU64Array = 43,
    /// Positive resizing integer array
    PosResizingArray = 44,
    /// Negative resizing integer array
    NegResizingArray = 45,
    /// Positive big integer array
    PosBigArray = 46,
    /// Negative big integer array
    NegBigArray = 47,
    /// Object array
    ObjectArray = 48,
    /// Bytes array
    BytesArray = 49,
    /// Root-only self-contained string
    RootString = 50,
}

use TypeTag::*;

const BUILTIN: [TypeTag; LAST_BUILTIN_TAG as usize + 1] = [
    Null,
    True,
    False,
    NaN,
    PosInfinity,
    NegInfinity,
    String,
    Decimal,
    PosU8,
    PosU16,
    PosU24,
    PosU32,
    PosU64,
    NegU8,
    NegU16,
    NegU24,
    NegU32,
    NegU64,
    PosResizing,
    NegResizing,
    PosBig,
    NegBig,
    SignedI8,
    SignedI32,
    SignedI64,
    Bytes,
    Object,
    MultiArray,
    NullArray,
    BoolArray,
    StringArray,
    DecimalArray,
    FastStringArray,
    FastDecimalArray,
    PosU8Array,
    PosU16Array,
    PosU24Array,
    PosU32Array,
    PosU64Array,
    NegU8Array,
    NegU16Array,
    NegU24Array,
    NegU32Array,
    NegU64Array,
    PosResizingArray,
    NegResizingArray,
    PosBigArray,
    NegBigArray,
    ObjectArray,
    BytesArray,
    RootString,
];

const POS_DEFINED: [TypeTag; 5] = [PosU8, PosU16, PosU24, PosU32, PosU64];
const NEG_DEFINED: [TypeTag; 5] = [NegU8, NegU16, NegU24, NegU32, NegU64];

impl TypeTag {
    /// Convert from u8, rejecting reserved and custom tag numbers
    pub fn from_u8(val: u8) -> Result<Self> {
        match BUILTIN.get(val as usize) {
            Some(tag) => Ok(*tag),
            None if is_custom_tag(val) => Err(JsonzError::UnsupportedType(format!(
                "unregistered custom tag {}",
                val
            ))),
            None => Err(JsonzError::UnsupportedType(format!(
                "reserved type tag {}",
                val
            ))),
        }
    }

    /// Tag byte
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Defined-width integer tag for a byte width and sign
    pub fn defined_integer(width_index: usize, negative: bool) -> Self {
        if negative {
            NEG_DEFINED[width_index]
        } else {
            POS_DEFINED[width_index]
        }
    }

    /// Byte width of a defined-width integer tag (scalar or array form)
    pub fn defined_width(self) -> Option<usize> {
        match self {
            PosU8 | NegU8 | PosU8Array | NegU8Array => Some(1),
            PosU16 | NegU16 | PosU16Array | NegU16Array => Some(2),
            PosU24 | NegU24 | PosU24Array | NegU24Array => Some(3),
            PosU32 | NegU32 | PosU32Array | NegU32Array => Some(4),
            PosU64 | NegU64 | PosU64Array | NegU64Array => Some(8),
            _ => None,
        }
    }

    /// True for scalar integer tags chosen by the classifier
    pub fn is_integer(self) -> bool {
        matches!(self as u8, 8..=21)
    }

    /// True for integer tags (scalar or array) carrying a negative magnitude
    pub fn is_negative(self) -> bool {
        matches!(
            self,
            NegU8
                | NegU16
                | NegU24
                | NegU32
                | NegU64
                | NegResizing
                | NegBig
                | NegU8Array
                | NegU16Array
                | NegU24Array
                | NegU32Array
                | NegU64Array
                | NegResizingArray
                | NegBigArray
        )
    }

    /// True for every array encoding
    pub fn is_array(self) -> bool {
        matches!(self as u8, 27..=49)
    }

    /// True for tags whose payload is deferred to a byte range in a skeleton
    pub fn is_container(self) -> bool {
        self == Object || self.is_array()
    }

    /// True when a document rooted at this tag carries a string section
    pub fn bears_strings(self) -> bool {
        matches!(
            self,
            Object
                | MultiArray
                | ObjectArray
                | String
                | Decimal
                | StringArray
                | DecimalArray
                | FastStringArray
                | FastDecimalArray
        )
    }

    /// Specialised array tag holding elements of this scalar tag
    pub fn array_form(self) -> Option<TypeTag> {
        Some(match self {
            Null => NullArray,
            True | False => BoolArray,
            String => StringArray,
            Decimal => DecimalArray,
            PosU8 => PosU8Array,
            PosU16 => PosU16Array,
            PosU24 => PosU24Array,
            PosU32 => PosU32Array,
            PosU64 => PosU64Array,
            NegU8 => NegU8Array,
            NegU16 => NegU16Array,
            NegU24 => NegU24Array,
            NegU32 => NegU32Array,
            NegU64 => NegU64Array,
            PosResizing => PosResizingArray,
            NegResizing => NegResizingArray,
            PosBig => PosBigArray,
            NegBig => NegBigArray,
            Object => ObjectArray,
            Bytes => BytesArray,
            _ => return None,
        })
    }

    /// Scalar tag of the elements of a specialised array
    pub fn element_form(self) -> Option<TypeTag> {
        Some(match self {
            NullArray => Null,
            BoolArray => True,
            StringArray | FastStringArray => String,
            DecimalArray | FastDecimalArray => Decimal,
            PosU8Array => PosU8,
            PosU16Array => PosU16,
            PosU24Array => PosU24,
            PosU32Array => PosU32,
            PosU64Array => PosU64,
            NegU8Array => NegU8,
            NegU16Array => NegU16,
            NegU24Array => NegU24,
            NegU32Array => NegU32,
            NegU64Array => NegU64,
            PosResizingArray => PosResizing,
            NegResizingArray => NegResizing,
            PosBigArray => PosBig,
            NegBigArray => NegBig,
            ObjectArray => Object,
            BytesArray => Bytes,
            _ => return None,
        })
    }
}

/// True for tag numbers in the user-registrable range
pub fn is_custom_tag(val: u8) -> bool {
    val >= FIRST_CUSTOM_TAG
}
