//! Constants and tag numbers for JSONZ format

/// Container and shared-dictionary format version.
pub const FORMAT_VERSION: u8 = 1;

/// String map mode: one signed VarInt size per string.
pub const MODE_SIZE_OPTIMIZED: u8 = 0;
/// String map mode: fixed `(i64 size, u64 offset)` records.
pub const MODE_ACCESS_OPTIMIZED: u8 = 1;

/// Width of one access-optimized string map record.
pub const ACCESS_RECORD_BYTES: usize = 16;

/// Length of a shared-dictionary digest.
pub const DIGEST_BYTES: usize = 16;

/// Width of a backpatched container `byte_size` field.
pub const BYTE_SIZE_FIELD: usize = 8;

/// Type tag representing `null`.
pub const TAG_NULL: u8 = 0;
/// Type tag representing `true`.
pub const TAG_TRUE: u8 = 1;
/// Type tag representing `false`.
pub const TAG_FALSE: u8 = 2;
/// Type tag representing NaN.
pub const TAG_NAN: u8 = 3;
/// Type tag representing positive infinity.
pub const TAG_POS_INFINITY: u8 = 4;
/// Type tag representing negative infinity.
pub const TAG_NEG_INFINITY: u8 = 5;
/// Type tag for a string ID.
pub const TAG_STRING: u8 = 6;
/// Type tag for a decimal stored as a string ID.
pub const TAG_DECIMAL: u8 = 7;
/// First of the five positive defined-width integer tags (8/16/24/32/64 bits).
pub const TAG_POS_U8: u8 = 8;
/// First of the five negative defined-width integer tags.
pub const TAG_NEG_U8: u8 = 13;
/// Positive resizing integer.
pub const TAG_POS_RESIZING: u8 = 18;
/// Negative resizing integer.
pub const TAG_NEG_RESIZING: u8 = 19;
/// Positive big integer.
pub const TAG_POS_BIG: u8 = 20;
/// Negative big integer.
pub const TAG_NEG_BIG: u8 = 21;
/// Two's-complement 8-bit signed pass-through.
pub const TAG_SIGNED_I8: u8 = 22;
/// Two's-complement 32-bit signed pass-through.
pub const TAG_SIGNED_I32: u8 = 23;
/// Two's-complement 64-bit signed pass-through.
pub const TAG_SIGNED_I64: u8 = 24;
/// Raw or compressed bytes.
pub const TAG_BYTES: u8 = 25;
/// Object with key map.
pub const TAG_OBJECT: u8 = 26;
/// Array with per-element tags.
pub const TAG_MULTI_ARRAY: u8 = 27;
/// Array of nulls.
pub const TAG_NULL_ARRAY: u8 = 28;
/// Bit-packed boolean array.
pub const TAG_BOOL_ARRAY: u8 = 29;
/// Array of VarInt string IDs.
pub const TAG_STRING_ARRAY: u8 = 30;
/// Array of VarInt decimal string IDs.
pub const TAG_DECIMAL_ARRAY: u8 = 31;
/// Array of fixed-width string IDs.
pub const TAG_FAST_STRING_ARRAY: u8 = 32;
/// Array of fixed-width decimal string IDs.
pub const TAG_FAST_DECIMAL_ARRAY: u8 = 33;
/// First of the five positive defined-width integer array tags.
pub const TAG_POS_U8_ARRAY: u8 = 34;
/// First of the five negative defined-width integer array tags.
pub const TAG_NEG_U8_ARRAY: u8 = 39;
/// Array of positive resizing integers.
pub const TAG_POS_RESIZING_ARRAY: u8 = 44;
/// Array of negative resizing integers.
pub const TAG_NEG_RESIZING_ARRAY: u8 = 45;
/// Array of positive big integers.
pub const TAG_POS_BIG_ARRAY: u8 = 46;
/// Array of negative big integers.
pub const TAG_NEG_BIG_ARRAY: u8 = 47;
/// Array of objects.
pub const TAG_OBJECT_ARRAY: u8 = 48;
/// Array of byte payloads.
pub const TAG_BYTES_ARRAY: u8 = 49;
/// Self-contained string used only as the document root.
pub const TAG_ROOT_STRING: u8 = 50;

/// Highest built-in tag.
pub const LAST_BUILTIN_TAG: u8 = TAG_ROOT_STRING;
/// Lowest tag available to user-registered codecs.
pub const FIRST_CUSTOM_TAG: u8 = 0x80;

/// Byte widths of the defined-width integer forms, in tag order.
pub const DEFINED_WIDTHS: [usize; 5] = [1, 2, 3, 4, 8];
