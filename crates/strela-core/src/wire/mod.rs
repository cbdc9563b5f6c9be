//! Protobuf wire format primitives.
//!
//! ## Wire Format Overview
//!
//! Each protobuf field is encoded as:
//! - A varint "tag" containing the field number and wire type
//! - The field data (format depends on wire type)
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: I64 (fixed64, sfixed64, double)
//! - 2: LEN (string, bytes, embedded messages, packed repeated fields)
//! - 3/4: START_GROUP / END_GROUP (deprecated tag-delimited messages)
//! - 5: I32 (fixed32, sfixed32, float)
//!
//! The pure integer transforms live in [`varint`]; exact encoded sizes, used
//! for two-pass length prefixing, live in [`size`].

pub mod size;
pub mod varint;

use crate::array::ArrayValueType;
use crate::error::{Error, Result};

pub use varint::{
    decode_varint, decode_zigzag32, decode_zigzag64, encode_varint, encode_zigzag32,
    encode_zigzag64, varint_len, MAX_VARINT_LEN,
};

/// Maximum valid protobuf field number (2^29 - 1)
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

/// Number of low tag bits holding the wire type
pub const TAG_TYPE_BITS: u32 = 3;

const TAG_TYPE_MASK: u32 = (1 << TAG_TYPE_BITS) - 1;

/// Protobuf wire types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum WireType {
    /// Variable-length integer
    Varint = 0,
    /// 64-bit fixed-width
    I64 = 1,
    /// Length-delimited (strings, bytes, embedded messages)
    Len = 2,
    /// Start group (deprecated)
    StartGroup = 3,
    /// End group (deprecated)
    EndGroup = 4,
    /// 32-bit fixed-width
    I32 = 5,
}

impl TryFrom<u8> for WireType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::I64),
            2 => Ok(WireType::Len),
            3 => Ok(WireType::StartGroup),
            4 => Ok(WireType::EndGroup),
            5 => Ok(WireType::I32),
            _ => Err(Error::invalid_tag(
                u32::from(value),
                format!("unknown wire type: {}", value),
            )),
        }
    }
}

/// Combines a field number and wire type into a tag.
pub const fn make_tag(field_number: u32, wire_type: WireType) -> u32 {
    (field_number << TAG_TYPE_BITS) | wire_type as u32
}

/// Field number stored in the upper bits of a tag.
pub const fn tag_field_number(tag: u32) -> u32 {
    tag >> TAG_TYPE_BITS
}

/// Raw wire type bits of a tag; may name an undefined wire type.
pub const fn tag_wire_type_bits(tag: u32) -> u8 {
    (tag & TAG_TYPE_MASK) as u8
}

/// Wire type of a tag, failing for the two undefined encodings.
pub fn tag_wire_type(tag: u32) -> Result<WireType> {
    WireType::try_from(tag_wire_type_bits(tag))
        .map_err(|_| Error::invalid_tag(tag, "undefined wire type"))
}

/// Declared field types of the schema language.
///
/// The discriminants match `FieldDescriptorProto.Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FieldType {
    /// double, exactly eight bytes on the wire
    Double = 1,
    /// float, exactly four bytes on the wire
    Float = 2,
    /// int64, varint on the wire
    Int64 = 3,
    /// uint64, varint on the wire
    UInt64 = 4,
    /// int32, sign-extended varint on the wire
    Int32 = 5,
    /// uint64, exactly eight bytes on the wire
    Fixed64 = 6,
    /// uint32, exactly four bytes on the wire
    Fixed32 = 7,
    /// bool, varint on the wire
    Bool = 8,
    /// UTF-8 text
    String = 9,
    /// Tag-delimited message (deprecated)
    Group = 10,
    /// Length-delimited message
    Message = 11,
    /// Arbitrary byte array
    Bytes = 12,
    /// uint32, varint on the wire
    UInt32 = 13,
    /// Enum, varint on the wire
    Enum = 14,
    /// int32, exactly four bytes on the wire
    SFixed32 = 15,
    /// int64, exactly eight bytes on the wire
    SFixed64 = 16,
    /// int32, zigzag-encoded varint on the wire
    SInt32 = 17,
    /// int64, zigzag-encoded varint on the wire
    SInt64 = 18,
}

impl FieldType {
    /// Converts a `FieldDescriptorProto.Type` number.
    pub fn from_i32(value: i32) -> Option<Self> {
        Some(match value {
            1 => FieldType::Double,
            2 => FieldType::Float,
            3 => FieldType::Int64,
            4 => FieldType::UInt64,
            5 => FieldType::Int32,
            6 => FieldType::Fixed64,
            7 => FieldType::Fixed32,
            8 => FieldType::Bool,
            9 => FieldType::String,
            10 => FieldType::Group,
            11 => FieldType::Message,
            12 => FieldType::Bytes,
            13 => FieldType::UInt32,
            14 => FieldType::Enum,
            15 => FieldType::SFixed32,
            16 => FieldType::SFixed64,
            17 => FieldType::SInt32,
            18 => FieldType::SInt64,
            _ => return None,
        })
    }

    /// Wire type used for a single (unpacked) value of this type.
    pub fn wire_type(self) -> WireType {
        match self {
            FieldType::Double | FieldType::Fixed64 | FieldType::SFixed64 => WireType::I64,
            FieldType::Float | FieldType::Fixed32 | FieldType::SFixed32 => WireType::I32,
            FieldType::Int64
            | FieldType::UInt64
            | FieldType::Int32
            | FieldType::Bool
            | FieldType::UInt32
            | FieldType::Enum
            | FieldType::SInt32
            | FieldType::SInt64 => WireType::Varint,
            FieldType::String | FieldType::Message | FieldType::Bytes => WireType::Len,
            FieldType::Group => WireType::StartGroup,
        }
    }

    /// Whether repeated fields of this type may use packed encoding.
    pub fn is_packable(self) -> bool {
        !matches!(
            self,
            FieldType::String | FieldType::Group | FieldType::Message | FieldType::Bytes
        )
    }

    /// Element kind of the typed array storing repeated values of this type.
    pub fn array_value_type(self) -> ArrayValueType {
        match self {
            FieldType::Bool => ArrayValueType::Bool,
            FieldType::Int32 | FieldType::SInt32 | FieldType::SFixed32 | FieldType::Enum => {
                ArrayValueType::Int32
            }
            FieldType::UInt32 | FieldType::Fixed32 => ArrayValueType::UInt32,
            FieldType::Int64 | FieldType::SInt64 | FieldType::SFixed64 => ArrayValueType::Int64,
            FieldType::UInt64 | FieldType::Fixed64 => ArrayValueType::UInt64,
            FieldType::Float => ArrayValueType::Float,
            FieldType::Double => ArrayValueType::Double,
            FieldType::String | FieldType::Bytes | FieldType::Message | FieldType::Group => {
                ArrayValueType::Object
            }
        }
    }

    /// Name of the type as written in a schema file.
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::Double => "double",
            FieldType::Float => "float",
            FieldType::Int64 => "int64",
            FieldType::UInt64 => "uint64",
            FieldType::Int32 => "int32",
            FieldType::Fixed64 => "fixed64",
            FieldType::Fixed32 => "fixed32",
            FieldType::Bool => "bool",
            FieldType::String => "string",
            FieldType::Group => "group",
            FieldType::Message => "message",
            FieldType::Bytes => "bytes",
            FieldType::UInt32 => "uint32",
            FieldType::Enum => "enum",
            FieldType::SFixed32 => "sfixed32",
            FieldType::SFixed64 => "sfixed64",
            FieldType::SInt32 => "sint32",
            FieldType::SInt64 => "sint64",
        }
    }
}
