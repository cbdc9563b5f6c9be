//! Exact encoded sizes, computed without encoding.
//!
//! The `*_size` helpers include the tag; the `*_size_no_tag` helpers cover the
//! value alone. Length-delimited sizes include the length prefix.

use super::varint::{encode_zigzag32, encode_zigzag64, varint_len};
use super::{make_tag, WireType};
use crate::message::MessageWrite;

/// Bytes needed for the tag of `field_number`.
pub fn tag_size(field_number: u32) -> usize {
    varint_len(u64::from(make_tag(field_number, WireType::Varint)))
}

/// Bytes needed for a varint treated as unsigned 32 bits.
pub fn raw_varint32_size(value: u32) -> usize {
    varint_len(u64::from(value))
}

/// Bytes needed for a varint.
pub fn raw_varint64_size(value: u64) -> usize {
    varint_len(value)
}

/// Size of a `double` value.
pub fn double_size_no_tag(_value: f64) -> usize {
    8
}

/// Size of a `float` value.
pub fn float_size_no_tag(_value: f32) -> usize {
    4
}

/// Size of a `uint64` value.
pub fn uint64_size_no_tag(value: u64) -> usize {
    varint_len(value)
}

/// Size of an `int64` value.
pub fn int64_size_no_tag(value: i64) -> usize {
    varint_len(value as u64)
}

/// Size of an `int32` value; negatives are sign-extended to ten bytes.
pub fn int32_size_no_tag(value: i32) -> usize {
    varint_len(i64::from(value) as u64)
}

/// Size of a `fixed64` value.
pub fn fixed64_size_no_tag(_value: u64) -> usize {
    8
}

/// Size of a `fixed32` value.
pub fn fixed32_size_no_tag(_value: u32) -> usize {
    4
}

/// Size of a `bool` value.
pub fn bool_size_no_tag(_value: bool) -> usize {
    1
}

/// Size of a `string` value including its length prefix.
pub fn string_size_no_tag(value: &str) -> usize {
    bytes_size_no_tag(value.as_bytes())
}

/// Size of a `bytes` value including its length prefix.
pub fn bytes_size_no_tag(value: &[u8]) -> usize {
    varint_len(value.len() as u64) + value.len()
}

/// Size of a group body; the end tag is counted by [`group_size`].
pub fn group_size_no_tag(value: &dyn MessageWrite) -> usize {
    value.serialized_size()
}

/// Size of an embedded message including its length prefix.
pub fn message_size_no_tag(value: &dyn MessageWrite) -> usize {
    let size = value.serialized_size();
    varint_len(size as u64) + size
}

/// Size of a `uint32` value.
pub fn uint32_size_no_tag(value: u32) -> usize {
    varint_len(u64::from(value))
}

/// Size of an enum value; encoded exactly like `int32`.
pub fn enum_size_no_tag(value: i32) -> usize {
    int32_size_no_tag(value)
}

/// Size of an `sfixed32` value.
pub fn sfixed32_size_no_tag(_value: i32) -> usize {
    4
}

/// Size of an `sfixed64` value.
pub fn sfixed64_size_no_tag(_value: i64) -> usize {
    8
}

/// Size of an `sint32` value.
pub fn sint32_size_no_tag(value: i32) -> usize {
    varint_len(u64::from(encode_zigzag32(value)))
}

/// Size of an `sint64` value.
pub fn sint64_size_no_tag(value: i64) -> usize {
    varint_len(encode_zigzag64(value))
}

macro_rules! tagged_size {
    ($(#[$doc:meta] $name:ident => $no_tag:ident($ty:ty);)*) => {
        $(
            #[$doc]
            pub fn $name(field_number: u32, value: $ty) -> usize {
                tag_size(field_number) + $no_tag(value)
            }
        )*
    };
}

tagged_size! {
    /// Size of a `double` field including tag.
    double_size => double_size_no_tag(f64);
    /// Size of a `float` field including tag.
    float_size => float_size_no_tag(f32);
    /// Size of a `uint64` field including tag.
    uint64_size => uint64_size_no_tag(u64);
    /// Size of an `int64` field including tag.
    int64_size => int64_size_no_tag(i64);
    /// Size of an `int32` field including tag.
    int32_size => int32_size_no_tag(i32);
    /// Size of a `fixed64` field including tag.
    fixed64_size => fixed64_size_no_tag(u64);
    /// Size of a `fixed32` field including tag.
    fixed32_size => fixed32_size_no_tag(u32);
    /// Size of a `bool` field including tag.
    bool_size => bool_size_no_tag(bool);
    /// Size of a `string` field including tag.
    string_size => string_size_no_tag(&str);
    /// Size of a `bytes` field including tag.
    bytes_size => bytes_size_no_tag(&[u8]);
    /// Size of an embedded message field including tag.
    message_size => message_size_no_tag(&dyn MessageWrite);
    /// Size of a `uint32` field including tag.
    uint32_size => uint32_size_no_tag(u32);
    /// Size of an enum field including tag.
    enum_size => enum_size_no_tag(i32);
    /// Size of an `sfixed32` field including tag.
    sfixed32_size => sfixed32_size_no_tag(i32);
    /// Size of an `sfixed64` field including tag.
    sfixed64_size => sfixed64_size_no_tag(i64);
    /// Size of an `sint32` field including tag.
    sint32_size => sint32_size_no_tag(i32);
    /// Size of an `sint64` field including tag.
    sint64_size => sint64_size_no_tag(i64);
}

/// Size of a group field: start tag, body, end tag.
pub fn group_size(field_number: u32, value: &dyn MessageWrite) -> usize {
    tag_size(field_number) * 2 + group_size_no_tag(value)
}
