//! The contract between generated record types and the runtime.
//!
//! Every schema message maps to a record type implementing [`Message`] and a
//! builder implementing [`MessageBuilder`]. Records are immutable once built;
//! builders track presence with explicit has-bits and are consumed by
//! [`MessageBuilder::build`] or [`MessageBuilder::build_partial`].
//!
//! The free functions at the bottom are the field-kind routines generated
//! code calls for repeated scalars, enums and sub-messages.

use crate::array::{AppendableArray, ArrayObject, ArraySlice, ArrayValueType};
use crate::descriptor::{Descriptor, EnumDescriptor};
use crate::error::{Error, Result};
use crate::extension::ExtensionRegistry;
use crate::io::{CodedInputStream, CodedOutputStream};
use crate::unknown::UnknownFieldSet;
use crate::wire::{size, FieldType, WireType};
use bytes::Bytes;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::io::Read;
use std::sync::atomic::{AtomicI64, Ordering};

/// Anything that can be written to a [`CodedOutputStream`].
pub trait MessageWrite {
    /// Writes every present field.
    fn write_to(&self, out: &mut CodedOutputStream<'_>) -> Result<()>;

    /// Exact number of bytes [`write_to`](Self::write_to) produces.
    fn serialized_size(&self) -> usize;

    /// Serializes into a new buffer.
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::with_capacity(self.serialized_size());
        let mut out = CodedOutputStream::new(&mut buf);
        self.write_to(&mut out)?;
        out.flush()?;
        drop(out);
        Ok(buf)
    }

    /// Serializes with a varint length prefix.
    fn to_length_delimited_bytes(&self) -> Result<Vec<u8>>
    where
        Self: Sized,
    {
        let len = self.serialized_size();
        let mut buf = Vec::with_capacity(len + size::raw_varint64_size(len as u64));
        let mut out = CodedOutputStream::new(&mut buf);
        out.write_message_no_tag(self)?;
        out.flush()?;
        drop(out);
        Ok(buf)
    }
}

/// Anything a [`CodedInputStream`] can merge fields into.
pub trait MergeFromCodedStream {
    /// Reads fields until the end of input, the active limit or an end-group tag.
    fn merge_from_coded_stream(
        &mut self,
        input: &mut CodedInputStream<'_>,
        registry: &ExtensionRegistry,
    ) -> Result<()>;
}

/// Memoized serialized size of a record.
///
/// `-1` means not yet computed. Records are immutable once built, so the
/// value never needs invalidating; clones start over. Ignored by equality
/// and hashing.
#[derive(Debug)]
pub struct CachedSize {
    size: AtomicI64,
}

impl CachedSize {
    /// An empty cache.
    pub const fn new() -> Self {
        Self {
            size: AtomicI64::new(-1),
        }
    }

    /// The cached size, if computed.
    pub fn get(&self) -> Option<usize> {
        let size = self.size.load(Ordering::Relaxed);
        (size >= 0).then_some(size as usize)
    }

    /// Stores a computed size.
    pub fn set(&self, size: usize) {
        self.size.store(size as i64, Ordering::Relaxed);
    }

    /// Forgets the cached size.
    pub fn clear(&self) {
        self.size.store(-1, Ordering::Relaxed);
    }

    /// Returns the cached size, computing and storing it first if needed.
    pub fn get_or_compute(&self, compute: impl FnOnce() -> usize) -> usize {
        match self.get() {
            Some(size) => size,
            None => {
                let size = compute();
                self.set(size);
                size
            }
        }
    }
}

impl Default for CachedSize {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for CachedSize {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl PartialEq for CachedSize {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

impl Eq for CachedSize {}

impl Hash for CachedSize {
    fn hash<H: Hasher>(&self, _state: &mut H) {}
}

/// An immutable record of a schema message type.
///
/// Equality and hashing are structural: has-bits, present values in
/// declaration order, then unknown fields.
pub trait Message:
    MessageWrite + Clone + PartialEq + Eq + Hash + Debug + Send + Sync + Sized + 'static
{
    /// The paired builder.
    type Builder: MessageBuilder<Message = Self>;

    /// Descriptor of the message type.
    fn descriptor() -> Descriptor;

    /// A record with no field set.
    fn default_instance() -> Self;

    /// Memoized size slot of this instance.
    fn cached_size(&self) -> &CachedSize;

    /// Computes the serialized size without consulting the cache.
    fn compute_serialized_size(&self) -> usize;

    /// A builder seeded with this record's contents.
    fn to_builder(&self) -> Self::Builder;

    /// Whether every required field is set, recursively.
    fn is_initialized(&self) -> bool;

    /// Fields seen while parsing that matched nothing.
    fn unknown_fields(&self) -> &UnknownFieldSet;

    /// A fresh builder.
    fn builder() -> Self::Builder {
        Self::Builder::default()
    }

    /// Serialized size, computed once per instance.
    fn memoized_size(&self) -> usize {
        self.cached_size()
            .get_or_compute(|| self.compute_serialized_size())
    }

    /// Parses a record. Required fields are not checked.
    fn parse_from_bytes(data: &[u8]) -> Result<Self> {
        Self::parse_from_bytes_with_registry(data, ExtensionRegistry::empty())
    }

    /// Parses a record, decoding extensions known to `registry`.
    fn parse_from_bytes_with_registry(data: &[u8], registry: &ExtensionRegistry) -> Result<Self> {
        let mut builder = Self::builder();
        builder.merge_from_bytes_with_registry(data, registry)?;
        Ok(builder.build_partial())
    }

    /// Parses a record from a blocking reader.
    fn parse_from_reader(reader: impl Read) -> Result<Self> {
        let mut input = CodedInputStream::from_reader(reader);
        Self::parse_from_coded_stream(&mut input, ExtensionRegistry::empty())
    }

    /// Parses a record from the remaining input of `input`.
    fn parse_from_coded_stream(
        input: &mut CodedInputStream<'_>,
        registry: &ExtensionRegistry,
    ) -> Result<Self> {
        let mut builder = Self::builder();
        builder.merge_from_coded_stream(input, registry)?;
        input.check_last_tag_was(0)?;
        Ok(builder.build_partial())
    }
}

/// The mutable staging type that produces a [`Message`].
///
/// Setters set the field's has-bit; clearers reset the value and the bit.
/// `build` and `build_partial` take the builder by value, so a builder can
/// never be mutated after producing its record.
pub trait MessageBuilder:
    MergeFromCodedStream + Default + Clone + Debug + Send + Sync + Sized + 'static
{
    /// The record type this builder produces.
    type Message: Message<Builder = Self>;

    /// Resets every field and has-bit, and drops unknown fields.
    fn clear(&mut self) -> &mut Self;

    /// Whether every required field is set, recursively.
    fn is_initialized(&self) -> bool;

    /// Merges a built record.
    ///
    /// Singular scalars that are set in `other` overwrite; singular messages
    /// merge recursively when both sides are set; repeated fields concatenate;
    /// unknown fields append.
    fn merge_from(&mut self, other: &Self::Message) -> Result<&mut Self>;

    /// Mutable access to the unknown fields collected so far.
    fn unknown_fields_mut(&mut self) -> &mut UnknownFieldSet;

    /// Detaches the record without checking required fields.
    fn build_partial(self) -> Self::Message;

    /// Appends `unknown` to the builder's unknown fields.
    fn merge_unknown_fields(&mut self, unknown: &UnknownFieldSet) -> Result<&mut Self> {
        self.unknown_fields_mut().merge_from(unknown)?;
        Ok(self)
    }

    /// Merges a serialized record.
    fn merge_from_bytes(&mut self, data: &[u8]) -> Result<&mut Self> {
        self.merge_from_bytes_with_registry(data, ExtensionRegistry::empty())
    }

    /// Merges a serialized record, decoding extensions known to `registry`.
    fn merge_from_bytes_with_registry(
        &mut self,
        data: &[u8],
        registry: &ExtensionRegistry,
    ) -> Result<&mut Self> {
        let mut input = CodedInputStream::from_bytes(data);
        self.merge_from_coded_stream(&mut input, registry)?;
        input.check_last_tag_was(0)?;
        Ok(self)
    }

    /// Checks required fields, then detaches the record.
    fn build(self) -> Result<Self::Message> {
        if !self.is_initialized() {
            return Err(Error::required_field_missing(
                <Self::Message as Message>::descriptor().full_name(),
            ));
        }
        Ok(self.build_partial())
    }
}

/// A generated enum type.
pub trait ProtoEnum: Copy + Debug + PartialEq + Eq + Hash + Send + Sync + 'static {
    /// The value with this number, if declared.
    fn from_i32(value: i32) -> Option<Self>;

    /// Number of this value.
    fn value(self) -> i32;

    /// Descriptor of the enum type.
    fn enum_descriptor() -> EnumDescriptor;

    /// Whether `value` is a declared number.
    fn is_valid_value(value: i32) -> bool {
        Self::from_i32(value).is_some()
    }
}

/// Whether every record in `values` is initialized.
///
/// Skips the walk when the type can never be missing a required field.
pub fn all_initialized<M: Message>(values: ArraySlice<'_>) -> bool {
    if !M::descriptor().has_required_fields() {
        return true;
    }
    match values {
        ArraySlice::Object(objects) => objects.iter().all(|o| {
            o.as_any()
                .downcast_ref::<M>()
                .map_or(false, Message::is_initialized)
        }),
        _ => false,
    }
}

/// Reads one value of `field_type` and appends it to `values`.
pub fn read_scalar_into(
    input: &mut CodedInputStream<'_>,
    field_type: FieldType,
    values: &mut AppendableArray,
) -> Result<()> {
    match field_type {
        FieldType::Double => values.push_double(input.read_double()?),
        FieldType::Float => values.push_float(input.read_float()?),
        FieldType::Int64 => values.push_int64(input.read_int64()?),
        FieldType::SInt64 => values.push_int64(input.read_sint64()?),
        FieldType::SFixed64 => values.push_int64(input.read_sfixed64()?),
        FieldType::UInt64 => values.push_uint64(input.read_uint64()?),
        FieldType::Fixed64 => values.push_uint64(input.read_fixed64()?),
        FieldType::Int32 => values.push_int32(input.read_int32()?),
        FieldType::SInt32 => values.push_int32(input.read_sint32()?),
        FieldType::SFixed32 => values.push_int32(input.read_sfixed32()?),
        FieldType::Enum => values.push_int32(input.read_enum()?),
        FieldType::UInt32 => values.push_uint32(input.read_uint32()?),
        FieldType::Fixed32 => values.push_uint32(input.read_fixed32()?),
        FieldType::Bool => values.push_bool(input.read_bool()?),
        FieldType::String => values.push_object(input.read_string()?),
        FieldType::Bytes => values.push_object(input.read_bytes()?),
        FieldType::Message | FieldType::Group => Err(Error::ArrayTypeMismatch {
            expected: ArrayValueType::Object,
            actual: values.value_type(),
        }),
    }
}

/// Runs `read_one` for a single value, or for every value of a packed run.
fn for_each_wire_value(
    input: &mut CodedInputStream<'_>,
    wire_type: WireType,
    field_type: FieldType,
    mut read_one: impl FnMut(&mut CodedInputStream<'_>) -> Result<()>,
) -> Result<()> {
    if wire_type != WireType::Len || !field_type.is_packable() {
        return read_one(input);
    }
    let length = input.read_length()?;
    let old_limit = input.push_limit(length)?;
    while input.bytes_until_limit().map_or(false, |left| left > 0) {
        read_one(input)?;
    }
    input.pop_limit(old_limit);
    Ok(())
}

/// Reads a repeated scalar field occurrence, packed or not.
///
/// `wire_type` is the wire type of the tag that introduced the value; a
/// length-delimited tag on a packable type starts a packed run.
pub fn read_repeated_scalar(
    input: &mut CodedInputStream<'_>,
    wire_type: WireType,
    field_type: FieldType,
    values: &mut AppendableArray,
) -> Result<()> {
    for_each_wire_value(input, wire_type, field_type, |input| {
        read_scalar_into(input, field_type, values)
    })
}

/// Reads a repeated enum field occurrence, packed or not.
///
/// Numbers rejected by `is_valid` are kept in `unknown` as raw varints.
pub fn read_repeated_enum(
    input: &mut CodedInputStream<'_>,
    wire_type: WireType,
    field_number: u32,
    is_valid: impl Fn(i32) -> bool,
    values: &mut AppendableArray,
    unknown: &mut UnknownFieldSet,
) -> Result<()> {
    for_each_wire_value(input, wire_type, FieldType::Enum, |input| {
        let value = input.read_enum()?;
        if is_valid(value) {
            values.push_int32(value)
        } else {
            unknown.add_varint(field_number, i64::from(value) as u64)
        }
    })
}

/// Reads a singular message or group field into `builder`.
pub fn read_message_field<B>(
    input: &mut CodedInputStream<'_>,
    field_type: FieldType,
    field_number: u32,
    builder: &mut B,
    registry: &ExtensionRegistry,
) -> Result<()>
where
    B: MergeFromCodedStream + ?Sized,
{
    if field_type == FieldType::Group {
        input.read_group(field_number, builder, registry)
    } else {
        input.read_message(builder, registry)
    }
}

/// Reads one element of a repeated message or group field.
pub fn read_repeated_message<M: Message>(
    input: &mut CodedInputStream<'_>,
    field_type: FieldType,
    field_number: u32,
    registry: &ExtensionRegistry,
    values: &mut AppendableArray,
) -> Result<()> {
    let mut builder = M::builder();
    read_message_field(input, field_type, field_number, &mut builder, registry)?;
    values.push_object(builder.build_partial())
}

/// Merges `source` into a singular message field.
///
/// Merges recursively when the field is already present, otherwise takes
/// `source` wholesale.
pub fn merge_message<M: Message>(target: &mut M, present: bool, source: &M) -> Result<()> {
    if present {
        let mut builder = target.to_builder();
        builder.merge_from(source)?;
        *target = builder.build_partial();
    } else {
        *target = source.clone();
    }
    Ok(())
}

fn mismatch(field_type: FieldType, values: &ArraySlice<'_>) -> Error {
    Error::ArrayTypeMismatch {
        expected: field_type.array_value_type(),
        actual: values.value_type(),
    }
}

fn write_element_no_tag(
    out: &mut CodedOutputStream<'_>,
    field_type: FieldType,
    values: &ArraySlice<'_>,
    index: usize,
) -> Result<()> {
    match (field_type, values) {
        (FieldType::Double, ArraySlice::Double(v)) => out.write_double_no_tag(v[index]),
        (FieldType::Float, ArraySlice::Float(v)) => out.write_float_no_tag(v[index]),
        (FieldType::Int64, ArraySlice::Int64(v)) => out.write_int64_no_tag(v[index]),
        (FieldType::SInt64, ArraySlice::Int64(v)) => out.write_sint64_no_tag(v[index]),
        (FieldType::SFixed64, ArraySlice::Int64(v)) => out.write_sfixed64_no_tag(v[index]),
        (FieldType::UInt64, ArraySlice::UInt64(v)) => out.write_uint64_no_tag(v[index]),
        (FieldType::Fixed64, ArraySlice::UInt64(v)) => out.write_fixed64_no_tag(v[index]),
        (FieldType::Int32, ArraySlice::Int32(v)) => out.write_int32_no_tag(v[index]),
        (FieldType::SInt32, ArraySlice::Int32(v)) => out.write_sint32_no_tag(v[index]),
        (FieldType::SFixed32, ArraySlice::Int32(v)) => out.write_sfixed32_no_tag(v[index]),
        (FieldType::Enum, ArraySlice::Int32(v)) => out.write_enum_no_tag(v[index]),
        (FieldType::UInt32, ArraySlice::UInt32(v)) => out.write_uint32_no_tag(v[index]),
        (FieldType::Fixed32, ArraySlice::UInt32(v)) => out.write_fixed32_no_tag(v[index]),
        (FieldType::Bool, ArraySlice::Bool(v)) => out.write_bool_no_tag(v[index]),
        (FieldType::String, ArraySlice::Object(v)) => match v[index].as_any().downcast_ref::<String>() {
            Some(s) => out.write_string_no_tag(s),
            None => Err(mismatch(field_type, values)),
        },
        (FieldType::Bytes, ArraySlice::Object(v)) => match v[index].as_any().downcast_ref::<Bytes>() {
            Some(b) => out.write_bytes_no_tag(b),
            None => Err(mismatch(field_type, values)),
        },
        _ => Err(mismatch(field_type, values)),
    }
}

fn element_size_no_tag(field_type: FieldType, values: &ArraySlice<'_>, index: usize) -> usize {
    match (field_type, values) {
        (FieldType::Double, ArraySlice::Double(_))
        | (FieldType::Fixed64, ArraySlice::UInt64(_))
        | (FieldType::SFixed64, ArraySlice::Int64(_)) => 8,
        (FieldType::Float, ArraySlice::Float(_))
        | (FieldType::Fixed32, ArraySlice::UInt32(_))
        | (FieldType::SFixed32, ArraySlice::Int32(_)) => 4,
        (FieldType::Bool, ArraySlice::Bool(_)) => 1,
        (FieldType::Int64, ArraySlice::Int64(v)) => size::int64_size_no_tag(v[index]),
        (FieldType::SInt64, ArraySlice::Int64(v)) => size::sint64_size_no_tag(v[index]),
        (FieldType::UInt64, ArraySlice::UInt64(v)) => size::uint64_size_no_tag(v[index]),
        (FieldType::Int32 | FieldType::Enum, ArraySlice::Int32(v)) => {
            size::int32_size_no_tag(v[index])
        }
        (FieldType::SInt32, ArraySlice::Int32(v)) => size::sint32_size_no_tag(v[index]),
        (FieldType::UInt32, ArraySlice::UInt32(v)) => size::uint32_size_no_tag(v[index]),
        (FieldType::String, ArraySlice::Object(v)) => v[index]
            .as_any()
            .downcast_ref::<String>()
            .map_or(0, |s| size::string_size_no_tag(s)),
        (FieldType::Bytes, ArraySlice::Object(v)) => v[index]
            .as_any()
            .downcast_ref::<Bytes>()
            .map_or(0, |b| size::bytes_size_no_tag(b)),
        _ => 0,
    }
}

/// Size of the payload of a packed run, without tag or length prefix.
pub fn packed_data_size(field_type: FieldType, values: ArraySlice<'_>) -> usize {
    (0..values.len())
        .map(|i| element_size_no_tag(field_type, &values, i))
        .sum()
}

/// Writes a repeated scalar field; nothing is written for an empty array.
///
/// String and bytes fields are never packed.
pub fn write_repeated_scalar(
    out: &mut CodedOutputStream<'_>,
    field_number: u32,
    field_type: FieldType,
    packed: bool,
    values: ArraySlice<'_>,
) -> Result<()> {
    if values.is_empty() {
        return Ok(());
    }
    if values.value_type() != field_type.array_value_type() {
        return Err(mismatch(field_type, &values));
    }
    if packed && field_type.is_packable() {
        out.write_tag(field_number, WireType::Len)?;
        out.write_raw_varint64(packed_data_size(field_type, values) as u64)?;
        for i in 0..values.len() {
            write_element_no_tag(out, field_type, &values, i)?;
        }
    } else {
        for i in 0..values.len() {
            out.write_tag(field_number, field_type.wire_type())?;
            write_element_no_tag(out, field_type, &values, i)?;
        }
    }
    Ok(())
}

/// Exact size of what [`write_repeated_scalar`] writes.
pub fn repeated_scalar_size(
    field_number: u32,
    field_type: FieldType,
    packed: bool,
    values: ArraySlice<'_>,
) -> usize {
    if values.is_empty() {
        return 0;
    }
    let data = packed_data_size(field_type, values);
    if packed && field_type.is_packable() {
        size::tag_size(field_number) + size::raw_varint64_size(data as u64) + data
    } else {
        size::tag_size(field_number) * values.len() + data
    }
}

fn message_elements<'a, M: ArrayObject>(values: &ArraySlice<'a>) -> Result<Vec<&'a M>> {
    match *values {
        ArraySlice::Object(objects) => objects
            .iter()
            .map(|o| {
                o.as_any()
                    .downcast_ref::<M>()
                    .ok_or(Error::ArrayTypeMismatch {
                        expected: ArrayValueType::Object,
                        actual: ArrayValueType::Object,
                    })
            })
            .collect(),
        other => Err(Error::ArrayTypeMismatch {
            expected: ArrayValueType::Object,
            actual: other.value_type(),
        }),
    }
}

/// Writes a repeated message or group field whose elements are `M`.
pub fn write_repeated_message<M: MessageWrite + ArrayObject>(
    out: &mut CodedOutputStream<'_>,
    field_number: u32,
    field_type: FieldType,
    values: ArraySlice<'_>,
) -> Result<()> {
    for message in message_elements::<M>(&values)? {
        if field_type == FieldType::Group {
            out.write_group(field_number, message)?;
        } else {
            out.write_message(field_number, message)?;
        }
    }
    Ok(())
}

/// Exact size of what [`write_repeated_message`] writes.
pub fn repeated_message_size<M: MessageWrite + ArrayObject>(
    field_number: u32,
    field_type: FieldType,
    values: ArraySlice<'_>,
) -> usize {
    message_elements::<M>(&values).map_or(0, |messages| {
        messages
            .into_iter()
            .map(|m| {
                if field_type == FieldType::Group {
                    size::group_size(field_number, m)
                } else {
                    size::message_size(field_number, m)
                }
            })
            .sum()
    })
}
