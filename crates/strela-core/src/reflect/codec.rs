//! Wire encoding of descriptor-typed values.
//!
//! [`FieldMap`] holds the present fields of a dynamic record (or the
//! extensions of any record) keyed by number, and knows how to read, write,
//! size and merge them using only their [`FieldDescriptor`]s.

use super::{DynamicMessage, Value};
use crate::array::{AppendableArray, ArrayObject, ArraySlice};
use crate::descriptor::{FieldDescriptor, Syntax};
use crate::error::{Error, Result};
use crate::extension::ExtensionRegistry;
use crate::io::{CodedInputStream, CodedOutputStream};
use crate::message;
use crate::unknown::UnknownFieldSet;
use crate::wire::{size, tag_wire_type, FieldType, WireType};
use std::collections::BTreeMap;

/// Stored value of one present field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum FieldValue {
    Singular(Value),
    Repeated(AppendableArray),
}

impl FieldValue {
    pub(crate) fn to_value(&self) -> Value {
        match self {
            FieldValue::Singular(value) => value.clone(),
            FieldValue::Repeated(values) => Value::List(values.to_array()),
        }
    }

    fn is_initialized(&self) -> bool {
        match self {
            FieldValue::Singular(Value::Message(message)) => message.is_initialized(),
            FieldValue::Singular(_) => true,
            FieldValue::Repeated(values) => match values.as_slice() {
                ArraySlice::Object(objects) => objects.iter().all(|o| {
                    o.as_any()
                        .downcast_ref::<DynamicMessage>()
                        .map_or(true, DynamicMessage::is_initialized)
                }),
                _ => true,
            },
        }
    }
}

/// Present fields keyed by number, each with the descriptor it was set through.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub(crate) struct FieldMap {
    entries: BTreeMap<u32, (FieldDescriptor, FieldValue)>,
}

impl FieldMap {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&FieldDescriptor, &FieldValue)> {
        self.entries.values().map(|(field, value)| (field, value))
    }

    fn entry(&self, field: &FieldDescriptor) -> Option<&FieldValue> {
        self.entries
            .get(&field.number())
            .filter(|(stored, _)| stored == field)
            .map(|(_, value)| value)
    }

    pub(crate) fn has(&self, field: &FieldDescriptor) -> bool {
        match self.entry(field) {
            Some(FieldValue::Repeated(values)) => !values.is_empty(),
            Some(FieldValue::Singular(_)) => true,
            None => false,
        }
    }

    /// Current value, or the field's default when absent.
    pub(crate) fn get(&self, field: &FieldDescriptor) -> Value {
        self.entry(field)
            .map_or_else(|| field.default_value(), FieldValue::to_value)
    }

    pub(crate) fn count(&self, field: &FieldDescriptor) -> usize {
        match self.entry(field) {
            Some(FieldValue::Repeated(values)) => values.count(),
            Some(FieldValue::Singular(_)) => 1,
            None => 0,
        }
    }

    pub(crate) fn get_element(&self, field: &FieldDescriptor, index: usize) -> Result<Value> {
        let count = self.count(field);
        let element = match self.entry(field) {
            Some(FieldValue::Repeated(values)) => {
                element_value(field.field_type(), values.as_slice(), index)
            }
            _ => None,
        };
        element.ok_or(Error::ArrayIndexOutOfBounds { index, count })
    }

    pub(crate) fn set(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
        if !value.is_valid_for(field) {
            return Err(mismatch(field));
        }
        let stored = match value {
            Value::List(list) => FieldValue::Repeated(AppendableArray::from_array(&list)),
            other => FieldValue::Singular(other),
        };
        self.entries
            .insert(field.number(), (field.clone(), stored));
        Ok(())
    }

    pub(crate) fn add(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
        if !field.is_repeated() || !value.is_valid_element_for(field) {
            return Err(mismatch(field));
        }
        self.with_slot(field, |slot| push_element(repeated_slot(field, slot)?, value))
    }

    pub(crate) fn clear_field(&mut self, field: &FieldDescriptor) {
        if self.entry(field).is_some() {
            self.entries.remove(&field.number());
        }
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    /// Takes the slot of `field` out of the map for the duration of `f`.
    fn with_slot<T>(
        &mut self,
        field: &FieldDescriptor,
        f: impl FnOnce(&mut Option<FieldValue>) -> Result<T>,
    ) -> Result<T> {
        let mut slot = match self.entries.remove(&field.number()) {
            Some((stored, value)) if &stored == field => Some(value),
            Some(other) => {
                self.entries.insert(field.number(), other);
                return Err(mismatch(field));
            }
            None => None,
        };
        let result = f(&mut slot);
        if let Some(value) = slot {
            self.entries
                .insert(field.number(), (field.clone(), value));
        }
        result
    }

    /// Reads the value introduced by `tag` into `field`.
    ///
    /// Returns false without consuming anything when the wire type does not
    /// fit the field; the caller then keeps the value as unknown.
    pub(crate) fn merge_field(
        &mut self,
        input: &mut CodedInputStream<'_>,
        tag: u32,
        field: &FieldDescriptor,
        registry: &ExtensionRegistry,
        unknown: &mut UnknownFieldSet,
    ) -> Result<bool> {
        let wire_type = tag_wire_type(tag)?;
        let field_type = field.field_type();
        let packed_run =
            field.is_repeated() && wire_type == WireType::Len && field_type.is_packable();
        if wire_type != field_type.wire_type() && !packed_run {
            return Ok(false);
        }
        self.with_slot(field, |slot| {
            read_field(input, wire_type, field, slot, registry, unknown)
        })?;
        Ok(true)
    }

    /// Merges every field of `other` into this map.
    ///
    /// Singular scalars are overwritten, singular messages merge
    /// recursively, repeated fields are concatenated.
    pub(crate) fn merge_from(&mut self, other: &FieldMap) -> Result<()> {
        for (field, source) in other.iter() {
            self.with_slot(field, |slot| merge_value(field, slot, source))?;
        }
        Ok(())
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.iter().all(|(_, value)| value.is_initialized())
    }

    pub(crate) fn write_to(&self, out: &mut CodedOutputStream<'_>) -> Result<()> {
        for (field, value) in self.iter() {
            write_field(out, field, value)?;
        }
        Ok(())
    }

    pub(crate) fn serialized_size(&self) -> usize {
        self.iter().map(|(field, value)| field_size(field, value)).sum()
    }
}

fn mismatch(field: &FieldDescriptor) -> Error {
    let kind = field.field_type().as_str();
    let expected = if field.is_repeated() {
        format!("a list of {}", kind)
    } else {
        kind.to_string()
    };
    Error::value_type_mismatch(field.full_name(), expected)
}

fn repeated_slot<'a>(
    field: &FieldDescriptor,
    slot: &'a mut Option<FieldValue>,
) -> Result<&'a mut AppendableArray> {
    let value_type = field.field_type().array_value_type();
    match slot.get_or_insert_with(|| FieldValue::Repeated(AppendableArray::new(value_type))) {
        FieldValue::Repeated(values) => Ok(values),
        FieldValue::Singular(_) => Err(mismatch(field)),
    }
}

fn push_element(values: &mut AppendableArray, value: Value) -> Result<()> {
    match value {
        Value::Bool(v) => values.push_bool(v),
        Value::I32(v) | Value::EnumNumber(v) => values.push_int32(v),
        Value::I64(v) => values.push_int64(v),
        Value::U32(v) => values.push_uint32(v),
        Value::U64(v) => values.push_uint64(v),
        Value::F32(v) => values.push_float(v),
        Value::F64(v) => values.push_double(v),
        Value::String(v) => values.push_object(v),
        Value::Bytes(v) => values.push_object(v),
        Value::Message(v) => values.push_object(v),
        Value::List(list) => values.append_array(&list),
    }
}

/// Element `index` of a stored array as a [`Value`].
pub(crate) fn element_value(
    field_type: FieldType,
    values: ArraySlice<'_>,
    index: usize,
) -> Option<Value> {
    match values {
        ArraySlice::Bool(v) => v.get(index).map(|&b| Value::Bool(b)),
        ArraySlice::Int32(v) if field_type == FieldType::Enum => {
            v.get(index).map(|&n| Value::EnumNumber(n))
        }
        ArraySlice::Int32(v) => v.get(index).map(|&n| Value::I32(n)),
        ArraySlice::UInt32(v) => v.get(index).map(|&n| Value::U32(n)),
        ArraySlice::Int64(v) => v.get(index).map(|&n| Value::I64(n)),
        ArraySlice::UInt64(v) => v.get(index).map(|&n| Value::U64(n)),
        ArraySlice::Float(v) => v.get(index).map(|&n| Value::F32(n)),
        ArraySlice::Double(v) => v.get(index).map(|&n| Value::F64(n)),
        ArraySlice::Object(v) => object_value(v.get(index)?.as_ref()),
    }
}

fn object_value(object: &dyn ArrayObject) -> Option<Value> {
    let any = object.as_any();
    if let Some(s) = any.downcast_ref::<String>() {
        Some(Value::String(s.clone()))
    } else if let Some(b) = any.downcast_ref::<bytes::Bytes>() {
        Some(Value::Bytes(b.clone()))
    } else {
        any.downcast_ref::<DynamicMessage>()
            .map(|m| Value::Message(m.clone()))
    }
}

/// Closed enums reject undeclared numbers; proto3 enums accept any.
fn accepts_enum_value(field: &FieldDescriptor, value: i32) -> bool {
    field.enum_type().map_or(true, |enum_type| {
        enum_type.file().syntax() == Syntax::Proto3 || enum_type.is_valid_value(value)
    })
}

fn read_message_value(
    input: &mut CodedInputStream<'_>,
    field: &FieldDescriptor,
    registry: &ExtensionRegistry,
) -> Result<DynamicMessage> {
    let message_type = field
        .message_type()
        .ok_or_else(|| Error::unresolved_type(field.type_name(), field.full_name()))?;
    let mut message = DynamicMessage::new(message_type);
    message::read_message_field(
        input,
        field.field_type(),
        field.number(),
        &mut message,
        registry,
    )?;
    Ok(message)
}

fn read_scalar(input: &mut CodedInputStream<'_>, field: &FieldDescriptor) -> Result<Value> {
    Ok(match field.field_type() {
        FieldType::Double => Value::F64(input.read_double()?),
        FieldType::Float => Value::F32(input.read_float()?),
        FieldType::Int64 => Value::I64(input.read_int64()?),
        FieldType::SInt64 => Value::I64(input.read_sint64()?),
        FieldType::SFixed64 => Value::I64(input.read_sfixed64()?),
        FieldType::UInt64 => Value::U64(input.read_uint64()?),
        FieldType::Fixed64 => Value::U64(input.read_fixed64()?),
        FieldType::Int32 => Value::I32(input.read_int32()?),
        FieldType::SInt32 => Value::I32(input.read_sint32()?),
        FieldType::SFixed32 => Value::I32(input.read_sfixed32()?),
        FieldType::UInt32 => Value::U32(input.read_uint32()?),
        FieldType::Fixed32 => Value::U32(input.read_fixed32()?),
        FieldType::Bool => Value::Bool(input.read_bool()?),
        FieldType::Enum => Value::EnumNumber(input.read_enum()?),
        FieldType::String => Value::String(input.read_string()?),
        FieldType::Bytes => Value::Bytes(input.read_bytes()?),
        FieldType::Message | FieldType::Group => return Err(mismatch(field)),
    })
}

fn read_field(
    input: &mut CodedInputStream<'_>,
    wire_type: WireType,
    field: &FieldDescriptor,
    slot: &mut Option<FieldValue>,
    registry: &ExtensionRegistry,
    unknown: &mut UnknownFieldSet,
) -> Result<()> {
    let field_type = field.field_type();
    let number = field.number();

    if field.is_repeated() {
        let values = repeated_slot(field, slot)?;
        return match field_type {
            FieldType::Enum => message::read_repeated_enum(
                input,
                wire_type,
                number,
                |v| accepts_enum_value(field, v),
                values,
                unknown,
            ),
            FieldType::Message | FieldType::Group => {
                values.push_object(read_message_value(input, field, registry)?)
            }
            _ => message::read_repeated_scalar(input, wire_type, field_type, values),
        };
    }

    match field_type {
        FieldType::Message | FieldType::Group => match slot {
            Some(FieldValue::Singular(Value::Message(existing))) => {
                message::read_message_field(input, field_type, number, existing, registry)?;
            }
            _ => {
                let message = read_message_value(input, field, registry)?;
                *slot = Some(FieldValue::Singular(Value::Message(message)));
            }
        },
        FieldType::Enum => {
            let value = input.read_enum()?;
            if accepts_enum_value(field, value) {
                *slot = Some(FieldValue::Singular(Value::EnumNumber(value)));
            } else {
                unknown.add_varint(number, i64::from(value) as u64)?;
            }
        }
        _ => *slot = Some(FieldValue::Singular(read_scalar(input, field)?)),
    }
    Ok(())
}

fn merge_value(
    field: &FieldDescriptor,
    slot: &mut Option<FieldValue>,
    source: &FieldValue,
) -> Result<()> {
    if let FieldValue::Repeated(values) = source {
        return repeated_slot(field, slot)?.append(values);
    }
    if let (
        Some(FieldValue::Singular(Value::Message(existing))),
        FieldValue::Singular(Value::Message(incoming)),
    ) = (slot.as_mut(), source)
    {
        return existing.merge_from(incoming);
    }
    *slot = Some(source.clone());
    Ok(())
}

fn write_value(out: &mut CodedOutputStream<'_>, field: &FieldDescriptor, value: &Value) -> Result<()> {
    let n = field.number();
    match (field.field_type(), value) {
        (FieldType::Double, Value::F64(v)) => out.write_double(n, *v),
        (FieldType::Float, Value::F32(v)) => out.write_float(n, *v),
        (FieldType::Int64, Value::I64(v)) => out.write_int64(n, *v),
        (FieldType::SInt64, Value::I64(v)) => out.write_sint64(n, *v),
        (FieldType::SFixed64, Value::I64(v)) => out.write_sfixed64(n, *v),
        (FieldType::UInt64, Value::U64(v)) => out.write_uint64(n, *v),
        (FieldType::Fixed64, Value::U64(v)) => out.write_fixed64(n, *v),
        (FieldType::Int32, Value::I32(v)) => out.write_int32(n, *v),
        (FieldType::SInt32, Value::I32(v)) => out.write_sint32(n, *v),
        (FieldType::SFixed32, Value::I32(v)) => out.write_sfixed32(n, *v),
        (FieldType::UInt32, Value::U32(v)) => out.write_uint32(n, *v),
        (FieldType::Fixed32, Value::U32(v)) => out.write_fixed32(n, *v),
        (FieldType::Bool, Value::Bool(v)) => out.write_bool(n, *v),
        (FieldType::Enum, Value::EnumNumber(v)) => out.write_enum(n, *v),
        (FieldType::String, Value::String(v)) => out.write_string(n, v),
        (FieldType::Bytes, Value::Bytes(v)) => out.write_bytes(n, v),
        (FieldType::Message, Value::Message(v)) => out.write_message(n, v),
        (FieldType::Group, Value::Message(v)) => out.write_group(n, v),
        _ => Err(mismatch(field)),
    }
}

fn value_size(field: &FieldDescriptor, value: &Value) -> usize {
    let n = field.number();
    match (field.field_type(), value) {
        (FieldType::Double, Value::F64(v)) => size::double_size(n, *v),
        (FieldType::Float, Value::F32(v)) => size::float_size(n, *v),
        (FieldType::Int64, Value::I64(v)) => size::int64_size(n, *v),
        (FieldType::SInt64, Value::I64(v)) => size::sint64_size(n, *v),
        (FieldType::SFixed64, Value::I64(v)) => size::sfixed64_size(n, *v),
        (FieldType::UInt64, Value::U64(v)) => size::uint64_size(n, *v),
        (FieldType::Fixed64, Value::U64(v)) => size::fixed64_size(n, *v),
        (FieldType::Int32, Value::I32(v)) => size::int32_size(n, *v),
        (FieldType::SInt32, Value::I32(v)) => size::sint32_size(n, *v),
        (FieldType::SFixed32, Value::I32(v)) => size::sfixed32_size(n, *v),
        (FieldType::UInt32, Value::U32(v)) => size::uint32_size(n, *v),
        (FieldType::Fixed32, Value::U32(v)) => size::fixed32_size(n, *v),
        (FieldType::Bool, Value::Bool(v)) => size::bool_size(n, *v),
        (FieldType::Enum, Value::EnumNumber(v)) => size::enum_size(n, *v),
        (FieldType::String, Value::String(v)) => size::string_size(n, v),
        (FieldType::Bytes, Value::Bytes(v)) => size::bytes_size(n, v),
        (FieldType::Message, Value::Message(v)) => size::message_size(n, v),
        (FieldType::Group, Value::Message(v)) => size::group_size(n, v),
        _ => 0,
    }
}

/// Writes one present field: every element of a repeated one.
pub(crate) fn write_field(
    out: &mut CodedOutputStream<'_>,
    field: &FieldDescriptor,
    value: &FieldValue,
) -> Result<()> {
    match value {
        FieldValue::Singular(value) => write_value(out, field, value),
        FieldValue::Repeated(values) if field.is_message() => {
            message::write_repeated_message::<DynamicMessage>(
                out,
                field.number(),
                field.field_type(),
                values.as_slice(),
            )
        }
        FieldValue::Repeated(values) => message::write_repeated_scalar(
            out,
            field.number(),
            field.field_type(),
            field.is_packed(),
            values.as_slice(),
        ),
    }
}

/// Exact size of what [`write_field`] writes.
pub(crate) fn field_size(field: &FieldDescriptor, value: &FieldValue) -> usize {
    match value {
        FieldValue::Singular(value) => value_size(field, value),
        FieldValue::Repeated(values) if field.is_message() => {
            message::repeated_message_size::<DynamicMessage>(
                field.number(),
                field.field_type(),
                values.as_slice(),
            )
        }
        FieldValue::Repeated(values) => message::repeated_scalar_size(
            field.number(),
            field.field_type(),
            field.is_packed(),
            values.as_slice(),
        ),
    }
}
