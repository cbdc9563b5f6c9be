//! Field and extension descriptors.

use super::enums::EnumDescriptor;
use super::file::{FileDescriptor, FileInner};
use super::message::Descriptor;
use crate::array::PbArray;
use crate::error::{Error, Result};
use crate::reflect::{DynamicMessage, Value};
use crate::wire::{FieldType, WireType};
use bytes::Bytes;
use std::fmt;

/// Cardinality of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Zero or one value, with explicit presence
    Optional,
    /// Exactly one value; checked by `build()`
    Required,
    /// Any number of values
    Repeated,
}

/// A reference from one descriptor to a type in the same or another file.
#[derive(Clone)]
pub(crate) enum Target {
    Local(usize),
    Foreign(FileDescriptor, usize),
}

impl Target {
    fn file_and_index(&self, local: &FileDescriptor) -> (FileDescriptor, usize) {
        match self {
            Target::Local(i) => (local.clone(), *i),
            Target::Foreign(file, i) => (file.clone(), *i),
        }
    }
}

pub(crate) struct FieldData {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) number: u32,
    pub(crate) label: Label,
    pub(crate) declared_type: Option<FieldType>,
    pub(crate) type_name: String,
    pub(crate) extendee_name: String,
    pub(crate) json_name: Option<String>,
    pub(crate) default_literal: Option<String>,
    pub(crate) packed: bool,
    pub(crate) parent: Option<usize>,
    pub(crate) index_in_parent: usize,
    pub(crate) is_extension: bool,
    pub(crate) field_type: FieldType,
    pub(crate) target: Option<Target>,
    pub(crate) extendee: Option<Target>,
    pub(crate) default: Option<Value>,
}

/// Describes a field of a message type, or an extension.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    file: FileDescriptor,
    index: usize,
}

impl fmt::Debug for FieldDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("full_name", &self.full_name())
            .field("number", &self.number())
            .finish()
    }
}

impl FieldDescriptor {
    pub(crate) fn new(file: FileDescriptor, index: usize) -> Self {
        Self { file, index }
    }

    fn inner(&self) -> &FileInner {
        &self.file.inner
    }

    fn data(&self) -> &FieldData {
        &self.inner().fields[self.index]
    }

    /// Simple name as declared.
    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// Fully-qualified name.
    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    /// Field number.
    pub fn number(&self) -> u32 {
        self.data().number
    }

    /// Position among the fields (or extensions) of its declaring scope.
    pub fn index(&self) -> usize {
        self.data().index_in_parent
    }

    /// Cardinality.
    pub fn label(&self) -> Label {
        self.data().label
    }

    /// Whether the field is `required`.
    pub fn is_required(&self) -> bool {
        self.label() == Label::Required
    }

    /// Whether the field is `repeated`.
    pub fn is_repeated(&self) -> bool {
        self.label() == Label::Repeated
    }

    /// Whether the field is `optional`.
    pub fn is_optional(&self) -> bool {
        self.label() == Label::Optional
    }

    /// Declared type, with message/enum references resolved.
    pub fn field_type(&self) -> FieldType {
        self.data().field_type
    }

    /// Wire type of one unpacked value.
    pub fn wire_type(&self) -> WireType {
        self.field_type().wire_type()
    }

    /// Whether values are message records (embedded or group).
    pub fn is_message(&self) -> bool {
        matches!(self.field_type(), FieldType::Message | FieldType::Group)
    }

    /// Whether repeated values are written in packed form.
    pub fn is_packed(&self) -> bool {
        self.data().packed
    }

    /// Whether the type admits packed encoding.
    pub fn is_packable(&self) -> bool {
        self.is_repeated() && self.field_type().is_packable()
    }

    /// Whether this is an extension rather than a declared field.
    pub fn is_extension(&self) -> bool {
        self.data().is_extension
    }

    /// Type name exactly as written in the schema.
    pub fn type_name(&self) -> &str {
        &self.data().type_name
    }

    /// JSON name; falls back to the lowerCamelCase form of the name.
    pub fn json_name(&self) -> String {
        match &self.data().json_name {
            Some(name) => name.clone(),
            None => to_lower_camel_case(self.name()),
        }
    }

    /// Whether the schema declares an explicit default.
    pub fn has_default_value(&self) -> bool {
        self.data().default_literal.is_some()
    }

    /// Default value of the field.
    ///
    /// Repeated fields default to an empty list; message fields default to
    /// an empty record of their type.
    pub fn default_value(&self) -> Value {
        if self.is_repeated() {
            return Value::List(PbArray::empty(self.field_type().array_value_type()));
        }
        if let Some(message_type) = self.message_type() {
            return Value::Message(DynamicMessage::new(message_type));
        }
        match &self.data().default {
            Some(value) => value.clone(),
            None => Value::zero_for(self.field_type()),
        }
    }

    /// Message type of a message or group field.
    pub fn message_type(&self) -> Option<Descriptor> {
        if !self.is_message() {
            return None;
        }
        let (file, index) = self.data().target.as_ref()?.file_and_index(&self.file);
        Some(Descriptor::new(file, index))
    }

    /// Enum type of an enum field.
    pub fn enum_type(&self) -> Option<EnumDescriptor> {
        if self.field_type() != FieldType::Enum {
            return None;
        }
        let (file, index) = self.data().target.as_ref()?.file_and_index(&self.file);
        Some(EnumDescriptor::new(file, index))
    }

    /// Type this field belongs to; for extensions, the extended type.
    pub fn containing_type(&self) -> Option<Descriptor> {
        let data = self.data();
        if data.is_extension {
            let (file, index) = data.extendee.as_ref()?.file_and_index(&self.file);
            Some(Descriptor::new(file, index))
        } else {
            data.parent.map(|p| Descriptor::new(self.file.clone(), p))
        }
    }

    /// Message an extension is declared inside, if any.
    pub fn extension_scope(&self) -> Option<Descriptor> {
        let data = self.data();
        if !data.is_extension {
            return None;
        }
        data.parent.map(|p| Descriptor::new(self.file.clone(), p))
    }

    /// File that declares this field.
    pub fn file(&self) -> &FileDescriptor {
        &self.file
    }
}

/// Parses the schema spelling of a scalar default.
pub(crate) fn parse_default(field: &str, field_type: FieldType, literal: Option<&str>) -> Result<Value> {
    let Some(literal) = literal else {
        return Ok(Value::zero_for(field_type));
    };
    let invalid = || Error::InvalidDefaultValue {
        field: field.to_string(),
        value: literal.to_string(),
    };

    Ok(match field_type {
        FieldType::Double => Value::F64(parse_float(literal).ok_or_else(invalid)?),
        FieldType::Float => Value::F32(parse_float(literal).ok_or_else(invalid)? as f32),
        FieldType::Int64 | FieldType::SInt64 | FieldType::SFixed64 => {
            Value::I64(literal.parse().map_err(|_| invalid())?)
        }
        FieldType::UInt64 | FieldType::Fixed64 => {
            Value::U64(literal.parse().map_err(|_| invalid())?)
        }
        FieldType::Int32 | FieldType::SInt32 | FieldType::SFixed32 => {
            Value::I32(literal.parse().map_err(|_| invalid())?)
        }
        FieldType::UInt32 | FieldType::Fixed32 => {
            Value::U32(literal.parse().map_err(|_| invalid())?)
        }
        FieldType::Bool => match literal {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => return Err(invalid()),
        },
        FieldType::String => Value::String(literal.to_string()),
        FieldType::Bytes => Value::Bytes(Bytes::from(unescape_bytes(literal).ok_or_else(invalid)?)),
        FieldType::Enum | FieldType::Message | FieldType::Group => return Err(invalid()),
    })
}

fn parse_float(literal: &str) -> Option<f64> {
    match literal {
        "inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => literal.parse().ok(),
    }
}

/// Reverses the C-style escaping used for `bytes` defaults.
fn unescape_bytes(literal: &str) -> Option<Vec<u8>> {
    let bytes = literal.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }
        let escape = *bytes.get(i + 1)?;
        i += 2;
        match escape {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'\\' | b'\'' | b'"' | b'?' => out.push(escape),
            b'x' => {
                let digits = bytes[i..]
                    .iter()
                    .take(2)
                    .take_while(|b| b.is_ascii_hexdigit())
                    .count();
                let text = std::str::from_utf8(&bytes[i..i + digits]).ok()?;
                out.push(u8::from_str_radix(text, 16).ok()?);
                i += digits;
            }
            b'0'..=b'7' => {
                let start = i - 1;
                let digits = bytes[start..]
                    .iter()
                    .take(3)
                    .take_while(|b| matches!(**b, b'0'..=b'7'))
                    .count();
                let text = std::str::from_utf8(&bytes[start..start + digits]).ok()?;
                out.push(u8::from_str_radix(text, 8).ok()?);
                i = start + digits;
            }
            _ => return None,
        }
    }
    Some(out)
}

/// Convert a snake_case name to lowerCamelCase
pub(crate) fn to_lower_camel_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut capitalize_next = false;

    for c in s.chars() {
        if c == '_' {
            capitalize_next = true;
        } else if capitalize_next {
            result.push(c.to_ascii_uppercase());
            capitalize_next = false;
        } else {
            result.push(c);
        }
    }

    result
}
