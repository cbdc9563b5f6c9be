//! Descriptor-driven access to records.
//!
//! [`DynamicMessage`] implements the whole record contract (parse, merge,
//! serialize, required-field check) from a [`Descriptor`](crate::descriptor::Descriptor)
//! alone. It backs message-typed extensions and any tool that handles
//! payloads without generated types. [`Value`] is the currency of its
//! accessors.

mod codec;
mod dynamic;
mod text;

pub(crate) use codec::FieldMap;
pub use dynamic::DynamicMessage;
pub use text::{escape_bytes, escape_string, TextFormatConfig, TextPrinter};

use crate::array::{ArrayValueType, PbArray};
use crate::descriptor::FieldDescriptor;
use crate::wire::FieldType;
use bytes::Bytes;
use std::hash::{Hash, Hasher};

/// A field value.
///
/// Floating-point values compare and hash by bit pattern, so `NaN` equals
/// itself and `0.0` differs from `-0.0`, matching their wire encodings.
#[derive(Debug, Clone)]
pub enum Value {
    /// bool
    Bool(bool),
    /// int32, sint32, sfixed32
    I32(i32),
    /// int64, sint64, sfixed64
    I64(i64),
    /// uint32, fixed32
    U32(u32),
    /// uint64, fixed64
    U64(u64),
    /// float
    F32(f32),
    /// double
    F64(f64),
    /// Number of an enum value
    EnumNumber(i32),
    /// string
    String(String),
    /// bytes
    Bytes(Bytes),
    /// An embedded message or group
    Message(DynamicMessage),
    /// All values of a repeated field
    List(PbArray),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a.to_bits() == b.to_bits(),
            (Value::F64(a), Value::F64(b)) => a.to_bits() == b.to_bits(),
            (Value::EnumNumber(a), Value::EnumNumber(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bytes(a), Value::Bytes(b)) => a == b,
            (Value::Message(a), Value::Message(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Bool(v) => v.hash(state),
            Value::I32(v) | Value::EnumNumber(v) => v.hash(state),
            Value::I64(v) => v.hash(state),
            Value::U32(v) => v.hash(state),
            Value::U64(v) => v.hash(state),
            Value::F32(v) => v.to_bits().hash(state),
            Value::F64(v) => v.to_bits().hash(state),
            Value::String(v) => v.hash(state),
            Value::Bytes(v) => v.hash(state),
            Value::Message(v) => v.hash(state),
            Value::List(v) => v.hash(state),
        }
    }
}

impl Value {
    /// The zero value of a scalar type.
    ///
    /// Message types have no scalar zero; they map to empty bytes, which no
    /// linked message field ever reports.
    pub fn zero_for(field_type: FieldType) -> Value {
        match field_type {
            FieldType::Double => Value::F64(0.0),
            FieldType::Float => Value::F32(0.0),
            FieldType::Int64 | FieldType::SInt64 | FieldType::SFixed64 => Value::I64(0),
            FieldType::UInt64 | FieldType::Fixed64 => Value::U64(0),
            FieldType::Int32 | FieldType::SInt32 | FieldType::SFixed32 => Value::I32(0),
            FieldType::UInt32 | FieldType::Fixed32 => Value::U32(0),
            FieldType::Bool => Value::Bool(false),
            FieldType::Enum => Value::EnumNumber(0),
            FieldType::String => Value::String(String::new()),
            FieldType::Bytes | FieldType::Message | FieldType::Group => Value::Bytes(Bytes::new()),
        }
    }

    /// Whether this value can be stored as one element of `field`.
    ///
    /// Ignores the label: a [`Value::List`] is never a valid element.
    pub fn is_valid_element_for(&self, field: &FieldDescriptor) -> bool {
        match (field.field_type(), self) {
            (FieldType::Double, Value::F64(_))
            | (FieldType::Float, Value::F32(_))
            | (FieldType::Int64 | FieldType::SInt64 | FieldType::SFixed64, Value::I64(_))
            | (FieldType::UInt64 | FieldType::Fixed64, Value::U64(_))
            | (FieldType::Int32 | FieldType::SInt32 | FieldType::SFixed32, Value::I32(_))
            | (FieldType::UInt32 | FieldType::Fixed32, Value::U32(_))
            | (FieldType::Bool, Value::Bool(_))
            | (FieldType::Enum, Value::EnumNumber(_))
            | (FieldType::String, Value::String(_))
            | (FieldType::Bytes, Value::Bytes(_)) => true,
            (FieldType::Message | FieldType::Group, Value::Message(message)) => field
                .message_type()
                .map_or(false, |expected| &expected == message.descriptor()),
            _ => false,
        }
    }

    /// Whether this value can be assigned to `field` as a whole.
    pub fn is_valid_for(&self, field: &FieldDescriptor) -> bool {
        if !field.is_repeated() {
            return self.is_valid_element_for(field);
        }
        let Value::List(list) = self else {
            return false;
        };
        let field_type = field.field_type();
        if list.value_type() != field_type.array_value_type() {
            return false;
        }
        if list.value_type() != ArrayValueType::Object {
            return true;
        }
        match field_type {
            FieldType::String => list.objects_as::<String>().is_ok(),
            FieldType::Bytes => list.objects_as::<Bytes>().is_ok(),
            _ => list.objects_as::<DynamicMessage>().map_or(false, |messages| {
                messages
                    .iter()
                    .all(|m| field.message_type().as_ref() == Some(m.descriptor()))
            }),
        }
    }

    /// The bool, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(v) => Some(v),
            _ => None,
        }
    }

    /// The `i32`, if this is one.
    pub fn as_i32(&self) -> Option<i32> {
        match *self {
            Value::I32(v) => Some(v),
            _ => None,
        }
    }

    /// The `i64`, if this is one.
    pub fn as_i64(&self) -> Option<i64> {
        match *self {
            Value::I64(v) => Some(v),
            _ => None,
        }
    }

    /// The `u32`, if this is one.
    pub fn as_u32(&self) -> Option<u32> {
        match *self {
            Value::U32(v) => Some(v),
            _ => None,
        }
    }

    /// The `u64`, if this is one.
    pub fn as_u64(&self) -> Option<u64> {
        match *self {
            Value::U64(v) => Some(v),
            _ => None,
        }
    }

    /// The `f32`, if this is one.
    pub fn as_f32(&self) -> Option<f32> {
        match *self {
            Value::F32(v) => Some(v),
            _ => None,
        }
    }

    /// The `f64`, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::F64(v) => Some(v),
            _ => None,
        }
    }

    /// The enum number, if this is one.
    pub fn as_enum_number(&self) -> Option<i32> {
        match *self {
            Value::EnumNumber(v) => Some(v),
            _ => None,
        }
    }

    /// The string, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(v) => Some(v),
            _ => None,
        }
    }

    /// The bytes, if this is a byte string.
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Value::Bytes(v) => Some(v),
            _ => None,
        }
    }

    /// The message, if this is one.
    pub fn as_message(&self) -> Option<&DynamicMessage> {
        match self {
            Value::Message(v) => Some(v),
            _ => None,
        }
    }

    /// The list, if this is one.
    pub fn as_list(&self) -> Option<&PbArray> {
        match self {
            Value::List(v) => Some(v),
            _ => None,
        }
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i32 => I32,
    i64 => I64,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    String => String,
    Bytes => Bytes,
    DynamicMessage => Message,
    PbArray => List,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}
