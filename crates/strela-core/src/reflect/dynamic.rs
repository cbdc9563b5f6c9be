//! Records described only by a [`Descriptor`].

use super::codec::{self, FieldMap};
use super::text::TextPrinter;
use super::Value;
use crate::descriptor::{Descriptor, FieldDescriptor};
use crate::error::{Error, Result};
use crate::extension::{ExtensionRegistry, ExtensionSet};
use crate::io::{CodedInputStream, CodedOutputStream};
use crate::message::{CachedSize, MergeFromCodedStream, MessageWrite};
use crate::unknown::UnknownFieldSet;
use crate::wire::tag_field_number;
use std::fmt;
use tracing::trace;

/// A record of any message type, with fields accessed by descriptor.
///
/// Presence is explicit for every singular field: a field set to its zero
/// value is still present and still serialized.
///
/// # Example
///
/// ```ignore
/// let mut message = DynamicMessage::new(descriptor);
/// message.set_field_by_name("a", Value::I32(150))?;
/// assert_eq!(message.to_bytes()?, [0x08, 0x96, 0x01]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DynamicMessage {
    descriptor: Descriptor,
    fields: FieldMap,
    extensions: ExtensionSet,
    unknown: UnknownFieldSet,
    cached_size: CachedSize,
}

impl DynamicMessage {
    /// Creates an empty record of the given type.
    pub fn new(descriptor: Descriptor) -> Self {
        Self {
            descriptor,
            fields: FieldMap::new(),
            extensions: ExtensionSet::new(),
            unknown: UnknownFieldSet::new(),
            cached_size: CachedSize::new(),
        }
    }

    /// Parses a record of the given type.
    pub fn decode(descriptor: Descriptor, data: &[u8]) -> Result<Self> {
        Self::decode_with_registry(descriptor, data, ExtensionRegistry::empty())
    }

    /// Parses a record, resolving extensions through `registry`.
    pub fn decode_with_registry(
        descriptor: Descriptor,
        data: &[u8],
        registry: &ExtensionRegistry,
    ) -> Result<Self> {
        let mut message = Self::new(descriptor);
        message.merge_from_bytes_with_registry(data, registry)?;
        Ok(message)
    }

    /// The record's type.
    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    /// Merges a serialized record into this one.
    pub fn merge_from_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.merge_from_bytes_with_registry(data, ExtensionRegistry::empty())
    }

    /// Merges a serialized record, resolving extensions through `registry`.
    pub fn merge_from_bytes_with_registry(
        &mut self,
        data: &[u8],
        registry: &ExtensionRegistry,
    ) -> Result<()> {
        let mut input = CodedInputStream::from_bytes(data);
        self.merge_from_coded_stream(&mut input, registry)?;
        input.check_last_tag_was(0)
    }

    fn owns(&self, field: &FieldDescriptor) -> bool {
        field.containing_type().as_ref() == Some(&self.descriptor)
    }

    fn check_owned(&self, field: &FieldDescriptor) -> Result<()> {
        if self.owns(field) {
            Ok(())
        } else {
            Err(Error::value_type_mismatch(
                field.full_name(),
                format!("a field of {}", self.descriptor.full_name()),
            ))
        }
    }

    fn storage(&self, field: &FieldDescriptor) -> &FieldMap {
        if field.is_extension() {
            self.extensions.fields()
        } else {
            &self.fields
        }
    }

    fn storage_mut(&mut self, field: &FieldDescriptor) -> &mut FieldMap {
        self.cached_size.clear();
        if field.is_extension() {
            self.extensions.fields_mut()
        } else {
            &mut self.fields
        }
    }

    fn field_named(&self, name: &str) -> Result<FieldDescriptor> {
        self.descriptor
            .field_by_name(name)
            .ok_or_else(|| Error::unresolved_type(name, self.descriptor.full_name()))
    }

    /// Whether `field` is present; a repeated field is present when non-empty.
    ///
    /// Extensions of this type are accepted as well as declared fields.
    pub fn has_field(&self, field: &FieldDescriptor) -> bool {
        self.owns(field) && self.storage(field).has(field)
    }

    /// Value of `field`, or its default when absent.
    pub fn get_field(&self, field: &FieldDescriptor) -> Value {
        if !self.owns(field) {
            return field.default_value();
        }
        self.storage(field).get(field)
    }

    /// Value of the declared field called `name`.
    pub fn get_field_by_name(&self, name: &str) -> Option<Value> {
        let field = self.descriptor.field_by_name(name)?;
        Some(self.get_field(&field))
    }

    /// Element `index` of a repeated field.
    pub fn get_repeated(&self, field: &FieldDescriptor, index: usize) -> Result<Value> {
        self.check_owned(field)?;
        self.storage(field).get_element(field, index)
    }

    /// Number of elements of a repeated field; 0 or 1 for a singular one.
    pub fn repeated_count(&self, field: &FieldDescriptor) -> usize {
        if !self.owns(field) {
            return 0;
        }
        self.storage(field).count(field)
    }

    /// Sets `field`; a repeated field takes a [`Value::List`].
    pub fn set_field(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
        self.check_owned(field)?;
        self.storage_mut(field).set(field, value)
    }

    /// Sets the declared field called `name`.
    pub fn set_field_by_name(&mut self, name: &str, value: Value) -> Result<()> {
        let field = self.field_named(name)?;
        self.set_field(&field, value)
    }

    /// Appends one element to a repeated field.
    pub fn add_repeated(&mut self, field: &FieldDescriptor, value: Value) -> Result<()> {
        self.check_owned(field)?;
        self.storage_mut(field).add(field, value)
    }

    /// Appends one element to the repeated field called `name`.
    pub fn add_repeated_by_name(&mut self, name: &str, value: Value) -> Result<()> {
        let field = self.field_named(name)?;
        self.add_repeated(&field, value)
    }

    /// Removes `field`.
    pub fn clear_field(&mut self, field: &FieldDescriptor) {
        if self.owns(field) {
            self.storage_mut(field).clear_field(field);
        }
    }

    /// Present declared fields and their values, in field-number order.
    pub fn fields(&self) -> impl Iterator<Item = (FieldDescriptor, Value)> + '_ {
        self.fields
            .iter()
            .filter(|(field, _)| self.fields.has(field))
            .map(|(field, value)| (field.clone(), value.to_value()))
    }

    /// Extensions present on this record.
    pub fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }

    /// Mutable extensions.
    pub fn extensions_mut(&mut self) -> &mut ExtensionSet {
        self.cached_size.clear();
        &mut self.extensions
    }

    /// Fields that matched neither a declared field nor a known extension.
    pub fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.unknown
    }

    /// Mutable unknown fields.
    pub fn unknown_fields_mut(&mut self) -> &mut UnknownFieldSet {
        self.cached_size.clear();
        &mut self.unknown
    }

    /// Whether every required field is set, recursively.
    pub fn is_initialized(&self) -> bool {
        if !self.descriptor.has_required_fields() && self.extensions.is_empty() {
            return true;
        }
        self.descriptor
            .fields()
            .all(|field| !field.is_required() || self.fields.has(&field))
            && self.fields.is_initialized()
            && self.extensions.is_initialized()
    }

    /// Fails with [`Error::RequiredFieldMissing`] unless initialized.
    pub fn check_initialized(&self) -> Result<()> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(Error::required_field_missing(self.descriptor.full_name()))
        }
    }

    /// Merges `other`, which must have the same type.
    ///
    /// Singular fields present in `other` overwrite, singular messages
    /// merge recursively, repeated fields and unknown fields append.
    pub fn merge_from(&mut self, other: &DynamicMessage) -> Result<()> {
        if other.descriptor != self.descriptor {
            return Err(Error::value_type_mismatch(
                other.descriptor.full_name(),
                format!("a record of {}", self.descriptor.full_name()),
            ));
        }
        self.cached_size.clear();
        self.fields.merge_from(&other.fields)?;
        self.extensions.merge_from(&other.extensions)?;
        self.unknown.merge_from(&other.unknown)
    }

    /// Removes every field, extension and unknown field.
    pub fn clear(&mut self) {
        self.cached_size.clear();
        self.fields.clear();
        self.extensions.clear();
        self.unknown.clear();
    }

    fn compute_size(&self) -> usize {
        self.fields.serialized_size()
            + self.extensions.serialized_size()
            + self.unknown.serialized_size()
    }
}

impl MessageWrite for DynamicMessage {
    /// Writes declared fields and extensions merged in field-number order,
    /// then unknown fields.
    fn write_to(&self, out: &mut CodedOutputStream<'_>) -> Result<()> {
        let mut extensions = self.extensions.fields().iter().peekable();
        for (field, value) in self.fields.iter() {
            while let Some((ext, ext_value)) =
                extensions.next_if(|(ext, _)| ext.number() < field.number())
            {
                codec::write_field(out, ext, ext_value)?;
            }
            codec::write_field(out, field, value)?;
        }
        for (ext, ext_value) in extensions {
            codec::write_field(out, ext, ext_value)?;
        }
        self.unknown.write_to(out)
    }

    fn serialized_size(&self) -> usize {
        self.cached_size.get_or_compute(|| self.compute_size())
    }
}

impl MergeFromCodedStream for DynamicMessage {
    fn merge_from_coded_stream(
        &mut self,
        input: &mut CodedInputStream<'_>,
        registry: &ExtensionRegistry,
    ) -> Result<()> {
        self.cached_size.clear();
        loop {
            let tag = input.read_tag()?;
            if tag == 0 {
                return Ok(());
            }
            let number = tag_field_number(tag);
            let consumed = match self.descriptor.field_by_number(number) {
                Some(field) => {
                    self.fields
                        .merge_field(input, tag, &field, registry, &mut self.unknown)?
                }
                None => self.extensions.merge_field_from(
                    input,
                    tag,
                    &self.descriptor,
                    registry,
                    &mut self.unknown,
                )?,
            };
            if consumed {
                continue;
            }
            trace!(
                "field {} of {} kept as unknown",
                number,
                self.descriptor.full_name()
            );
            if !self.unknown.merge_field_from(tag, input)? {
                return Ok(());
            }
        }
    }
}

impl fmt::Display for DynamicMessage {
    /// Text format with the default printer settings.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&TextPrinter::default().print(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::PbArray;
    use crate::descriptor::FileDescriptor;
    use crate::message::MessageWrite;
    use pretty_assertions::assert_eq;
    use prost_types::field_descriptor_proto::{Label, Type};
    use prost_types::{
        DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
        FileDescriptorProto,
    };

    fn field(name: &str, number: i32, label: Label, ty: Type) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.into()),
            number: Some(number),
            label: Some(label as i32),
            r#type: Some(ty as i32),
            ..Default::default()
        }
    }

    fn typed(mut proto: FieldDescriptorProto, type_name: &str) -> FieldDescriptorProto {
        proto.type_name = Some(type_name.into());
        proto
    }

    fn schema() -> FileDescriptor {
        let proto = FileDescriptorProto {
            name: Some("dyn.proto".into()),
            package: Some("dyn".into()),
            message_type: vec![
                DescriptorProto {
                    name: Some("Sample".into()),
                    field: vec![
                        field("a", 1, Label::Optional, Type::Int32),
                        field("b", 2, Label::Repeated, Type::String),
                        typed(field("child", 3, Label::Optional, Type::Message), ".dyn.Child"),
                        typed(field("kind", 4, Label::Optional, Type::Enum), ".dyn.Kind"),
                        typed(field("children", 5, Label::Repeated, Type::Message), ".dyn.Child"),
                    ],
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("Child".into()),
                    field: vec![
                        field("id", 1, Label::Required, Type::Int32),
                        field("note", 2, Label::Optional, Type::String),
                    ],
                    ..Default::default()
                },
            ],
            enum_type: vec![EnumDescriptorProto {
                name: Some("Kind".into()),
                value: vec![
                    EnumValueDescriptorProto {
                        name: Some("KIND_A".into()),
                        number: Some(0),
                        ..Default::default()
                    },
                    EnumValueDescriptorProto {
                        name: Some("KIND_B".into()),
                        number: Some(1),
                        ..Default::default()
                    },
                ],
                ..Default::default()
            }],
            ..Default::default()
        };
        FileDescriptor::new(proto, &[]).unwrap()
    }

    fn sample(file: &FileDescriptor) -> DynamicMessage {
        DynamicMessage::new(file.find_message_type("dyn.Sample").unwrap())
    }

    fn child(file: &FileDescriptor, id: Option<i32>) -> DynamicMessage {
        let mut child = DynamicMessage::new(file.find_message_type("dyn.Child").unwrap());
        if let Some(id) = id {
            child.set_field_by_name("id", Value::I32(id)).unwrap();
        }
        child
    }

    #[test]
    fn test_decode_concrete_payload() {
        let file = schema();
        let data = [0x08, 0x96, 0x01, 0x12, 0x01, 0x78, 0x12, 0x02, 0x79, 0x79];
        let message = DynamicMessage::decode(sample(&file).descriptor().clone(), &data).unwrap();

        assert_eq!(message.get_field_by_name("a"), Some(Value::I32(150)));
        let b = message.descriptor().field_by_name("b").unwrap();
        assert_eq!(message.repeated_count(&b), 2);
        assert_eq!(message.get_repeated(&b, 1).unwrap(), Value::String("yy".into()));
        assert_eq!(message.to_bytes().unwrap(), data);
        assert_eq!(message.serialized_size(), data.len());
    }

    #[test]
    fn test_absent_fields_report_defaults() {
        let file = schema();
        let message = sample(&file);
        let a = message.descriptor().field_by_name("a").unwrap();
        assert!(!message.has_field(&a));
        assert_eq!(message.get_field(&a), Value::I32(0));
        assert_eq!(message.get_field_by_name("kind"), Some(Value::EnumNumber(0)));
        assert!(message.to_bytes().unwrap().is_empty());
    }

    #[test]
    fn test_zero_value_is_still_present() {
        let file = schema();
        let mut message = sample(&file);
        message.set_field_by_name("a", Value::I32(0)).unwrap();
        assert_eq!(message.to_bytes().unwrap(), [0x08, 0x00]);
    }

    #[test]
    fn test_set_rejects_wrong_value_kind() {
        let file = schema();
        let mut message = sample(&file);
        let err = message.set_field_by_name("a", Value::I64(1)).unwrap_err();
        assert!(matches!(err, Error::ValueTypeMismatch { .. }));
        let err = message
            .set_field_by_name("b", Value::String("x".into()))
            .unwrap_err();
        assert!(matches!(err, Error::ValueTypeMismatch { .. }));
        assert!(message.set_field_by_name("missing", Value::I32(1)).is_err());
    }

    #[test]
    fn test_foreign_field_is_rejected() {
        let file = schema();
        let mut message = sample(&file);
        let id = file
            .find_message_type("dyn.Child")
            .unwrap()
            .field_by_name("id")
            .unwrap();
        assert!(message.set_field(&id, Value::I32(1)).is_err());
        assert!(!message.has_field(&id));
    }

    #[test]
    fn test_repeated_set_and_add() {
        let file = schema();
        let mut message = sample(&file);
        message
            .set_field_by_name("b", Value::List(PbArray::from_objects(vec!["x".to_string()])))
            .unwrap();
        message.add_repeated_by_name("b", Value::from("yy")).unwrap();
        message.set_field_by_name("a", Value::I32(150)).unwrap();
        assert_eq!(
            message.to_bytes().unwrap(),
            [0x08, 0x96, 0x01, 0x12, 0x01, 0x78, 0x12, 0x02, 0x79, 0x79]
        );
    }

    #[test]
    fn test_required_fields_in_children() {
        let file = schema();
        let mut message = sample(&file);
        assert!(message.is_initialized());

        message
            .set_field_by_name("child", Value::Message(child(&file, None)))
            .unwrap();
        assert!(!message.is_initialized());
        assert!(matches!(
            message.check_initialized(),
            Err(Error::RequiredFieldMissing { .. })
        ));

        message
            .set_field_by_name("child", Value::Message(child(&file, Some(3))))
            .unwrap();
        assert!(message.is_initialized());

        message
            .add_repeated_by_name("children", Value::Message(child(&file, None)))
            .unwrap();
        assert!(!message.is_initialized());
    }

    #[test]
    fn test_child_round_trip() {
        let file = schema();
        let mut message = sample(&file);
        message
            .set_field_by_name("child", Value::Message(child(&file, Some(7))))
            .unwrap();
        message
            .add_repeated_by_name("children", Value::Message(child(&file, Some(1))))
            .unwrap();
        message
            .add_repeated_by_name("children", Value::Message(child(&file, Some(2))))
            .unwrap();

        let bytes = message.to_bytes().unwrap();
        assert_eq!(
            bytes,
            [0x1A, 0x02, 0x08, 0x07, 0x2A, 0x02, 0x08, 0x01, 0x2A, 0x02, 0x08, 0x02]
        );
        let parsed = DynamicMessage::decode(message.descriptor().clone(), &bytes).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_singular_message_merges_on_repeat() {
        let file = schema();
        // child { id: 1 } child { note: "n" }
        let data = [0x1A, 0x02, 0x08, 0x01, 0x1A, 0x03, 0x12, 0x01, 0x6E];
        let message = DynamicMessage::decode(sample(&file).descriptor().clone(), &data).unwrap();
        let child = message.get_field_by_name("child").unwrap();
        let child = child.as_message().unwrap();
        assert_eq!(child.get_field_by_name("id"), Some(Value::I32(1)));
        assert_eq!(child.get_field_by_name("note"), Some(Value::String("n".into())));
    }

    #[test]
    fn test_undeclared_enum_number_becomes_unknown() {
        let file = schema();
        let message = DynamicMessage::decode(sample(&file).descriptor().clone(), &[0x20, 0x05]).unwrap();
        let kind = message.descriptor().field_by_name("kind").unwrap();
        assert!(!message.has_field(&kind));
        assert!(message.unknown_fields().has_field(4));
        assert_eq!(message.to_bytes().unwrap(), [0x20, 0x05]);
    }

    #[test]
    fn test_wrong_wire_type_is_kept_unknown() {
        let file = schema();
        // field 1 as fixed32 instead of varint
        let data = [0x0D, 0x01, 0x00, 0x00, 0x00];
        let message = DynamicMessage::decode(sample(&file).descriptor().clone(), &data).unwrap();
        assert_eq!(message.get_field_by_name("a"), Some(Value::I32(0)));
        assert!(message.unknown_fields().has_field(1));
        assert_eq!(message.to_bytes().unwrap(), data);
    }

    #[test]
    fn test_merge_from() {
        let file = schema();
        let mut first = sample(&file);
        first.set_field_by_name("a", Value::I32(1)).unwrap();
        first.add_repeated_by_name("b", Value::from("x")).unwrap();

        let mut second = sample(&file);
        second.set_field_by_name("a", Value::I32(2)).unwrap();
        second.add_repeated_by_name("b", Value::from("y")).unwrap();

        first.merge_from(&second).unwrap();
        assert_eq!(first.get_field_by_name("a"), Some(Value::I32(2)));
        let b = first.descriptor().field_by_name("b").unwrap();
        assert_eq!(first.repeated_count(&b), 2);

        let other_type = child(&file, Some(1));
        assert!(first.merge_from(&other_type).is_err());
    }

    #[test]
    fn test_size_cache_invalidated_by_mutation() {
        let file = schema();
        let mut message = sample(&file);
        message.set_field_by_name("a", Value::I32(1)).unwrap();
        assert_eq!(message.serialized_size(), 2);
        message.set_field_by_name("a", Value::I32(150)).unwrap();
        assert_eq!(message.serialized_size(), 3);
        message.clear();
        assert_eq!(message.serialized_size(), 0);
    }

    #[test]
    fn test_fields_iterates_in_number_order() {
        let file = schema();
        let mut message = sample(&file);
        message.set_field_by_name("kind", Value::EnumNumber(1)).unwrap();
        message.set_field_by_name("a", Value::I32(5)).unwrap();
        let names: Vec<_> = message
            .fields()
            .map(|(field, _)| field.name().to_string())
            .collect();
        assert_eq!(names, ["a", "kind"]);
    }
}
