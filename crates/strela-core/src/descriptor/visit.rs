//! Descriptor traversal.
//!
//! [`walk_file`] visits every element of a [`FileDescriptor`] in declaration
//! order and hands it to a [`DescriptorVisitor`].

use super::{
    Descriptor, EnumDescriptor, EnumValueDescriptor, FieldDescriptor, FileDescriptor,
    MethodDescriptor, ServiceDescriptor,
};

/// Callbacks for [`walk_file`].
///
/// Every method has a no-op default, so implementors only override what they
/// care about.
///
/// # Example
///
/// ```ignore
/// use strela_core::descriptor::{DescriptorVisitor, FieldDescriptor};
///
/// struct RequiredFields(Vec<String>);
///
/// impl DescriptorVisitor for RequiredFields {
///     fn visit_field(&mut self, field: &FieldDescriptor) {
///         if field.is_required() {
///             self.0.push(field.full_name().to_string());
///         }
///     }
/// }
/// ```
pub trait DescriptorVisitor {
    /// Called once for the file, before any of its elements
    fn visit_file(&mut self, file: &FileDescriptor) {
        let _ = file;
    }

    /// Called for every message type, nested ones included
    fn visit_message(&mut self, message: &Descriptor) {
        let _ = message;
    }

    /// Called for every declared field
    fn visit_field(&mut self, field: &FieldDescriptor) {
        let _ = field;
    }

    /// Called for every extension, wherever it is declared
    fn visit_extension(&mut self, extension: &FieldDescriptor) {
        let _ = extension;
    }

    /// Called for every enum type
    fn visit_enum(&mut self, enum_type: &EnumDescriptor) {
        let _ = enum_type;
    }

    /// Called for every enum value
    fn visit_enum_value(&mut self, value: &EnumValueDescriptor) {
        let _ = value;
    }

    /// Called for every service
    fn visit_service(&mut self, service: &ServiceDescriptor) {
        let _ = service;
    }

    /// Called for every service method
    fn visit_method(&mut self, method: &MethodDescriptor) {
        let _ = method;
    }
}

/// A visitor that counts the elements of a file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StatsVisitor {
    /// Number of messages
    pub message_count: usize,
    /// Number of fields
    pub field_count: usize,
    /// Number of extensions
    pub extension_count: usize,
    /// Number of enums
    pub enum_count: usize,
    /// Number of enum values
    pub enum_value_count: usize,
    /// Number of services
    pub service_count: usize,
    /// Number of methods
    pub method_count: usize,
}

impl DescriptorVisitor for StatsVisitor {
    fn visit_message(&mut self, _message: &Descriptor) {
        self.message_count += 1;
    }

    fn visit_field(&mut self, _field: &FieldDescriptor) {
        self.field_count += 1;
    }

    fn visit_extension(&mut self, _extension: &FieldDescriptor) {
        self.extension_count += 1;
    }

    fn visit_enum(&mut self, _enum_type: &EnumDescriptor) {
        self.enum_count += 1;
    }

    fn visit_enum_value(&mut self, _value: &EnumValueDescriptor) {
        self.enum_value_count += 1;
    }

    fn visit_service(&mut self, _service: &ServiceDescriptor) {
        self.service_count += 1;
    }

    fn visit_method(&mut self, _method: &MethodDescriptor) {
        self.method_count += 1;
    }
}

/// Walks every element of `file` depth-first in declaration order.
pub fn walk_file(file: &FileDescriptor, visitor: &mut dyn DescriptorVisitor) {
    visitor.visit_file(file);
    for message in file.message_types() {
        walk_message(&message, visitor);
    }
    for enum_type in file.enum_types() {
        walk_enum(&enum_type, visitor);
    }
    for extension in file.extensions() {
        visitor.visit_extension(&extension);
    }
    for service in file.services() {
        visitor.visit_service(&service);
        for method in service.methods() {
            visitor.visit_method(&method);
        }
    }
}

fn walk_message(message: &Descriptor, visitor: &mut dyn DescriptorVisitor) {
    visitor.visit_message(message);
    for field in message.fields() {
        visitor.visit_field(&field);
    }
    for nested in message.nested_types() {
        walk_message(&nested, visitor);
    }
    for enum_type in message.enum_types() {
        walk_enum(&enum_type, visitor);
    }
    for extension in message.extensions() {
        visitor.visit_extension(&extension);
    }
}

fn walk_enum(enum_type: &EnumDescriptor, visitor: &mut dyn DescriptorVisitor) {
    visitor.visit_enum(enum_type);
    for value in enum_type.values() {
        visitor.visit_enum_value(&value);
    }
}
