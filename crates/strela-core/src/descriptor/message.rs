//! Message type descriptors.

use super::enums::EnumDescriptor;
use super::field::FieldDescriptor;
use super::file::{FileDescriptor, FileInner};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::ops::Range;
use std::sync::{Arc, OnceLock};

pub(crate) struct MessageData {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) parent: Option<usize>,
    pub(crate) fields: Vec<usize>,
    pub(crate) nested_types: Vec<usize>,
    pub(crate) enum_types: Vec<usize>,
    pub(crate) extensions: Vec<usize>,
    pub(crate) extension_ranges: Vec<Range<u32>>,
    pub(crate) fields_by_name: HashMap<String, usize>,
    pub(crate) fields_by_number: HashMap<u32, usize>,
    pub(crate) has_required: OnceLock<bool>,
}

/// Describes a message type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Descriptor {
    file: FileDescriptor,
    index: usize,
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Descriptor").field(&self.full_name()).finish()
    }
}

impl Descriptor {
    pub(crate) fn new(file: FileDescriptor, index: usize) -> Self {
        Self { file, index }
    }

    fn inner(&self) -> &FileInner {
        &self.file.inner
    }

    fn data(&self) -> &MessageData {
        &self.inner().messages[self.index]
    }

    /// Simple name.
    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// Fully-qualified name.
    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    /// File that declares this type.
    pub fn file(&self) -> &FileDescriptor {
        &self.file
    }

    /// Enclosing type of a nested type.
    pub fn containing_type(&self) -> Option<Descriptor> {
        self.data()
            .parent
            .map(|p| Descriptor::new(self.file.clone(), p))
    }

    /// Declared fields in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.data()
            .fields
            .iter()
            .map(move |&i| FieldDescriptor::new(self.file.clone(), i))
    }

    /// Nested message types.
    pub fn nested_types(&self) -> impl Iterator<Item = Descriptor> + '_ {
        self.data()
            .nested_types
            .iter()
            .map(move |&i| Descriptor::new(self.file.clone(), i))
    }

    /// Nested enum types.
    pub fn enum_types(&self) -> impl Iterator<Item = EnumDescriptor> + '_ {
        self.data()
            .enum_types
            .iter()
            .map(move |&i| EnumDescriptor::new(self.file.clone(), i))
    }

    /// Extensions declared inside this type (they may extend any type).
    pub fn extensions(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.data()
            .extensions
            .iter()
            .map(move |&i| FieldDescriptor::new(self.file.clone(), i))
    }

    /// Declared field by name.
    pub fn field_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        self.data()
            .fields_by_name
            .get(name)
            .map(|&i| FieldDescriptor::new(self.file.clone(), i))
    }

    /// Declared field by number.
    pub fn field_by_number(&self, number: u32) -> Option<FieldDescriptor> {
        self.data()
            .fields_by_number
            .get(&number)
            .map(|&i| FieldDescriptor::new(self.file.clone(), i))
    }

    /// Extension of this type declared in its own file, by number.
    pub fn extension_by_number(&self, number: u32) -> Option<FieldDescriptor> {
        self.inner()
            .pool
            .field_by_number(self.full_name(), number)
            .map(|i| FieldDescriptor::new(self.file.clone(), i))
            .filter(|f| f.is_extension())
    }

    /// Nested message type by simple name.
    pub fn nested_type_by_name(&self, name: &str) -> Option<Descriptor> {
        self.nested_types().find(|m| m.name() == name)
    }

    /// Nested enum type by simple name.
    pub fn enum_type_by_name(&self, name: &str) -> Option<EnumDescriptor> {
        self.enum_types().find(|e| e.name() == name)
    }

    /// Extension number ranges, end exclusive.
    pub fn extension_ranges(&self) -> &[Range<u32>] {
        &self.data().extension_ranges
    }

    /// Whether the type declares any extension range.
    pub fn is_extendable(&self) -> bool {
        !self.data().extension_ranges.is_empty()
    }

    /// Whether `number` falls in one of the extension ranges.
    pub fn is_extension_number(&self, number: u32) -> bool {
        self.data()
            .extension_ranges
            .iter()
            .any(|r| r.contains(&number))
    }

    /// Whether a record of this type can ever fail the required-field check.
    ///
    /// True if any field is required, any message-typed field's type has
    /// required fields, or the type is extendable. Memoized per type;
    /// recursive type graphs terminate.
    pub fn has_required_fields(&self) -> bool {
        *self.data().has_required.get_or_init(|| {
            let mut visiting = HashSet::new();
            self.compute_has_required(&mut visiting)
        })
    }

    fn compute_has_required(&self, visiting: &mut HashSet<(usize, usize)>) -> bool {
        if let Some(&known) = self.data().has_required.get() {
            return known;
        }
        if !visiting.insert(self.key()) {
            return false;
        }
        if self.is_extendable() {
            return true;
        }
        self.fields().any(|field| {
            field.is_required()
                || field
                    .message_type()
                    .map_or(false, |m| m.compute_has_required(visiting))
        })
    }

    fn key(&self) -> (usize, usize) {
        (Arc::as_ptr(&self.file.inner) as usize, self.index)
    }
}
