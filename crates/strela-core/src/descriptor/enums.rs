//! Enum type and enum value descriptors.

use super::file::{FileDescriptor, FileInner};
use super::message::Descriptor;
use std::fmt;

pub(crate) struct EnumData {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) parent: Option<usize>,
    pub(crate) values: Vec<usize>,
}

pub(crate) struct EnumValueData {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) number: i32,
    pub(crate) enum_index: usize,
    pub(crate) index_in_enum: usize,
}

/// Describes an enum type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EnumDescriptor {
    file: FileDescriptor,
    index: usize,
}

impl fmt::Debug for EnumDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EnumDescriptor").field(&self.full_name()).finish()
    }
}

impl EnumDescriptor {
    pub(crate) fn new(file: FileDescriptor, index: usize) -> Self {
        Self { file, index }
    }

    fn inner(&self) -> &FileInner {
        &self.file.inner
    }

    fn data(&self) -> &EnumData {
        &self.inner().enums[self.index]
    }

    /// Simple name.
    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// Fully-qualified name.
    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    /// File that declares this enum.
    pub fn file(&self) -> &FileDescriptor {
        &self.file
    }

    /// Enclosing message type of a nested enum.
    pub fn containing_type(&self) -> Option<Descriptor> {
        self.data()
            .parent
            .map(|p| Descriptor::new(self.file.clone(), p))
    }

    /// Values in declaration order, aliases included.
    pub fn values(&self) -> impl Iterator<Item = EnumValueDescriptor> + '_ {
        self.data()
            .values
            .iter()
            .map(move |&i| EnumValueDescriptor::new(self.file.clone(), i))
    }

    /// Value by simple name.
    pub fn value_by_name(&self, name: &str) -> Option<EnumValueDescriptor> {
        self.values().find(|v| v.name() == name)
    }

    /// First declared value with `number`.
    pub fn value_by_number(&self, number: i32) -> Option<EnumValueDescriptor> {
        self.inner()
            .pool
            .enum_value_by_number(self.full_name(), number)
            .map(|i| EnumValueDescriptor::new(self.file.clone(), i))
    }

    /// Whether `number` names a declared value.
    pub fn is_valid_value(&self, number: i32) -> bool {
        self.value_by_number(number).is_some()
    }

    /// The first declared value, used as the default.
    pub fn default_value(&self) -> Option<EnumValueDescriptor> {
        self.values().next()
    }
}

/// Describes one value of an enum type.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct EnumValueDescriptor {
    file: FileDescriptor,
    index: usize,
}

impl fmt::Debug for EnumValueDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnumValueDescriptor")
            .field("full_name", &self.full_name())
            .field("number", &self.number())
            .finish()
    }
}

impl EnumValueDescriptor {
    pub(crate) fn new(file: FileDescriptor, index: usize) -> Self {
        Self { file, index }
    }

    fn data(&self) -> &EnumValueData {
        &self.file.inner.enum_values[self.index]
    }

    /// Simple name.
    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// Fully-qualified name; values are scoped beside their enum.
    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    /// Numeric value.
    pub fn number(&self) -> i32 {
        self.data().number
    }

    /// Position within the enum.
    pub fn index(&self) -> usize {
        self.data().index_in_enum
    }

    /// Enum this value belongs to.
    pub fn enum_type(&self) -> EnumDescriptor {
        EnumDescriptor::new(self.file.clone(), self.data().enum_index)
    }
}
