//! Extensions: fields declared outside the message type they extend.
//!
//! An [`ExtensionRegistry`] tells the parser which extensions it should
//! recognize. Extension numbers found on the wire that the registry does not
//! know are kept as unknown fields, so parsing with a smaller registry loses
//! nothing on re-serialization.
//!
//! Extendable records keep their extension values in an [`ExtensionSet`]
//! and expose them through [`ExtendableMessage`] and [`ExtendableBuilder`].

use crate::descriptor::{Descriptor, FieldDescriptor, FileDescriptor};
use crate::error::{Error, Result};
use crate::io::{CodedInputStream, CodedOutputStream};
use crate::message::{Message, MessageBuilder};
use crate::reflect::{FieldMap, Value};
use crate::unknown::UnknownFieldSet;
use crate::wire::tag_field_number;
use std::collections::HashMap;
use std::sync::OnceLock;
use tracing::{debug, trace};

/// Extensions known to a parse, keyed by extended type and number.
#[derive(Debug, Clone, Default)]
pub struct ExtensionRegistry {
    by_extendee: HashMap<String, HashMap<u32, FieldDescriptor>>,
    by_name: HashMap<String, FieldDescriptor>,
}

impl ExtensionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A shared registry that knows no extensions.
    pub fn empty() -> &'static ExtensionRegistry {
        static EMPTY: OnceLock<ExtensionRegistry> = OnceLock::new();
        EMPTY.get_or_init(ExtensionRegistry::new)
    }

    /// Registers one extension.
    ///
    /// Registering the same extension twice is a no-op; a different
    /// extension with the same extended type and number is a conflict.
    pub fn add(&mut self, extension: FieldDescriptor) -> Result<()> {
        if !extension.is_extension() {
            return Err(Error::descriptor_conflict(
                extension.full_name(),
                "not an extension",
            ));
        }
        let extendee = extension
            .containing_type()
            .ok_or_else(|| Error::unresolved_type(extension.type_name(), extension.full_name()))?;

        let numbers = self
            .by_extendee
            .entry(extendee.full_name().to_string())
            .or_default();
        if let Some(existing) = numbers.get(&extension.number()) {
            if existing == &extension {
                return Ok(());
            }
            return Err(Error::descriptor_conflict(
                extendee.full_name(),
                format!(
                    "extension number {} already registered by {}",
                    extension.number(),
                    existing.full_name()
                ),
            ));
        }

        debug!(
            "registered extension {} ({} = {})",
            extension.full_name(),
            extendee.full_name(),
            extension.number()
        );
        numbers.insert(extension.number(), extension.clone());
        self.by_name
            .insert(extension.full_name().to_string(), extension);
        Ok(())
    }

    /// Registers every extension a file declares, nested ones included.
    pub fn add_file(&mut self, file: &FileDescriptor) -> Result<()> {
        for extension in file.all_extensions() {
            self.add(extension)?;
        }
        Ok(())
    }

    /// Extension of `extendee` with `number`.
    pub fn find(&self, extendee: &Descriptor, number: u32) -> Option<&FieldDescriptor> {
        self.by_extendee
            .get(extendee.full_name())?
            .get(&number)
            .filter(|ext| ext.containing_type().as_ref() == Some(extendee))
    }

    /// Extension by fully-qualified name.
    pub fn find_by_name(&self, full_name: &str) -> Option<&FieldDescriptor> {
        self.by_name.get(full_name)
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Extension values present on one record, in number order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExtensionSet {
    fields: FieldMap,
}

impl ExtensionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fields(&self) -> &FieldMap {
        &self.fields
    }

    pub(crate) fn fields_mut(&mut self) -> &mut FieldMap {
        &mut self.fields
    }

    /// Returns true if no extension is present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of present extensions.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether `extension` is present; repeated ones when non-empty.
    pub fn has(&self, extension: &FieldDescriptor) -> bool {
        self.fields.has(extension)
    }

    /// Value of `extension`, or its default when absent.
    pub fn get(&self, extension: &FieldDescriptor) -> Value {
        self.fields.get(extension)
    }

    /// Element `index` of a repeated extension.
    pub fn get_repeated(&self, extension: &FieldDescriptor, index: usize) -> Result<Value> {
        self.fields.get_element(extension, index)
    }

    /// Number of elements of a repeated extension.
    pub fn count(&self, extension: &FieldDescriptor) -> usize {
        self.fields.count(extension)
    }

    /// Sets `extension`; a repeated one takes a [`Value::List`].
    pub fn set(&mut self, extension: &FieldDescriptor, value: Value) -> Result<()> {
        check_extension(extension)?;
        self.fields.set(extension, value)
    }

    /// Appends to a repeated extension.
    pub fn add(&mut self, extension: &FieldDescriptor, value: Value) -> Result<()> {
        check_extension(extension)?;
        self.fields.add(extension, value)
    }

    /// Removes `extension`.
    pub fn clear_extension(&mut self, extension: &FieldDescriptor) {
        self.fields.clear_field(extension);
    }

    /// Removes every extension.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Present extensions and their values, in number order.
    pub fn iter(&self) -> impl Iterator<Item = (FieldDescriptor, Value)> + '_ {
        self.fields
            .iter()
            .filter(|(ext, _)| self.fields.has(ext))
            .map(|(ext, value)| (ext.clone(), value.to_value()))
    }

    /// Merges `other` into this set with the usual field merge rules.
    pub fn merge_from(&mut self, other: &ExtensionSet) -> Result<()> {
        self.fields.merge_from(&other.fields)
    }

    /// Whether every message-typed extension value is initialized.
    pub fn is_initialized(&self) -> bool {
        self.fields.is_initialized()
    }

    /// Writes every present extension in number order.
    pub fn write_to(&self, out: &mut CodedOutputStream<'_>) -> Result<()> {
        self.fields.write_to(out)
    }

    /// Exact size of what [`write_to`](Self::write_to) produces.
    pub fn serialized_size(&self) -> usize {
        self.fields.serialized_size()
    }

    /// Reads the value introduced by `tag` if it is a registered extension
    /// of `extendee`.
    ///
    /// Returns false when the number is outside the extension ranges, not
    /// registered, or carried with the wrong wire type; the caller keeps the
    /// field as unknown.
    pub fn merge_field_from(
        &mut self,
        input: &mut CodedInputStream<'_>,
        tag: u32,
        extendee: &Descriptor,
        registry: &ExtensionRegistry,
        unknown: &mut UnknownFieldSet,
    ) -> Result<bool> {
        let number = tag_field_number(tag);
        if !extendee.is_extension_number(number) {
            return Ok(false);
        }
        let Some(extension) = registry.find(extendee, number) else {
            trace!("extension {} of {} not registered", number, extendee.full_name());
            return Ok(false);
        };
        self.fields
            .merge_field(input, tag, extension, registry, unknown)
    }
}

fn check_extension(extension: &FieldDescriptor) -> Result<()> {
    if extension.is_extension() {
        Ok(())
    } else {
        Err(Error::value_type_mismatch(
            extension.full_name(),
            "an extension",
        ))
    }
}

fn check_extends<M: Message>(extension: &FieldDescriptor) -> Result<()> {
    let extendee = M::descriptor();
    if extension.is_extension() && extension.containing_type().as_ref() == Some(&extendee) {
        Ok(())
    } else {
        Err(Error::value_type_mismatch(
            extension.full_name(),
            format!("an extension of {}", extendee.full_name()),
        ))
    }
}

/// A record type with extension ranges.
pub trait ExtendableMessage: Message {
    /// Extension values of this record.
    fn extensions(&self) -> &ExtensionSet;

    /// Whether `extension` is present.
    fn has_extension(&self, extension: &FieldDescriptor) -> bool {
        check_extends::<Self>(extension).is_ok() && self.extensions().has(extension)
    }

    /// Value of `extension`, or its default when absent.
    fn get_extension(&self, extension: &FieldDescriptor) -> Result<Value> {
        check_extends::<Self>(extension)?;
        Ok(self.extensions().get(extension))
    }

    /// Number of elements of a repeated extension.
    fn extension_count(&self, extension: &FieldDescriptor) -> usize {
        if check_extends::<Self>(extension).is_err() {
            return 0;
        }
        self.extensions().count(extension)
    }
}

/// Builder of an [`ExtendableMessage`].
pub trait ExtendableBuilder: MessageBuilder {
    /// Mutable extension values.
    fn extensions_mut(&mut self) -> &mut ExtensionSet;

    /// Sets `extension`.
    fn set_extension(&mut self, extension: &FieldDescriptor, value: Value) -> Result<&mut Self> {
        check_extends::<Self::Message>(extension)?;
        self.extensions_mut().set(extension, value)?;
        Ok(self)
    }

    /// Appends to a repeated extension.
    fn add_extension(&mut self, extension: &FieldDescriptor, value: Value) -> Result<&mut Self> {
        check_extends::<Self::Message>(extension)?;
        self.extensions_mut().add(extension, value)?;
        Ok(self)
    }

    /// Removes `extension`.
    fn clear_extension(&mut self, extension: &FieldDescriptor) -> &mut Self {
        self.extensions_mut().clear_extension(extension);
        self
    }
}

/// Parses the field introduced by `tag` as an extension of `extendee`, or
/// keeps it in `unknown`.
///
/// Generated parsers call this for any number they do not declare. Returns
/// false for an end-group tag, which ends the enclosing group.
pub fn parse_extension_or_unknown(
    input: &mut CodedInputStream<'_>,
    tag: u32,
    extendee: &Descriptor,
    registry: &ExtensionRegistry,
    extensions: &mut ExtensionSet,
    unknown: &mut UnknownFieldSet,
) -> Result<bool> {
    if extensions.merge_field_from(input, tag, extendee, registry, unknown)? {
        return Ok(true);
    }
    unknown.merge_field_from(tag, input)
}
