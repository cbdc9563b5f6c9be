//! Retention of fields that no declared or registered field matched.
//!
//! Values are kept per field number in typed arrays, one per wire
//! representation. Re-encoding writes numbers in ascending order and, per
//! number, varints, then fixed32, fixed64, length-delimited values and
//! groups, so a payload whose unknown fields already follow that order
//! round-trips byte for byte.

use crate::array::{AppendableArray, ArrayValueType};
use crate::error::Result;
use crate::extension::ExtensionRegistry;
use crate::io::{CodedInputStream, CodedOutputStream};
use crate::message::{MergeFromCodedStream, MessageWrite};
use crate::wire::{size, tag_field_number, tag_wire_type, WireType};
use bytes::Bytes;
use std::collections::BTreeMap;
use tracing::trace;

/// All values seen for one unknown field number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UnknownField {
    number: u32,
    varint: AppendableArray,
    fixed32: AppendableArray,
    fixed64: AppendableArray,
    length_delimited: AppendableArray,
    group: AppendableArray,
}

impl UnknownField {
    /// Creates an empty field for `number`.
    pub fn new(number: u32) -> Self {
        Self {
            number,
            varint: AppendableArray::new(ArrayValueType::UInt64),
            fixed32: AppendableArray::new(ArrayValueType::UInt32),
            fixed64: AppendableArray::new(ArrayValueType::UInt64),
            length_delimited: AppendableArray::new(ArrayValueType::Object),
            group: AppendableArray::new(ArrayValueType::Object),
        }
    }

    /// Field number.
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Varint values, as `u64` elements.
    pub fn varint_list(&self) -> &AppendableArray {
        &self.varint
    }

    /// Fixed 32-bit values, as `u32` elements.
    pub fn fixed32_list(&self) -> &AppendableArray {
        &self.fixed32
    }

    /// Fixed 64-bit values, as `u64` elements.
    pub fn fixed64_list(&self) -> &AppendableArray {
        &self.fixed64
    }

    /// Length-delimited values, as [`Bytes`] objects.
    pub fn length_delimited_list(&self) -> &AppendableArray {
        &self.length_delimited
    }

    /// Group values, as [`UnknownFieldSet`] objects.
    pub fn group_list(&self) -> &AppendableArray {
        &self.group
    }

    /// Total number of values across all representations.
    pub fn value_count(&self) -> usize {
        self.varint.count()
            + self.fixed32.count()
            + self.fixed64.count()
            + self.length_delimited.count()
            + self.group.count()
    }

    /// Appends every value of `other`.
    pub fn merge_from(&mut self, other: &UnknownField) -> Result<()> {
        self.varint.append(&other.varint)?;
        self.fixed32.append(&other.fixed32)?;
        self.fixed64.append(&other.fixed64)?;
        self.length_delimited.append(&other.length_delimited)?;
        self.group.append(&other.group)
    }

    fn write_to(&self, out: &mut CodedOutputStream<'_>) -> Result<()> {
        for &value in self.varint.as_uint64_slice()? {
            out.write_uint64(self.number, value)?;
        }
        for &value in self.fixed32.as_uint32_slice()? {
            out.write_fixed32(self.number, value)?;
        }
        for &value in self.fixed64.as_uint64_slice()? {
            out.write_fixed64(self.number, value)?;
        }
        for value in self.length_delimited.objects_as::<Bytes>()? {
            out.write_bytes(self.number, value)?;
        }
        for value in self.group.objects_as::<UnknownFieldSet>()? {
            out.write_unknown_group(self.number, value)?;
        }
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        let number = self.number;
        let tag = size::tag_size(number);
        let varints: usize = self
            .varint
            .as_uint64_slice()
            .map_or(0, |v| v.iter().map(|&x| tag + size::uint64_size_no_tag(x)).sum());
        let fixed = (tag + 4) * self.fixed32.count() + (tag + 8) * self.fixed64.count();
        let delimited: usize = self
            .length_delimited
            .objects_as::<Bytes>()
            .map_or(0, |v| v.iter().map(|b| size::bytes_size(number, b)).sum());
        let groups: usize = self
            .group
            .objects_as::<UnknownFieldSet>()
            .map_or(0, |v| v.iter().map(|g| size::group_size(number, *g)).sum());
        varints + fixed + delimited + groups
    }
}

/// Fields of a record that were not recognized while parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct UnknownFieldSet {
    fields: BTreeMap<u32, UnknownField>,
}

impl UnknownFieldSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a whole payload as unknown fields.
    pub fn parse_from_bytes(data: &[u8]) -> Result<Self> {
        let mut set = Self::new();
        let mut input = CodedInputStream::from_bytes(data);
        set.merge_from_coded_stream(&mut input, ExtensionRegistry::empty())?;
        input.check_last_tag_was(0)?;
        Ok(set)
    }

    /// Returns true if no field is present.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of distinct field numbers.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether any value was seen for `number`.
    pub fn has_field(&self, number: u32) -> bool {
        self.fields.contains_key(&number)
    }

    /// Values seen for `number`.
    pub fn field(&self, number: u32) -> Option<&UnknownField> {
        self.fields.get(&number)
    }

    /// All fields in ascending number order.
    pub fn fields(&self) -> impl Iterator<Item = &UnknownField> {
        self.fields.values()
    }

    /// Removes every field.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    fn entry(&mut self, number: u32) -> &mut UnknownField {
        self.fields
            .entry(number)
            .or_insert_with(|| UnknownField::new(number))
    }

    /// Records a varint value.
    pub fn add_varint(&mut self, number: u32, value: u64) -> Result<()> {
        self.entry(number).varint.push_uint64(value)
    }

    /// Records a fixed 32-bit value.
    pub fn add_fixed32(&mut self, number: u32, value: u32) -> Result<()> {
        self.entry(number).fixed32.push_uint32(value)
    }

    /// Records a fixed 64-bit value.
    pub fn add_fixed64(&mut self, number: u32, value: u64) -> Result<()> {
        self.entry(number).fixed64.push_uint64(value)
    }

    /// Records a length-delimited value.
    pub fn add_length_delimited(&mut self, number: u32, value: Bytes) -> Result<()> {
        self.entry(number).length_delimited.push_object(value)
    }

    /// Records a group value.
    pub fn add_group(&mut self, number: u32, value: UnknownFieldSet) -> Result<()> {
        self.entry(number).group.push_object(value)
    }

    /// Appends the values of `field` to the entry with the same number.
    pub fn merge_field(&mut self, field: &UnknownField) -> Result<()> {
        self.entry(field.number).merge_from(field)
    }

    /// Appends every field of `other`.
    pub fn merge_from(&mut self, other: &UnknownFieldSet) -> Result<()> {
        for field in other.fields.values() {
            self.merge_field(field)?;
        }
        Ok(())
    }

    /// Reads the value introduced by `tag` into the set.
    ///
    /// Returns false for an end-group tag, which ends the enclosing group.
    pub fn merge_field_from(&mut self, tag: u32, input: &mut CodedInputStream<'_>) -> Result<bool> {
        let number = tag_field_number(tag);
        trace!("retaining unknown field {}", number);
        match tag_wire_type(tag)? {
            WireType::Varint => self.add_varint(number, input.read_uint64()?)?,
            WireType::I64 => self.add_fixed64(number, input.read_fixed64()?)?,
            WireType::Len => self.add_length_delimited(number, input.read_bytes()?)?,
            WireType::StartGroup => {
                let mut group = UnknownFieldSet::new();
                input.read_unknown_group(number, &mut group)?;
                self.add_group(number, group)?;
            }
            WireType::EndGroup => return Ok(false),
            WireType::I32 => self.add_fixed32(number, input.read_fixed32()?)?,
        }
        Ok(true)
    }
}

impl MessageWrite for UnknownFieldSet {
    fn write_to(&self, out: &mut CodedOutputStream<'_>) -> Result<()> {
        for field in self.fields.values() {
            field.write_to(out)?;
        }
        Ok(())
    }

    fn serialized_size(&self) -> usize {
        self.fields.values().map(UnknownField::serialized_size).sum()
    }
}

impl MergeFromCodedStream for UnknownFieldSet {
    fn merge_from_coded_stream(
        &mut self,
        input: &mut CodedInputStream<'_>,
        _registry: &ExtensionRegistry,
    ) -> Result<()> {
        loop {
            let tag = input.read_tag()?;
            if tag == 0 || !self.merge_field_from(tag, input)? {
                return Ok(());
            }
        }
    }
}
