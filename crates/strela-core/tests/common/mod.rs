//! Record types written the way the code generator emits them, over a small
//! schema linked in memory.
//!
//! ```text
//! package fixtures;
//! enum Color { RED = 0; GREEN = 1; BLUE = 2; }
//! message Sample {
//!   optional int32 a = 1;
//!   repeated string b = 2;
//!   optional Color color = 3;
//!   repeated sint32 nums = 4 [packed = true];
//!   optional Inner inner = 5;
//!   repeated Inner items = 6;
//! }
//! message Inner { required int32 id = 1; optional string label = 2; }
//! message Host { optional string name = 1; extensions 100 to 199; }
//! extend Host { optional int32 weight = 100; optional Inner detail = 101; }
//! ```

#![allow(dead_code)]

use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    descriptor_proto::ExtensionRange, DescriptorProto, EnumDescriptorProto,
    EnumValueDescriptorProto, FieldDescriptorProto, FieldOptions, FileDescriptorProto,
};
use std::io::Read;
use std::sync::OnceLock;
use strela_core::array::{AppendableArray, ArrayValueType, PbArray};
use strela_core::descriptor::{Descriptor, EnumDescriptor, FieldDescriptor, FileDescriptor};
use strela_core::extension::{
    self, ExtendableBuilder, ExtendableMessage, ExtensionRegistry, ExtensionSet,
};
use strela_core::io::{CodedInputStream, CodedOutputStream};
use strela_core::message::{
    self, CachedSize, MergeFromCodedStream, Message, MessageBuilder, MessageWrite, ProtoEnum,
};
use strela_core::unknown::UnknownFieldSet;
use strela_core::wire::{size, tag_wire_type, FieldType, WireType};
use strela_core::Result;

/// `a: 150, b: ["x", "yy"]`
pub const CONCRETE: [u8; 10] = [0x08, 0x96, 0x01, 0x12, 0x01, 0x78, 0x12, 0x02, 0x79, 0x79];

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

fn extending(mut proto: FieldDescriptorProto, extendee: &str) -> FieldDescriptorProto {
    proto.extendee = Some(extendee.into());
    proto
}

/// The fixture schema as a compiled descriptor.
pub fn fixtures_proto() -> FileDescriptorProto {
    let mut nums = field("nums", 4, Label::Repeated, Type::Sint32);
    nums.options = Some(FieldOptions {
        packed: Some(true),
        ..Default::default()
    });

    FileDescriptorProto {
        name: Some("fixtures.proto".into()),
        package: Some("fixtures".into()),
        message_type: vec![
            DescriptorProto {
                name: Some("Sample".into()),
                field: vec![
                    field("a", 1, Label::Optional, Type::Int32),
                    field("b", 2, Label::Repeated, Type::String),
                    typed(field("color", 3, Label::Optional, Type::Enum), ".fixtures.Color"),
                    nums,
                    typed(field("inner", 5, Label::Optional, Type::Message), ".fixtures.Inner"),
                    typed(field("items", 6, Label::Repeated, Type::Message), ".fixtures.Inner"),
                ],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("Inner".into()),
                field: vec![
                    field("id", 1, Label::Required, Type::Int32),
                    field("label", 2, Label::Optional, Type::String),
                ],
                ..Default::default()
            },
            DescriptorProto {
                name: Some("Host".into()),
                field: vec![field("name", 1, Label::Optional, Type::String)],
                extension_range: vec![ExtensionRange {
                    start: Some(100),
                    end: Some(200),
                    ..Default::default()
                }],
                ..Default::default()
            },
        ],
        enum_type: vec![EnumDescriptorProto {
            name: Some("Color".into()),
            value: ["RED", "GREEN", "BLUE"]
                .iter()
                .zip(0..)
                .map(|(name, number)| EnumValueDescriptorProto {
                    name: Some((*name).into()),
                    number: Some(number),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        }],
        extension: vec![
            extending(field("weight", 100, Label::Optional, Type::Int32), ".fixtures.Host"),
            extending(
                typed(field("detail", 101, Label::Optional, Type::Message), ".fixtures.Inner"),
                ".fixtures.Host",
            ),
        ],
        ..Default::default()
    }
}

/// The linked fixture schema, shared by every generated type.
pub fn fixtures_file() -> &'static FileDescriptor {
    static FILE: OnceLock<FileDescriptor> = OnceLock::new();
    FILE.get_or_init(|| FileDescriptor::new(fixtures_proto(), &[]).expect("fixture schema links"))
}

pub fn message_type(full_name: &str) -> Descriptor {
    fixtures_file()
        .find_message_type(full_name)
        .expect("fixture message type")
}

pub fn extension_field(name: &str) -> FieldDescriptor {
    fixtures_file()
        .extension_by_name(name)
        .expect("fixture extension")
}

/// A registry knowing every fixture extension.
pub fn full_registry() -> ExtensionRegistry {
    let mut registry = ExtensionRegistry::new();
    registry.add_file(fixtures_file()).expect("no conflicts");
    registry
}

/// A reader that hands out one byte per call.
pub struct Trickle<'a>(pub &'a [u8]);

impl Read for Trickle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match (self.0.split_first(), buf.is_empty()) {
            (Some((&first, rest)), false) => {
                buf[0] = first;
                self.0 = rest;
                Ok(1)
            }
            _ => Ok(0),
        }
    }
}

// ----------------------------------------------------------------------------
// enum Color
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Color {
    #[default]
    Red = 0,
    Green = 1,
    Blue = 2,
}

impl ProtoEnum for Color {
    fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Color::Red),
            1 => Some(Color::Green),
            2 => Some(Color::Blue),
            _ => None,
        }
    }

    fn value(self) -> i32 {
        self as i32
    }

    fn enum_descriptor() -> EnumDescriptor {
        fixtures_file()
            .find_enum_type("fixtures.Color")
            .expect("fixture enum type")
    }
}

// ----------------------------------------------------------------------------
// message Inner
// ----------------------------------------------------------------------------

const INNER_ID: u32 = 1;
const INNER_LABEL: u32 = 1 << 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Inner {
    has_bits: u32,
    id: i32,
    label: String,
    unknown: UnknownFieldSet,
    cached_size: CachedSize,
}

impl Inner {
    pub fn has_id(&self) -> bool {
        self.has_bits & INNER_ID != 0
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn has_label(&self) -> bool {
        self.has_bits & INNER_LABEL != 0
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

impl MessageWrite for Inner {
    fn write_to(&self, out: &mut CodedOutputStream<'_>) -> Result<()> {
        if self.has_id() {
            out.write_int32(1, self.id)?;
        }
        if self.has_label() {
            out.write_string(2, &self.label)?;
        }
        self.unknown.write_to(out)
    }

    fn serialized_size(&self) -> usize {
        self.memoized_size()
    }
}

impl Message for Inner {
    type Builder = InnerBuilder;

    fn descriptor() -> Descriptor {
        message_type("fixtures.Inner")
    }

    fn default_instance() -> Self {
        InnerBuilder::default().build_partial()
    }

    fn cached_size(&self) -> &CachedSize {
        &self.cached_size
    }

    fn compute_serialized_size(&self) -> usize {
        let mut total = 0;
        if self.has_id() {
            total += size::int32_size(1, self.id);
        }
        if self.has_label() {
            total += size::string_size(2, &self.label);
        }
        total + self.unknown.serialized_size()
    }

    fn to_builder(&self) -> InnerBuilder {
        InnerBuilder {
            has_bits: self.has_bits,
            id: self.id,
            label: self.label.clone(),
            unknown: self.unknown.clone(),
        }
    }

    fn is_initialized(&self) -> bool {
        self.has_id()
    }

    fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.unknown
    }
}

#[derive(Debug, Clone, Default)]
pub struct InnerBuilder {
    has_bits: u32,
    id: i32,
    label: String,
    unknown: UnknownFieldSet,
}

impl InnerBuilder {
    pub fn set_id(&mut self, value: i32) -> &mut Self {
        self.id = value;
        self.has_bits |= INNER_ID;
        self
    }

    pub fn clear_id(&mut self) -> &mut Self {
        self.id = 0;
        self.has_bits &= !INNER_ID;
        self
    }

    pub fn set_label(&mut self, value: impl Into<String>) -> &mut Self {
        self.label = value.into();
        self.has_bits |= INNER_LABEL;
        self
    }

    pub fn clear_label(&mut self) -> &mut Self {
        self.label.clear();
        self.has_bits &= !INNER_LABEL;
        self
    }
}

impl MergeFromCodedStream for InnerBuilder {
    fn merge_from_coded_stream(
        &mut self,
        input: &mut CodedInputStream<'_>,
        _registry: &ExtensionRegistry,
    ) -> Result<()> {
        loop {
            let tag = input.read_tag()?;
            match tag {
                0 => return Ok(()),
                8 => {
                    self.set_id(input.read_int32()?);
                }
                18 => {
                    self.set_label(input.read_string()?);
                }
                _ => {
                    if !self.unknown.merge_field_from(tag, input)? {
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl MessageBuilder for InnerBuilder {
    type Message = Inner;

    fn clear(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    fn is_initialized(&self) -> bool {
        self.has_bits & INNER_ID != 0
    }

    fn merge_from(&mut self, other: &Inner) -> Result<&mut Self> {
        if other.has_id() {
            self.set_id(other.id);
        }
        if other.has_label() {
            self.set_label(other.label.clone());
        }
        self.unknown.merge_from(&other.unknown)?;
        Ok(self)
    }

    fn unknown_fields_mut(&mut self) -> &mut UnknownFieldSet {
        &mut self.unknown
    }

    fn build_partial(self) -> Inner {
        Inner {
            has_bits: self.has_bits,
            id: self.id,
            label: self.label,
            unknown: self.unknown,
            cached_size: CachedSize::new(),
        }
    }
}

// ----------------------------------------------------------------------------
// message Sample
// ----------------------------------------------------------------------------

const SAMPLE_A: u32 = 1;
const SAMPLE_COLOR: u32 = 1 << 1;
const SAMPLE_INNER: u32 = 1 << 2;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sample {
    has_bits: u32,
    a: i32,
    b: PbArray,
    color: Color,
    nums: PbArray,
    inner: Inner,
    items: PbArray,
    unknown: UnknownFieldSet,
    cached_size: CachedSize,
}

impl Sample {
    pub fn has_a(&self) -> bool {
        self.has_bits & SAMPLE_A != 0
    }

    pub fn a(&self) -> i32 {
        self.a
    }

    pub fn b(&self) -> &PbArray {
        &self.b
    }

    pub fn has_color(&self) -> bool {
        self.has_bits & SAMPLE_COLOR != 0
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn nums(&self) -> &PbArray {
        &self.nums
    }

    pub fn has_inner(&self) -> bool {
        self.has_bits & SAMPLE_INNER != 0
    }

    pub fn inner(&self) -> &Inner {
        &self.inner
    }

    pub fn items(&self) -> &PbArray {
        &self.items
    }
}

impl MessageWrite for Sample {
    fn write_to(&self, out: &mut CodedOutputStream<'_>) -> Result<()> {
        if self.has_a() {
            out.write_int32(1, self.a)?;
        }
        message::write_repeated_scalar(out, 2, FieldType::String, false, self.b.as_slice())?;
        if self.has_color() {
            out.write_enum(3, self.color.value())?;
        }
        message::write_repeated_scalar(out, 4, FieldType::SInt32, true, self.nums.as_slice())?;
        if self.has_inner() {
            out.write_message(5, &self.inner)?;
        }
        message::write_repeated_message::<Inner>(out, 6, FieldType::Message, self.items.as_slice())?;
        self.unknown.write_to(out)
    }

    fn serialized_size(&self) -> usize {
        self.memoized_size()
    }
}

impl Message for Sample {
    type Builder = SampleBuilder;

    fn descriptor() -> Descriptor {
        message_type("fixtures.Sample")
    }

    fn default_instance() -> Self {
        SampleBuilder::default().build_partial()
    }

    fn cached_size(&self) -> &CachedSize {
        &self.cached_size
    }

    fn compute_serialized_size(&self) -> usize {
        let mut total = 0;
        if self.has_a() {
            total += size::int32_size(1, self.a);
        }
        total += message::repeated_scalar_size(2, FieldType::String, false, self.b.as_slice());
        if self.has_color() {
            total += size::enum_size(3, self.color.value());
        }
        total += message::repeated_scalar_size(4, FieldType::SInt32, true, self.nums.as_slice());
        if self.has_inner() {
            total += size::message_size(5, &self.inner);
        }
        total += message::repeated_message_size::<Inner>(6, FieldType::Message, self.items.as_slice());
        total + self.unknown.serialized_size()
    }

    fn to_builder(&self) -> SampleBuilder {
        SampleBuilder {
            has_bits: self.has_bits,
            a: self.a,
            b: AppendableArray::from_array(&self.b),
            color: self.color,
            nums: AppendableArray::from_array(&self.nums),
            inner: self.inner.clone(),
            items: AppendableArray::from_array(&self.items),
            unknown: self.unknown.clone(),
        }
    }

    fn is_initialized(&self) -> bool {
        (!self.has_inner() || self.inner.is_initialized())
            && message::all_initialized::<Inner>(self.items.as_slice())
    }

    fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.unknown
    }
}

#[derive(Debug, Clone)]
pub struct SampleBuilder {
    has_bits: u32,
    a: i32,
    b: AppendableArray,
    color: Color,
    nums: AppendableArray,
    inner: Inner,
    items: AppendableArray,
    unknown: UnknownFieldSet,
}

impl Default for SampleBuilder {
    fn default() -> Self {
        Self {
            has_bits: 0,
            a: 0,
            b: AppendableArray::new(ArrayValueType::Object),
            color: Color::default(),
            nums: AppendableArray::new(ArrayValueType::Int32),
            inner: Inner::default_instance(),
            items: AppendableArray::new(ArrayValueType::Object),
            unknown: UnknownFieldSet::new(),
        }
    }
}

impl SampleBuilder {
    pub fn set_a(&mut self, value: i32) -> &mut Self {
        self.a = value;
        self.has_bits |= SAMPLE_A;
        self
    }

    pub fn clear_a(&mut self) -> &mut Self {
        self.a = 0;
        self.has_bits &= !SAMPLE_A;
        self
    }

    pub fn has_a(&self) -> bool {
        self.has_bits & SAMPLE_A != 0
    }

    pub fn add_b(&mut self, value: impl Into<String>) -> Result<&mut Self> {
        self.b.push_object(value.into())?;
        Ok(self)
    }

    pub fn clear_b(&mut self) -> &mut Self {
        self.b.clear();
        self
    }

    pub fn set_color(&mut self, value: Color) -> &mut Self {
        self.color = value;
        self.has_bits |= SAMPLE_COLOR;
        self
    }

    pub fn clear_color(&mut self) -> &mut Self {
        self.color = Color::default();
        self.has_bits &= !SAMPLE_COLOR;
        self
    }

    pub fn add_nums(&mut self, value: i32) -> Result<&mut Self> {
        self.nums.push_int32(value)?;
        Ok(self)
    }

    pub fn clear_nums(&mut self) -> &mut Self {
        self.nums.clear();
        self
    }

    pub fn set_inner(&mut self, value: Inner) -> &mut Self {
        self.inner = value;
        self.has_bits |= SAMPLE_INNER;
        self
    }

    pub fn clear_inner(&mut self) -> &mut Self {
        self.inner = Inner::default_instance();
        self.has_bits &= !SAMPLE_INNER;
        self
    }

    pub fn add_items(&mut self, value: Inner) -> Result<&mut Self> {
        self.items.push_object(value)?;
        Ok(self)
    }

    pub fn clear_items(&mut self) -> &mut Self {
        self.items.clear();
        self
    }
}

impl MergeFromCodedStream for SampleBuilder {
    fn merge_from_coded_stream(
        &mut self,
        input: &mut CodedInputStream<'_>,
        registry: &ExtensionRegistry,
    ) -> Result<()> {
        loop {
            let tag = input.read_tag()?;
            match tag {
                0 => return Ok(()),
                8 => {
                    self.set_a(input.read_int32()?);
                }
                18 => {
                    message::read_repeated_scalar(input, WireType::Len, FieldType::String, &mut self.b)?;
                }
                24 => {
                    let value = input.read_enum()?;
                    match Color::from_i32(value) {
                        Some(color) => {
                            self.set_color(color);
                        }
                        None => self.unknown.add_varint(3, i64::from(value) as u64)?,
                    }
                }
                32 | 34 => {
                    message::read_repeated_scalar(
                        input,
                        tag_wire_type(tag)?,
                        FieldType::SInt32,
                        &mut self.nums,
                    )?;
                }
                42 => {
                    let mut builder = self.inner.to_builder();
                    message::read_message_field(input, FieldType::Message, 5, &mut builder, registry)?;
                    self.set_inner(builder.build_partial());
                }
                50 => {
                    message::read_repeated_message::<Inner>(
                        input,
                        FieldType::Message,
                        6,
                        registry,
                        &mut self.items,
                    )?;
                }
                _ => {
                    if !self.unknown.merge_field_from(tag, input)? {
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl MessageBuilder for SampleBuilder {
    type Message = Sample;

    fn clear(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    fn is_initialized(&self) -> bool {
        (self.has_bits & SAMPLE_INNER == 0 || self.inner.is_initialized())
            && message::all_initialized::<Inner>(self.items.as_slice())
    }

    fn merge_from(&mut self, other: &Sample) -> Result<&mut Self> {
        if other.has_a() {
            self.set_a(other.a);
        }
        self.b.append_array(&other.b)?;
        if other.has_color() {
            self.set_color(other.color);
        }
        self.nums.append_array(&other.nums)?;
        if other.has_inner() {
            let present = self.has_bits & SAMPLE_INNER != 0;
            message::merge_message(&mut self.inner, present, &other.inner)?;
            self.has_bits |= SAMPLE_INNER;
        }
        self.items.append_array(&other.items)?;
        self.unknown.merge_from(&other.unknown)?;
        Ok(self)
    }

    fn unknown_fields_mut(&mut self) -> &mut UnknownFieldSet {
        &mut self.unknown
    }

    fn build_partial(self) -> Sample {
        Sample {
            has_bits: self.has_bits,
            a: self.a,
            b: self.b.freeze(),
            color: self.color,
            nums: self.nums.freeze(),
            inner: self.inner,
            items: self.items.freeze(),
            unknown: self.unknown,
            cached_size: CachedSize::new(),
        }
    }
}

// ----------------------------------------------------------------------------
// message Host (extendable)
// ----------------------------------------------------------------------------

const HOST_NAME: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host {
    has_bits: u32,
    name: String,
    extensions: ExtensionSet,
    unknown: UnknownFieldSet,
    cached_size: CachedSize,
}

impl Host {
    pub fn has_name(&self) -> bool {
        self.has_bits & HOST_NAME != 0
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl MessageWrite for Host {
    fn write_to(&self, out: &mut CodedOutputStream<'_>) -> Result<()> {
        if self.has_name() {
            out.write_string(1, &self.name)?;
        }
        self.extensions.write_to(out)?;
        self.unknown.write_to(out)
    }

    fn serialized_size(&self) -> usize {
        self.memoized_size()
    }
}

impl Message for Host {
    type Builder = HostBuilder;

    fn descriptor() -> Descriptor {
        message_type("fixtures.Host")
    }

    fn default_instance() -> Self {
        HostBuilder::default().build_partial()
    }

    fn cached_size(&self) -> &CachedSize {
        &self.cached_size
    }

    fn compute_serialized_size(&self) -> usize {
        let mut total = 0;
        if self.has_name() {
            total += size::string_size(1, &self.name);
        }
        total + self.extensions.serialized_size() + self.unknown.serialized_size()
    }

    fn to_builder(&self) -> HostBuilder {
        HostBuilder {
            has_bits: self.has_bits,
            name: self.name.clone(),
            extensions: self.extensions.clone(),
            unknown: self.unknown.clone(),
        }
    }

    fn is_initialized(&self) -> bool {
        self.extensions.is_initialized()
    }

    fn unknown_fields(&self) -> &UnknownFieldSet {
        &self.unknown
    }
}

impl ExtendableMessage for Host {
    fn extensions(&self) -> &ExtensionSet {
        &self.extensions
    }
}

#[derive(Debug, Clone, Default)]
pub struct HostBuilder {
    has_bits: u32,
    name: String,
    extensions: ExtensionSet,
    unknown: UnknownFieldSet,
}

impl HostBuilder {
    pub fn set_name(&mut self, value: impl Into<String>) -> &mut Self {
        self.name = value.into();
        self.has_bits |= HOST_NAME;
        self
    }

    pub fn clear_name(&mut self) -> &mut Self {
        self.name.clear();
        self.has_bits &= !HOST_NAME;
        self
    }
}

impl MergeFromCodedStream for HostBuilder {
    fn merge_from_coded_stream(
        &mut self,
        input: &mut CodedInputStream<'_>,
        registry: &ExtensionRegistry,
    ) -> Result<()> {
        let descriptor = Host::descriptor();
        loop {
            let tag = input.read_tag()?;
            match tag {
                0 => return Ok(()),
                10 => {
                    self.set_name(input.read_string()?);
                }
                _ => {
                    if !extension::parse_extension_or_unknown(
                        input,
                        tag,
                        &descriptor,
                        registry,
                        &mut self.extensions,
                        &mut self.unknown,
                    )? {
                        return Ok(());
                    }
                }
            }
        }
    }
}

impl MessageBuilder for HostBuilder {
    type Message = Host;

    fn clear(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    fn is_initialized(&self) -> bool {
        self.extensions.is_initialized()
    }

    fn merge_from(&mut self, other: &Host) -> Result<&mut Self> {
        if other.has_name() {
            self.set_name(other.name.clone());
        }
        self.extensions.merge_from(&other.extensions)?;
        self.unknown.merge_from(&other.unknown)?;
        Ok(self)
    }

    fn unknown_fields_mut(&mut self) -> &mut UnknownFieldSet {
        &mut self.unknown
    }

    fn build_partial(self) -> Host {
        Host {
            has_bits: self.has_bits,
            name: self.name,
            extensions: self.extensions,
            unknown: self.unknown,
            cached_size: CachedSize::new(),
        }
    }
}

impl ExtendableBuilder for HostBuilder {
    fn extensions_mut(&mut self) -> &mut ExtensionSet {
        &mut self.extensions
    }
}
