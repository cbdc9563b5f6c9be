//! File descriptors and the two-phase build that produces them.

use super::enums::{EnumData, EnumDescriptor, EnumValueData};
use super::field::{FieldData, FieldDescriptor, Label, Target};
use super::message::{Descriptor, MessageData};
use super::pool::{join_name, resolve_relative, DescriptorPool, Symbol, SymbolKind, SymbolRef};
use super::service::{MethodData, ServiceData, ServiceDescriptor};
use crate::error::{Error, Result};
use crate::wire::{FieldType, MAX_FIELD_NUMBER};
use prost::Message as _;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    FileDescriptorSet, ServiceDescriptorProto,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tracing::debug;

/// Schema language revision of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Syntax {
    /// proto2 (explicit presence, required fields, groups)
    Proto2,
    /// proto3 (packed repeated scalars by default)
    Proto3,
}

impl Syntax {
    /// Returns the syntax string
    pub fn as_str(&self) -> &'static str {
        match self {
            Syntax::Proto2 => "proto2",
            Syntax::Proto3 => "proto3",
        }
    }
}

impl TryFrom<&str> for Syntax {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        match value {
            "" | "proto2" => Ok(Syntax::Proto2),
            "proto3" => Ok(Syntax::Proto3),
            other => Err(Error::descriptor_conflict(
                other,
                "unsupported syntax declaration",
            )),
        }
    }
}

/// Everything a file defines, in flat tables indexed by the handles.
pub(crate) struct FileInner {
    pub(crate) name: String,
    pub(crate) package: String,
    pub(crate) syntax: Syntax,
    pub(crate) dependencies: Vec<FileDescriptor>,
    pub(crate) messages: Vec<MessageData>,
    pub(crate) fields: Vec<FieldData>,
    pub(crate) enums: Vec<EnumData>,
    pub(crate) enum_values: Vec<EnumValueData>,
    pub(crate) services: Vec<ServiceData>,
    pub(crate) methods: Vec<MethodData>,
    pub(crate) top_messages: Vec<usize>,
    pub(crate) top_enums: Vec<usize>,
    pub(crate) top_extensions: Vec<usize>,
    pub(crate) pool: DescriptorPool,
}

/// Describes one schema file.
///
/// Cloning is cheap; every descriptor handed out by a file keeps the file
/// alive.
#[derive(Clone)]
pub struct FileDescriptor {
    pub(crate) inner: Arc<FileInner>,
}

impl PartialEq for FileDescriptor {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for FileDescriptor {}

impl std::hash::Hash for FileDescriptor {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.inner).hash(state);
    }
}

impl fmt::Debug for FileDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileDescriptor")
            .field("name", &self.inner.name)
            .field("package", &self.inner.package)
            .finish()
    }
}

impl FileDescriptor {
    /// Builds a file from its proto and its already-built dependencies.
    ///
    /// Every name in `proto.dependency` must be matched by a file in
    /// `dependencies`. Fails on duplicate symbols, duplicate field numbers
    /// and unresolvable type names.
    pub fn new(proto: FileDescriptorProto, dependencies: &[FileDescriptor]) -> Result<Self> {
        let mut builder = FileBuilder::new(&proto, dependencies)?;
        builder.allocate(&proto)?;
        builder.link()?;
        let file = builder.finish();
        debug!(
            "built {} ({} messages, {} enums, {} services)",
            file.name(),
            file.inner.messages.len(),
            file.inner.enums.len(),
            file.inner.services.len()
        );
        Ok(file)
    }

    /// Decodes a serialized `FileDescriptorProto` and builds it.
    pub fn decode(data: &[u8], dependencies: &[FileDescriptor]) -> Result<Self> {
        Self::new(FileDescriptorProto::decode(data)?, dependencies)
    }

    /// Builds every file of a descriptor set, dependencies first.
    pub fn from_set(set: FileDescriptorSet) -> Result<Vec<Self>> {
        let mut built: HashMap<String, FileDescriptor> = HashMap::new();
        let mut order = Vec::with_capacity(set.file.len());
        let mut pending = set.file;

        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for proto in pending {
                let ready: Option<Vec<FileDescriptor>> = proto
                    .dependency
                    .iter()
                    .map(|name| built.get(name).cloned())
                    .collect();
                match ready {
                    Some(dependencies) => {
                        let file = Self::new(proto, &dependencies)?;
                        built.insert(file.name().to_string(), file.clone());
                        order.push(file);
                    }
                    None => deferred.push(proto),
                }
            }
            if deferred.len() == before {
                let proto = &deferred[0];
                let missing = proto
                    .dependency
                    .iter()
                    .find(|name| !built.contains_key(*name))
                    .cloned()
                    .unwrap_or_default();
                return Err(Error::unresolved_type(missing, proto.name()));
            }
            pending = deferred;
        }
        Ok(order)
    }

    /// Decodes a serialized `FileDescriptorSet` and builds all of its files.
    pub fn decode_set(data: &[u8]) -> Result<Vec<Self>> {
        Self::from_set(FileDescriptorSet::decode(data)?)
    }

    /// File name, e.g. `foo/bar.proto`.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Declared package, or an empty string.
    pub fn package(&self) -> &str {
        &self.inner.package
    }

    /// Declared syntax.
    pub fn syntax(&self) -> Syntax {
        self.inner.syntax
    }

    /// Files this file imports.
    pub fn dependencies(&self) -> &[FileDescriptor] {
        &self.inner.dependencies
    }

    /// This file's symbol table.
    pub fn pool(&self) -> &DescriptorPool {
        &self.inner.pool
    }

    /// Top-level message types in declaration order.
    pub fn message_types(&self) -> impl Iterator<Item = Descriptor> + '_ {
        self.inner
            .top_messages
            .iter()
            .map(move |&i| Descriptor::new(self.clone(), i))
    }

    /// Top-level enum types in declaration order.
    pub fn enum_types(&self) -> impl Iterator<Item = EnumDescriptor> + '_ {
        self.inner
            .top_enums
            .iter()
            .map(move |&i| EnumDescriptor::new(self.clone(), i))
    }

    /// Services in declaration order.
    pub fn services(&self) -> impl Iterator<Item = ServiceDescriptor> + '_ {
        (0..self.inner.services.len()).map(move |i| ServiceDescriptor::new(self.clone(), i))
    }

    /// Top-level extensions in declaration order.
    pub fn extensions(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.inner
            .top_extensions
            .iter()
            .map(move |&i| FieldDescriptor::new(self.clone(), i))
    }

    /// Every extension declared anywhere in this file.
    pub fn all_extensions(&self) -> impl Iterator<Item = FieldDescriptor> + '_ {
        self.inner
            .fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_extension)
            .map(move |(i, _)| FieldDescriptor::new(self.clone(), i))
    }

    /// Every message type declared anywhere in this file.
    pub fn all_message_types(&self) -> impl Iterator<Item = Descriptor> + '_ {
        (0..self.inner.messages.len()).map(move |i| Descriptor::new(self.clone(), i))
    }

    /// Top-level message type by simple name.
    pub fn message_type_by_name(&self, name: &str) -> Option<Descriptor> {
        self.message_types().find(|m| m.name() == name)
    }

    /// Top-level enum type by simple name.
    pub fn enum_type_by_name(&self, name: &str) -> Option<EnumDescriptor> {
        self.enum_types().find(|e| e.name() == name)
    }

    /// Service by simple name.
    pub fn service_by_name(&self, name: &str) -> Option<ServiceDescriptor> {
        self.services().find(|s| s.name() == name)
    }

    /// Top-level extension by simple name.
    pub fn extension_by_name(&self, name: &str) -> Option<FieldDescriptor> {
        self.extensions().find(|e| e.name() == name)
    }

    /// Finds a fully-qualified name in this file or its dependencies.
    pub fn find_symbol(&self, full_name: &str) -> Option<Symbol> {
        let full_name = full_name.strip_prefix('.').unwrap_or(full_name);
        self.find_symbol_ref(full_name)
            .map(|(file, symbol)| Symbol::resolve(&file, full_name, symbol))
    }

    /// Finds a message type by fully-qualified name.
    pub fn find_message_type(&self, full_name: &str) -> Option<Descriptor> {
        match self.find_symbol(full_name)? {
            Symbol::Message(message) => Some(message),
            _ => None,
        }
    }

    /// Finds an enum type by fully-qualified name.
    pub fn find_enum_type(&self, full_name: &str) -> Option<EnumDescriptor> {
        match self.find_symbol(full_name)? {
            Symbol::Enum(enum_type) => Some(enum_type),
            _ => None,
        }
    }

    /// Resolves `name` as it would be written inside `scope`.
    pub fn lookup_relative(&self, name: &str, scope: &str) -> Option<Symbol> {
        resolve_relative(name, scope, |candidate| {
            self.find_symbol(candidate).map(|symbol| {
                let kind = symbol.kind();
                (symbol, kind)
            })
        })
    }

    pub(crate) fn find_symbol_ref(&self, full_name: &str) -> Option<(FileDescriptor, SymbolRef)> {
        if let Some(symbol) = self.inner.pool.get(full_name) {
            return Some((self.clone(), symbol));
        }
        self.inner
            .dependencies
            .iter()
            .find_map(|dep| dep.find_symbol_ref(full_name))
    }
}

/// Mutable state of a file between allocation and linking.
struct FileBuilder<'d> {
    inner: FileInner,
    dependencies: &'d [FileDescriptor],
    proto3: bool,
}

impl<'d> FileBuilder<'d> {
    fn new(proto: &FileDescriptorProto, dependencies: &'d [FileDescriptor]) -> Result<Self> {
        let syntax = Syntax::try_from(proto.syntax())?;

        let mut imported = Vec::with_capacity(proto.dependency.len());
        for name in &proto.dependency {
            let dep = dependencies
                .iter()
                .find(|d| d.name() == name)
                .ok_or_else(|| Error::unresolved_type(name.as_str(), proto.name()))?;
            imported.push(dep.clone());
        }

        Ok(Self {
            inner: FileInner {
                name: proto.name().to_string(),
                package: proto.package().to_string(),
                syntax,
                dependencies: imported,
                messages: Vec::new(),
                fields: Vec::new(),
                enums: Vec::new(),
                enum_values: Vec::new(),
                services: Vec::new(),
                methods: Vec::new(),
                top_messages: Vec::new(),
                top_enums: Vec::new(),
                top_extensions: Vec::new(),
                pool: DescriptorPool::new(),
            },
            dependencies,
            proto3: syntax == Syntax::Proto3,
        })
    }

    fn add_symbol(&mut self, full_name: &str, kind: SymbolKind, index: usize) -> Result<()> {
        self.inner
            .pool
            .add_symbol(full_name, SymbolRef::new(kind, index), self.dependencies)
    }

    /// Phase one: create every element and register its name.
    fn allocate(&mut self, proto: &FileDescriptorProto) -> Result<()> {
        let package = self.inner.package.clone();
        self.inner.pool.add_package(&package, self.dependencies)?;

        for message in &proto.message_type {
            let index = self.allocate_message(message, &package, None)?;
            self.inner.top_messages.push(index);
        }
        for enum_type in &proto.enum_type {
            let index = self.allocate_enum(enum_type, &package, None)?;
            self.inner.top_enums.push(index);
        }
        for (i, extension) in proto.extension.iter().enumerate() {
            let index = self.allocate_field(extension, &package, None, i, true)?;
            self.inner.top_extensions.push(index);
        }
        for service in &proto.service {
            self.allocate_service(service, &package)?;
        }
        Ok(())
    }

    fn allocate_message(
        &mut self,
        proto: &DescriptorProto,
        scope: &str,
        parent: Option<usize>,
    ) -> Result<usize> {
        let full_name = join_name(scope, proto.name());
        let index = self.inner.messages.len();
        self.inner.messages.push(MessageData {
            name: proto.name().to_string(),
            full_name: full_name.clone(),
            parent,
            fields: Vec::new(),
            nested_types: Vec::new(),
            enum_types: Vec::new(),
            extensions: Vec::new(),
            extension_ranges: proto
                .extension_range
                .iter()
                .map(|r| r.start().max(0) as u32..r.end().max(0) as u32)
                .collect(),
            fields_by_name: HashMap::new(),
            fields_by_number: HashMap::new(),
            has_required: OnceLock::new(),
        });
        self.add_symbol(&full_name, SymbolKind::Message, index)?;

        for (i, field) in proto.field.iter().enumerate() {
            let field_index = self.allocate_field(field, &full_name, Some(index), i, false)?;
            let number = self.inner.fields[field_index].number;
            self.inner.pool.add_field(&full_name, number, field_index)?;
            let message = &mut self.inner.messages[index];
            message.fields.push(field_index);
            message
                .fields_by_name
                .insert(field.name().to_string(), field_index);
            message.fields_by_number.insert(number, field_index);
        }
        for nested in &proto.nested_type {
            let nested_index = self.allocate_message(nested, &full_name, Some(index))?;
            self.inner.messages[index].nested_types.push(nested_index);
        }
        for enum_type in &proto.enum_type {
            let enum_index = self.allocate_enum(enum_type, &full_name, Some(index))?;
            self.inner.messages[index].enum_types.push(enum_index);
        }
        for (i, extension) in proto.extension.iter().enumerate() {
            let field_index = self.allocate_field(extension, &full_name, Some(index), i, true)?;
            self.inner.messages[index].extensions.push(field_index);
        }
        Ok(index)
    }

    fn allocate_field(
        &mut self,
        proto: &FieldDescriptorProto,
        scope: &str,
        parent: Option<usize>,
        index_in_parent: usize,
        is_extension: bool,
    ) -> Result<usize> {
        let full_name = join_name(scope, proto.name());
        let number = proto.number();
        if number <= 0 || number as u32 > MAX_FIELD_NUMBER {
            return Err(Error::descriptor_conflict(
                full_name,
                format!("field number {} is out of range", number),
            ));
        }

        let label = match proto.label {
            Some(2) => Label::Required,
            Some(3) => Label::Repeated,
            _ => Label::Optional,
        };
        let declared_type = proto.r#type.and_then(FieldType::from_i32);
        let packed = proto.options.as_ref().and_then(|o| o.packed);

        let index = self.inner.fields.len();
        self.inner.fields.push(FieldData {
            name: proto.name().to_string(),
            full_name: full_name.clone(),
            number: number as u32,
            label,
            declared_type,
            type_name: proto.type_name().to_string(),
            extendee_name: proto.extendee().to_string(),
            json_name: proto.json_name.clone(),
            default_literal: proto.default_value.clone(),
            packed: packed.unwrap_or(self.proto3 && label == Label::Repeated),
            parent,
            index_in_parent,
            is_extension,
            field_type: declared_type.unwrap_or(FieldType::Message),
            target: None,
            extendee: None,
            default: None,
        });
        self.add_symbol(&full_name, SymbolKind::Field, index)?;
        Ok(index)
    }

    fn allocate_enum(
        &mut self,
        proto: &EnumDescriptorProto,
        scope: &str,
        parent: Option<usize>,
    ) -> Result<usize> {
        let full_name = join_name(scope, proto.name());
        let index = self.inner.enums.len();
        self.inner.enums.push(EnumData {
            name: proto.name().to_string(),
            full_name: full_name.clone(),
            parent,
            values: Vec::new(),
        });
        self.add_symbol(&full_name, SymbolKind::Enum, index)?;

        for (i, value) in proto.value.iter().enumerate() {
            // Values are siblings of their enum, not children of it.
            let value_name = join_name(scope, value.name());
            let value_index = self.inner.enum_values.len();
            self.inner.enum_values.push(EnumValueData {
                name: value.name().to_string(),
                full_name: value_name.clone(),
                number: value.number(),
                enum_index: index,
                index_in_enum: i,
            });
            self.add_symbol(&value_name, SymbolKind::EnumValue, value_index)?;
            self.inner
                .pool
                .add_enum_value(&full_name, value.number(), value_index);
            self.inner.enums[index].values.push(value_index);
        }
        Ok(index)
    }

    fn allocate_service(&mut self, proto: &ServiceDescriptorProto, scope: &str) -> Result<()> {
        let full_name = join_name(scope, proto.name());
        let index = self.inner.services.len();
        self.inner.services.push(ServiceData {
            name: proto.name().to_string(),
            full_name: full_name.clone(),
            methods: Vec::new(),
        });
        self.add_symbol(&full_name, SymbolKind::Service, index)?;

        for method in &proto.method {
            let method_name = join_name(&full_name, method.name());
            let method_index = self.inner.methods.len();
            self.inner.methods.push(MethodData {
                name: method.name().to_string(),
                full_name: method_name.clone(),
                service: index,
                input_type_name: method.input_type().to_string(),
                output_type_name: method.output_type().to_string(),
                client_streaming: method.client_streaming(),
                server_streaming: method.server_streaming(),
                input_type: None,
                output_type: None,
            });
            self.add_symbol(&method_name, SymbolKind::Method, method_index)?;
            self.inner.services[index].methods.push(method_index);
        }
        Ok(())
    }

    /// Resolves a name against this file's table and then its dependencies.
    fn resolve(&self, name: &str, scope: &str) -> Option<(Target, SymbolKind)> {
        resolve_relative(name, scope, |candidate| {
            if let Some(symbol) = self.inner.pool.get(candidate) {
                return Some(((Target::Local(symbol.index), symbol.kind), symbol.kind));
            }
            self.dependencies.iter().find_map(|dep| {
                dep.find_symbol_ref(candidate).map(|(file, symbol)| {
                    (
                        (Target::Foreign(file, symbol.index), symbol.kind),
                        symbol.kind,
                    )
                })
            })
        })
    }

    fn resolve_message(&self, name: &str, scope: &str, referrer: &str) -> Result<Target> {
        match self.resolve(name, scope) {
            Some((target, SymbolKind::Message)) => Ok(target),
            _ => Err(Error::unresolved_type(name, referrer)),
        }
    }

    fn scope_of(&self, parent: Option<usize>) -> String {
        match parent {
            Some(p) => self.inner.messages[p].full_name.clone(),
            None => self.inner.package.clone(),
        }
    }

    /// Phase two: resolve every type reference and compute defaults.
    fn link(&mut self) -> Result<()> {
        for index in 0..self.inner.fields.len() {
            self.link_field(index)?;
        }
        for index in 0..self.inner.methods.len() {
            let method = &self.inner.methods[index];
            let scope = self.inner.services[method.service].full_name.clone();
            let input = self.resolve_message(&method.input_type_name, &scope, &method.full_name)?;
            let output =
                self.resolve_message(&method.output_type_name, &scope, &method.full_name)?;
            let method = &mut self.inner.methods[index];
            method.input_type = Some(input);
            method.output_type = Some(output);
        }
        Ok(())
    }

    fn link_field(&mut self, index: usize) -> Result<()> {
        let field = &self.inner.fields[index];
        let scope = self.scope_of(field.parent);
        let full_name = field.full_name.clone();

        let (field_type, target) = if field.type_name.is_empty() {
            match field.declared_type {
                Some(FieldType::Message | FieldType::Group) | None => {
                    return Err(Error::unresolved_type(field.type_name.as_str(), full_name));
                }
                Some(declared) => (declared, None),
            }
        } else {
            match self.resolve(&field.type_name, &scope) {
                Some((target, SymbolKind::Message)) => {
                    let kind = if field.declared_type == Some(FieldType::Group) {
                        FieldType::Group
                    } else {
                        FieldType::Message
                    };
                    (kind, Some(target))
                }
                Some((target, SymbolKind::Enum)) => (FieldType::Enum, Some(target)),
                _ => return Err(Error::unresolved_type(field.type_name.as_str(), full_name)),
            }
        };

        let extendee = if field.is_extension {
            let target = self.resolve_message(&field.extendee_name, &scope, &full_name)?;
            let (extendee_name, in_range) = self.message_info(&target, field.number);
            if !in_range {
                return Err(Error::descriptor_conflict(
                    full_name,
                    format!("{} has no extension range covering {}", extendee_name, field.number),
                ));
            }
            let number = field.number;
            self.inner.pool.add_field(&extendee_name, number, index)?;
            Some(target)
        } else {
            None
        };

        let default = self.compute_default(index, field_type, target.as_ref())?;

        let field = &mut self.inner.fields[index];
        field.field_type = field_type;
        field.target = target;
        field.extendee = extendee;
        field.default = default;
        if !field_type.is_packable() {
            field.packed = false;
        }
        Ok(())
    }

    /// Full name of a resolved message and whether `number` is in one of its extension ranges.
    fn message_info(&self, target: &Target, number: u32) -> (String, bool) {
        match target {
            Target::Local(i) => {
                let message = &self.inner.messages[*i];
                let in_range = message
                    .extension_ranges
                    .iter()
                    .any(|r| r.contains(&number));
                (message.full_name.clone(), in_range)
            }
            Target::Foreign(file, i) => {
                let message = Descriptor::new(file.clone(), *i);
                (message.full_name().to_string(), message.is_extension_number(number))
            }
        }
    }

    fn compute_default(
        &self,
        index: usize,
        field_type: FieldType,
        target: Option<&Target>,
    ) -> Result<Option<crate::reflect::Value>> {
        let field = &self.inner.fields[index];
        if field.label == Label::Repeated
            || matches!(field_type, FieldType::Message | FieldType::Group)
        {
            return Ok(None);
        }

        if field_type == FieldType::Enum {
            let number = match (target, field.default_literal.as_deref()) {
                (Some(target), Some(literal)) => self.enum_value_number(target, literal),
                (Some(target), None) => self.first_enum_value(target),
                (None, _) => None,
            };
            return match number {
                Some(number) => Ok(Some(crate::reflect::Value::EnumNumber(number))),
                None => Err(Error::InvalidDefaultValue {
                    field: field.full_name.clone(),
                    value: field.default_literal.clone().unwrap_or_default(),
                }),
            };
        }

        super::field::parse_default(&field.full_name, field_type, field.default_literal.as_deref())
            .map(Some)
    }

    fn enum_value_number(&self, target: &Target, name: &str) -> Option<i32> {
        match target {
            Target::Local(i) => self.inner.enums[*i]
                .values
                .iter()
                .map(|&v| &self.inner.enum_values[v])
                .find(|v| v.name == name)
                .map(|v| v.number),
            Target::Foreign(file, i) => EnumDescriptor::new(file.clone(), *i)
                .value_by_name(name)
                .map(|v| v.number()),
        }
    }

    fn first_enum_value(&self, target: &Target) -> Option<i32> {
        match target {
            Target::Local(i) => self.inner.enums[*i]
                .values
                .first()
                .map(|&v| self.inner.enum_values[v].number),
            Target::Foreign(file, i) => EnumDescriptor::new(file.clone(), *i)
                .values()
                .next()
                .map(|v| v.number()),
        }
    }

    fn finish(self) -> FileDescriptor {
        FileDescriptor {
            inner: Arc::new(self.inner),
        }
    }
}
