//! Per-file symbol table.

use super::enums::{EnumDescriptor, EnumValueDescriptor};
use super::field::FieldDescriptor;
use super::file::FileDescriptor;
use super::message::Descriptor;
use super::service::{MethodDescriptor, ServiceDescriptor};
use crate::error::{Error, Result};
use std::collections::HashMap;
use tracing::trace;

/// What a registered name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    /// A package or package prefix
    Package,
    /// A message type
    Message,
    /// A field or extension
    Field,
    /// An enum type
    Enum,
    /// An enum value
    EnumValue,
    /// A service
    Service,
    /// A service method
    Method,
}

impl SymbolKind {
    /// Whether names may be nested below this symbol.
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            SymbolKind::Package | SymbolKind::Message | SymbolKind::Enum | SymbolKind::Service
        )
    }

    fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Package => "package",
            SymbolKind::Message => "message",
            SymbolKind::Field => "field",
            SymbolKind::Enum => "enum",
            SymbolKind::EnumValue => "enum value",
            SymbolKind::Service => "service",
            SymbolKind::Method => "method",
        }
    }
}

/// Index of a symbol inside the file that defines it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SymbolRef {
    /// Kind of element
    pub kind: SymbolKind,
    /// Index into the defining file's table for that kind
    pub index: usize,
}

impl SymbolRef {
    pub(crate) fn new(kind: SymbolKind, index: usize) -> Self {
        Self { kind, index }
    }
}

/// A resolved symbol.
#[derive(Debug, Clone, PartialEq)]
pub enum Symbol {
    /// A package name
    Package(String),
    /// A message type
    Message(Descriptor),
    /// A field or extension
    Field(FieldDescriptor),
    /// An enum type
    Enum(EnumDescriptor),
    /// An enum value
    EnumValue(EnumValueDescriptor),
    /// A service
    Service(ServiceDescriptor),
    /// A service method
    Method(MethodDescriptor),
}

impl Symbol {
    pub(crate) fn resolve(file: &FileDescriptor, name: &str, symbol: SymbolRef) -> Self {
        let file = file.clone();
        match symbol.kind {
            SymbolKind::Package => Symbol::Package(name.to_string()),
            SymbolKind::Message => Symbol::Message(Descriptor::new(file, symbol.index)),
            SymbolKind::Field => Symbol::Field(FieldDescriptor::new(file, symbol.index)),
            SymbolKind::Enum => Symbol::Enum(EnumDescriptor::new(file, symbol.index)),
            SymbolKind::EnumValue => {
                Symbol::EnumValue(EnumValueDescriptor::new(file, symbol.index))
            }
            SymbolKind::Service => Symbol::Service(ServiceDescriptor::new(file, symbol.index)),
            SymbolKind::Method => Symbol::Method(MethodDescriptor::new(file, symbol.index)),
        }
    }

    /// Kind of the symbol.
    pub fn kind(&self) -> SymbolKind {
        match self {
            Symbol::Package(_) => SymbolKind::Package,
            Symbol::Message(_) => SymbolKind::Message,
            Symbol::Field(_) => SymbolKind::Field,
            Symbol::Enum(_) => SymbolKind::Enum,
            Symbol::EnumValue(_) => SymbolKind::EnumValue,
            Symbol::Service(_) => SymbolKind::Service,
            Symbol::Method(_) => SymbolKind::Method,
        }
    }
}

/// Names defined by one file, plus the composite (type, number) indexes.
///
/// A pool is filled while its file is built and is read-only afterwards.
/// Lookups that miss fall through to the pools of the file's dependencies.
#[derive(Debug, Default)]
pub struct DescriptorPool {
    symbols: HashMap<String, SymbolRef>,
    fields_by_number: HashMap<(String, u32), usize>,
    enum_values_by_number: HashMap<(String, i32), usize>,
}

impl DescriptorPool {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Registers `full_name`, failing if this pool or a dependency defines it.
    ///
    /// Packages may be declared by several files.
    pub(crate) fn add_symbol(
        &mut self,
        full_name: &str,
        symbol: SymbolRef,
        dependencies: &[FileDescriptor],
    ) -> Result<()> {
        let existing = self.symbols.get(full_name).copied().or_else(|| {
            dependencies
                .iter()
                .find_map(|dep| dep.find_symbol_ref(full_name).map(|(_, s)| s))
        });

        match existing {
            Some(existing)
                if existing.kind == SymbolKind::Package && symbol.kind == SymbolKind::Package =>
            {
                self.symbols.entry(full_name.to_string()).or_insert(symbol);
                Ok(())
            }
            Some(existing) => Err(Error::descriptor_conflict(
                full_name,
                format!("already defined as a {}", existing.kind.as_str()),
            )),
            None => {
                trace!("registered {} {}", symbol.kind.as_str(), full_name);
                self.symbols.insert(full_name.to_string(), symbol);
                Ok(())
            }
        }
    }

    /// Registers every prefix of a dotted package name.
    pub(crate) fn add_package(&mut self, package: &str, dependencies: &[FileDescriptor]) -> Result<()> {
        if package.is_empty() {
            return Ok(());
        }
        let mut end = 0;
        for part in package.split('.') {
            end += part.len();
            self.add_symbol(
                &package[..end],
                SymbolRef::new(SymbolKind::Package, 0),
                dependencies,
            )?;
            end += 1;
        }
        Ok(())
    }

    /// Registers field `index` under (containing type, number).
    pub(crate) fn add_field(&mut self, containing_type: &str, number: u32, index: usize) -> Result<()> {
        let key = (containing_type.to_string(), number);
        if self.fields_by_number.contains_key(&key) {
            return Err(Error::descriptor_conflict(
                containing_type,
                format!("field number {} is already used", number),
            ));
        }
        self.fields_by_number.insert(key, index);
        Ok(())
    }

    /// Registers enum value `index` under (enum, number); aliases keep the first value.
    pub(crate) fn add_enum_value(&mut self, enum_type: &str, number: i32, index: usize) {
        self.enum_values_by_number
            .entry((enum_type.to_string(), number))
            .or_insert(index);
    }

    /// Looks up a name defined by this file only.
    pub fn get(&self, full_name: &str) -> Option<SymbolRef> {
        self.symbols.get(full_name).copied()
    }

    pub(crate) fn field_by_number(&self, containing_type: &str, number: u32) -> Option<usize> {
        self.fields_by_number
            .get(&(containing_type.to_string(), number))
            .copied()
    }

    pub(crate) fn enum_value_by_number(&self, enum_type: &str, number: i32) -> Option<usize> {
        self.enum_values_by_number
            .get(&(enum_type.to_string(), number))
            .copied()
    }

    /// Number of registered names.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns true if no name is registered.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// All names defined by this file, in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.symbols.keys().map(String::as_str)
    }
}

/// Resolves `name` as written inside `scope`, following schema scoping rules.
///
/// A leading dot makes the name absolute. Otherwise the first component is
/// searched for in `scope`, then in each enclosing scope; once it is found as
/// an aggregate the rest of the name must resolve below it.
pub(crate) fn resolve_relative<T>(
    name: &str,
    scope: &str,
    lookup: impl Fn(&str) -> Option<(T, SymbolKind)>,
) -> Option<T> {
    if let Some(absolute) = name.strip_prefix('.') {
        return lookup(absolute).map(|(found, _)| found);
    }

    let first = name.split('.').next().unwrap_or(name);
    let mut scope = scope;
    loop {
        let candidate = join_name(scope, first);
        if let Some((found, kind)) = lookup(&candidate) {
            if first.len() == name.len() {
                return Some(found);
            }
            if kind.is_aggregate() {
                return lookup(&join_name(scope, name)).map(|(found, _)| found);
            }
        }
        if scope.is_empty() {
            return None;
        }
        scope = match scope.rfind('.') {
            Some(dot) => &scope[..dot],
            None => "",
        };
    }
}

/// Joins a scope and a name with a dot, omitting it for the root scope.
pub(crate) fn join_name(scope: &str, name: &str) -> String {
    if scope.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", scope, name)
    }
}
