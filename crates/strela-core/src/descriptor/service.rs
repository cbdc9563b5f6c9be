//! Service and method descriptors. There is no RPC runtime; these exist for
//! introspection.

use super::field::Target;
use super::file::FileDescriptor;
use super::message::Descriptor;
use std::fmt;

pub(crate) struct ServiceData {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) methods: Vec<usize>,
}

pub(crate) struct MethodData {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) service: usize,
    pub(crate) input_type_name: String,
    pub(crate) output_type_name: String,
    pub(crate) client_streaming: bool,
    pub(crate) server_streaming: bool,
    pub(crate) input_type: Option<Target>,
    pub(crate) output_type: Option<Target>,
}

/// Describes a service.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ServiceDescriptor {
    file: FileDescriptor,
    index: usize,
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceDescriptor")
            .field(&self.full_name())
            .finish()
    }
}

impl ServiceDescriptor {
    pub(crate) fn new(file: FileDescriptor, index: usize) -> Self {
        Self { file, index }
    }

    fn data(&self) -> &ServiceData {
        &self.file.inner.services[self.index]
    }

    /// Simple name.
    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// Fully-qualified name.
    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    /// File that declares this service.
    pub fn file(&self) -> &FileDescriptor {
        &self.file
    }

    /// Methods in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = MethodDescriptor> + '_ {
        self.data()
            .methods
            .iter()
            .map(move |&i| MethodDescriptor::new(self.file.clone(), i))
    }

    /// Method by simple name.
    pub fn method_by_name(&self, name: &str) -> Option<MethodDescriptor> {
        self.methods().find(|m| m.name() == name)
    }
}

/// Describes one method of a service.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct MethodDescriptor {
    file: FileDescriptor,
    index: usize,
}

impl fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MethodDescriptor")
            .field(&self.full_name())
            .finish()
    }
}

impl MethodDescriptor {
    pub(crate) fn new(file: FileDescriptor, index: usize) -> Self {
        Self { file, index }
    }

    fn data(&self) -> &MethodData {
        &self.file.inner.methods[self.index]
    }

    fn resolve(&self, target: Option<&Target>) -> Option<Descriptor> {
        Some(match target? {
            Target::Local(i) => Descriptor::new(self.file.clone(), *i),
            Target::Foreign(file, i) => Descriptor::new(file.clone(), *i),
        })
    }

    /// Simple name.
    pub fn name(&self) -> &str {
        &self.data().name
    }

    /// Fully-qualified name.
    pub fn full_name(&self) -> &str {
        &self.data().full_name
    }

    /// Service this method belongs to.
    pub fn service(&self) -> ServiceDescriptor {
        ServiceDescriptor::new(self.file.clone(), self.data().service)
    }

    /// Request message type.
    pub fn input_type(&self) -> Option<Descriptor> {
        self.resolve(self.data().input_type.as_ref())
    }

    /// Response message type.
    pub fn output_type(&self) -> Option<Descriptor> {
        self.resolve(self.data().output_type.as_ref())
    }

    /// Whether the client sends a stream of requests.
    pub fn is_client_streaming(&self) -> bool {
        self.data().client_streaming
    }

    /// Whether the server sends a stream of responses.
    pub fn is_server_streaming(&self) -> bool {
        self.data().server_streaming
    }
}
