//! # strela-core
//!
//! A schema-driven runtime for the Protocol Buffers binary wire format.
//!
//! This crate provides the core functionality for:
//! - Encoding and decoding the wire format through buffered coded streams
//! - Typed arrays for repeated field storage
//! - Descriptors loaded from compiled `FileDescriptorProto`s
//! - The record/builder contract that generated message types implement
//! - Extensions, unknown-field retention and descriptor-driven records
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`wire`]: Wire types, field types, varint/zigzag codec and size helpers
//! - [`io`]: [`CodedInputStream`] and [`CodedOutputStream`]
//! - [`array`]: [`PbArray`] and [`AppendableArray`]
//! - [`descriptor`]: [`FileDescriptor`], [`Descriptor`], [`FieldDescriptor`] and friends
//! - [`message`]: [`Message`], [`MessageBuilder`] and the helpers generated code calls
//! - [`extension`]: [`ExtensionRegistry`] and [`ExtensionSet`]
//! - [`unknown`]: [`UnknownFieldSet`]
//! - [`reflect`]: [`DynamicMessage`], [`Value`] and the text printer
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```no_run
//! use strela_core::{DynamicMessage, FileDescriptor, MessageWrite};
//! use std::fs;
//!
//! // Load a compiled schema set
//! let files = FileDescriptor::decode_set(&fs::read("schema.pb")?)?;
//! let descriptor = files
//!     .iter()
//!     .find_map(|f| f.find_message_type("pkg.Record"))
//!     .expect("type present");
//!
//! // Decode a payload, print it and re-encode it
//! let record = DynamicMessage::decode(descriptor, &fs::read("record.bin")?)?;
//! println!("{}", record);
//! let bytes = record.to_bytes()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`DescriptorVisitor`]: Walk every element of a loaded schema
//! - [`MessageWrite`] / [`MergeFromCodedStream`]: Plug any type into the coded streams
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod array;
pub mod descriptor;
pub mod error;
pub mod extension;
pub mod io;
pub mod message;
pub mod reflect;
pub mod unknown;
pub mod wire;

// Re-export primary types for convenience
pub use array::{AppendableArray, ArrayObject, ArraySlice, ArrayValueType, PbArray};
pub use descriptor::{
    Descriptor, DescriptorPool, DescriptorVisitor, EnumDescriptor, EnumValueDescriptor,
    FieldDescriptor, FileDescriptor, Label, MethodDescriptor, ServiceDescriptor, StatsVisitor,
    Syntax,
};
pub use error::{Error, Result};
pub use extension::{ExtendableBuilder, ExtendableMessage, ExtensionRegistry, ExtensionSet};
pub use io::{CodedInputStream, CodedOutputStream, InputConfig};
pub use message::{
    CachedSize, MergeFromCodedStream, Message, MessageBuilder, MessageWrite, ProtoEnum,
};
pub use reflect::{DynamicMessage, TextFormatConfig, TextPrinter, Value};
pub use unknown::{UnknownField, UnknownFieldSet};
pub use wire::{FieldType, WireType};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
