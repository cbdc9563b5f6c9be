//! Indented text rendering of records and unknown fields.
//!
//! The layout follows the protobuf text format: `name: value` per scalar,
//! `name {` ... `}` around nested records, `[full.name]` for extensions and
//! bare field numbers for unknown fields.

use super::codec::element_value;
use super::{DynamicMessage, Value};
use crate::descriptor::FieldDescriptor;
use crate::unknown::UnknownFieldSet;
use crate::wire::FieldType;
use bytes::Bytes;
use std::fmt::Write as FmtWrite;

/// Configuration for text rendering
#[derive(Debug, Clone)]
pub struct TextFormatConfig {
    /// Indentation string (default: 2 spaces)
    pub indent_str: String,
    /// Render fields that no declared field or extension matched
    pub print_unknown_fields: bool,
    /// Render enum values by name when the number is declared
    pub enum_names: bool,
}

impl Default for TextFormatConfig {
    fn default() -> Self {
        Self {
            indent_str: "  ".to_string(),
            print_unknown_fields: true,
            enum_names: true,
        }
    }
}

impl TextFormatConfig {
    /// Creates a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the indentation string
    pub fn indent_str(mut self, s: impl Into<String>) -> Self {
        self.indent_str = s.into();
        self
    }

    /// Sets whether unknown fields are rendered
    pub fn print_unknown_fields(mut self, print: bool) -> Self {
        self.print_unknown_fields = print;
        self
    }

    /// Sets whether enum values are rendered by name
    pub fn enum_names(mut self, names: bool) -> Self {
        self.enum_names = names;
        self
    }
}

/// Renders records as indented text.
#[derive(Debug, Clone, Default)]
pub struct TextPrinter {
    config: TextFormatConfig,
}

impl TextPrinter {
    /// Creates a printer with the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration
    pub fn with_config(mut self, config: TextFormatConfig) -> Self {
        self.config = config;
        self
    }

    /// Renders a record to a string.
    pub fn print(&self, message: &DynamicMessage) -> String {
        let mut output = String::new();
        // Writing into a String cannot fail
        let _ = self.write_to(message, &mut output);
        output
    }

    /// Renders a schema-less field set to a string.
    pub fn print_unknown(&self, fields: &UnknownFieldSet) -> String {
        let mut output = String::new();
        let _ = TextWriter::new(&mut output, &self.config).write_unknown(fields);
        output
    }

    /// Renders a record to a writer.
    pub fn write_to(&self, message: &DynamicMessage, w: &mut impl FmtWrite) -> std::fmt::Result {
        TextWriter::new(w, &self.config).write_message(message)
    }
}

struct TextWriter<'a, W: FmtWrite> {
    writer: &'a mut W,
    config: &'a TextFormatConfig,
    indent_level: usize,
}

impl<'a, W: FmtWrite> TextWriter<'a, W> {
    fn new(writer: &'a mut W, config: &'a TextFormatConfig) -> Self {
        Self {
            writer,
            config,
            indent_level: 0,
        }
    }

    fn indent(&mut self) {
        self.indent_level += 1;
    }

    fn dedent(&mut self) {
        self.indent_level = self.indent_level.saturating_sub(1);
    }

    fn write_indent(&mut self) -> std::fmt::Result {
        for _ in 0..self.indent_level {
            write!(self.writer, "{}", self.config.indent_str)?;
        }
        Ok(())
    }

    fn write_message(&mut self, message: &DynamicMessage) -> std::fmt::Result {
        let mut entries: Vec<(FieldDescriptor, Value)> = message
            .fields()
            .chain(message.extensions().iter())
            .collect();
        entries.sort_by_key(|(field, _)| field.number());

        for (field, value) in &entries {
            let label = field_label(field);
            match value {
                Value::List(list) => {
                    for i in 0..list.count() {
                        if let Some(element) = element_value(field.field_type(), list.as_slice(), i)
                        {
                            self.write_field(&label, field, &element)?;
                        }
                    }
                }
                value => self.write_field(&label, field, value)?,
            }
        }

        if self.config.print_unknown_fields {
            self.write_unknown(message.unknown_fields())?;
        }
        Ok(())
    }

    fn write_field(&mut self, label: &str, field: &FieldDescriptor, value: &Value) -> std::fmt::Result {
        self.write_indent()?;
        if let Value::Message(message) = value {
            writeln!(self.writer, "{} {{", label)?;
            self.indent();
            self.write_message(message)?;
            self.dedent();
            self.write_indent()?;
            return writeln!(self.writer, "}}");
        }
        write!(self.writer, "{}: ", label)?;
        self.write_scalar(field, value)?;
        writeln!(self.writer)
    }

    fn write_scalar(&mut self, field: &FieldDescriptor, value: &Value) -> std::fmt::Result {
        match value {
            Value::Bool(v) => write!(self.writer, "{}", v),
            Value::I32(v) => write!(self.writer, "{}", v),
            Value::I64(v) => write!(self.writer, "{}", v),
            Value::U32(v) => write!(self.writer, "{}", v),
            Value::U64(v) => write!(self.writer, "{}", v),
            Value::F32(v) => write!(self.writer, "{}", format_float(*v)),
            Value::F64(v) => write!(self.writer, "{}", format_float(*v)),
            Value::EnumNumber(n) => {
                let name = field
                    .enum_type()
                    .filter(|_| self.config.enum_names)
                    .and_then(|e| e.value_by_number(*n));
                match name {
                    Some(value) => write!(self.writer, "{}", value.name()),
                    None => write!(self.writer, "{}", n),
                }
            }
            Value::String(s) => write!(self.writer, "\"{}\"", escape_string(s)),
            Value::Bytes(b) => write!(self.writer, "\"{}\"", escape_bytes(b)),
            Value::Message(_) | Value::List(_) => Ok(()),
        }
    }

    fn write_unknown(&mut self, fields: &UnknownFieldSet) -> std::fmt::Result {
        for field in fields.fields() {
            let number = field.number();
            for v in field.varint_list().as_uint64_slice().unwrap_or(&[]) {
                self.write_indent()?;
                writeln!(self.writer, "{}: {}", number, v)?;
            }
            for v in field.fixed32_list().as_uint32_slice().unwrap_or(&[]) {
                self.write_indent()?;
                writeln!(self.writer, "{}: 0x{:08x}", number, v)?;
            }
            for v in field.fixed64_list().as_uint64_slice().unwrap_or(&[]) {
                self.write_indent()?;
                writeln!(self.writer, "{}: 0x{:016x}", number, v)?;
            }
            for v in field
                .length_delimited_list()
                .objects_as::<Bytes>()
                .unwrap_or_default()
            {
                self.write_indent()?;
                writeln!(self.writer, "{}: \"{}\"", number, escape_bytes(v))?;
            }
            for group in field
                .group_list()
                .objects_as::<UnknownFieldSet>()
                .unwrap_or_default()
            {
                self.write_indent()?;
                writeln!(self.writer, "{} {{", number)?;
                self.indent();
                self.write_unknown(group)?;
                self.dedent();
                self.write_indent()?;
                writeln!(self.writer, "}}")?;
            }
        }
        Ok(())
    }
}

/// Extensions print bracketed by full name; groups by their type name.
fn field_label(field: &FieldDescriptor) -> String {
    if field.is_extension() {
        return format!("[{}]", field.full_name());
    }
    if field.field_type() == FieldType::Group {
        if let Some(message_type) = field.message_type() {
            return message_type.name().to_string();
        }
    }
    field.name().to_string()
}

fn format_float<T: Copy + Into<f64> + ToString>(v: T) -> String {
    let wide: f64 = v.into();
    if wide.is_nan() {
        "nan".to_string()
    } else if wide == f64::INFINITY {
        "inf".to_string()
    } else if wide == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        v.to_string()
    }
}

/// Escape a string for text output
pub fn escape_string(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => result.push_str("\\\\"),
            '"' => result.push_str("\\\""),
            '\n' => result.push_str("\\n"),
            '\r' => result.push_str("\\r"),
            '\t' => result.push_str("\\t"),
            _ if c.is_ascii_control() => {
                result.push_str(&format!("\\x{:02x}", c as u8));
            }
            _ => result.push(c),
        }
    }
    result
}

/// Escape raw bytes for text output; anything outside printable ASCII is hex
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut result = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'\\' => result.push_str("\\\\"),
            b'"' => result.push_str("\\\""),
            b'\n' => result.push_str("\\n"),
            b'\r' => result.push_str("\\r"),
            b'\t' => result.push_str("\\t"),
            0x20..=0x7e => result.push(char::from(b)),
            _ => result.push_str(&format!("\\x{:02x}", b)),
        }
    }
    result
}
