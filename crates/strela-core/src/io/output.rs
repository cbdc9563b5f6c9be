//! Coded output stream.

use super::ring::RingBuffer;
use super::DEFAULT_BUFFER_SIZE;
use crate::error::Result;
use crate::message::MessageWrite;
use crate::unknown::UnknownFieldSet;
use crate::wire::{encode_zigzag32, encode_zigzag64, make_tag, WireType, MAX_VARINT_LEN};
use std::fmt;
use std::io::Write;

/// Encodes protobuf values into a byte sink.
///
/// Writes are coalesced in a [`RingBuffer`]; call [`flush`](Self::flush) to
/// push them to the sink. Flushing does not close the sink.
pub struct CodedOutputStream<'a> {
    sink: Box<dyn Write + 'a>,
    buffer: RingBuffer,
    total_bytes_written: usize,
}

impl fmt::Debug for CodedOutputStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodedOutputStream")
            .field("buffered", &self.buffer.len())
            .field("total_bytes_written", &self.total_bytes_written)
            .finish()
    }
}

macro_rules! tagged_writers {
    ($($(#[$doc:meta])* $name:ident => $no_tag:ident($ty:ty), $wire:ident;)*) => {
        $(
            $(#[$doc])*
            pub fn $name(&mut self, field_number: u32, value: $ty) -> Result<()> {
                self.write_tag(field_number, WireType::$wire)?;
                self.$no_tag(value)
            }
        )*
    };
}

impl<'a> CodedOutputStream<'a> {
    /// Creates a stream over `sink` with the default buffer size.
    pub fn new(sink: impl Write + 'a) -> Self {
        Self::with_buffer_size(sink, DEFAULT_BUFFER_SIZE)
    }

    /// Creates a stream over `sink` coalescing up to `size` bytes.
    pub fn with_buffer_size(sink: impl Write + 'a, size: usize) -> Self {
        Self {
            sink: Box::new(sink),
            buffer: RingBuffer::new(size),
            total_bytes_written: 0,
        }
    }

    /// Number of bytes written so far, buffered or not.
    pub fn total_bytes_written(&self) -> usize {
        self.total_bytes_written
    }

    /// Forces all buffered bytes into the sink.
    pub fn flush(&mut self) -> Result<()> {
        self.buffer.flush_to(&mut self.sink)?;
        self.sink.flush()?;
        Ok(())
    }

    /// Writes one raw byte.
    pub fn write_raw_byte(&mut self, value: u8) -> Result<()> {
        while !self.buffer.append_byte(value) {
            self.buffer.flush_to(&mut self.sink)?;
        }
        self.total_bytes_written += 1;
        Ok(())
    }

    /// Writes raw bytes.
    pub fn write_raw_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.total_bytes_written += data.len();

        if data.len() > self.buffer.capacity() {
            // Large runs bypass the ring.
            self.buffer.flush_to(&mut self.sink)?;
            self.sink.write_all(data)?;
            return Ok(());
        }

        let mut rest = data;
        loop {
            let taken = self.buffer.append(rest);
            rest = &rest[taken..];
            if rest.is_empty() {
                return Ok(());
            }
            self.buffer.flush_to(&mut self.sink)?;
        }
    }

    /// Writes a tag for `field_number` and `wire_type`.
    pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) -> Result<()> {
        self.write_raw_varint32(make_tag(field_number, wire_type))
    }

    /// Writes a varint holding 32 bits.
    pub fn write_raw_varint32(&mut self, value: u32) -> Result<()> {
        self.write_raw_varint64(u64::from(value))
    }

    /// Writes a varint.
    pub fn write_raw_varint64(&mut self, value: u64) -> Result<()> {
        let mut scratch = [0u8; MAX_VARINT_LEN];
        let mut slice = &mut scratch[..];
        crate::wire::encode_varint(value, &mut slice);
        let len = MAX_VARINT_LEN - slice.len();
        self.write_raw_bytes(&scratch[..len])
    }

    /// Writes four little-endian bytes.
    pub fn write_raw_little_endian32(&mut self, value: u32) -> Result<()> {
        self.write_raw_bytes(&value.to_le_bytes())
    }

    /// Writes eight little-endian bytes.
    pub fn write_raw_little_endian64(&mut self, value: u64) -> Result<()> {
        self.write_raw_bytes(&value.to_le_bytes())
    }

    /// Writes a `double` value.
    pub fn write_double_no_tag(&mut self, value: f64) -> Result<()> {
        self.write_raw_little_endian64(value.to_bits())
    }

    /// Writes a `float` value.
    pub fn write_float_no_tag(&mut self, value: f32) -> Result<()> {
        self.write_raw_little_endian32(value.to_bits())
    }

    /// Writes a `uint64` value.
    pub fn write_uint64_no_tag(&mut self, value: u64) -> Result<()> {
        self.write_raw_varint64(value)
    }

    /// Writes an `int64` value.
    pub fn write_int64_no_tag(&mut self, value: i64) -> Result<()> {
        self.write_raw_varint64(value as u64)
    }

    /// Writes an `int32` value; negatives are sign-extended to ten bytes.
    pub fn write_int32_no_tag(&mut self, value: i32) -> Result<()> {
        self.write_raw_varint64(i64::from(value) as u64)
    }

    /// Writes a `fixed64` value.
    pub fn write_fixed64_no_tag(&mut self, value: u64) -> Result<()> {
        self.write_raw_little_endian64(value)
    }

    /// Writes a `fixed32` value.
    pub fn write_fixed32_no_tag(&mut self, value: u32) -> Result<()> {
        self.write_raw_little_endian32(value)
    }

    /// Writes a `bool` value.
    pub fn write_bool_no_tag(&mut self, value: bool) -> Result<()> {
        self.write_raw_byte(u8::from(value))
    }

    /// Writes a length-prefixed UTF-8 string.
    pub fn write_string_no_tag(&mut self, value: &str) -> Result<()> {
        self.write_bytes_no_tag(value.as_bytes())
    }

    /// Writes a length-prefixed byte run.
    pub fn write_bytes_no_tag(&mut self, value: &[u8]) -> Result<()> {
        self.write_raw_varint32(value.len() as u32)?;
        self.write_raw_bytes(value)
    }

    /// Writes a group body; the caller writes the surrounding tags.
    pub fn write_group_no_tag(&mut self, value: &dyn MessageWrite) -> Result<()> {
        value.write_to(self)
    }

    /// Writes a length-prefixed embedded message.
    pub fn write_message_no_tag(&mut self, value: &dyn MessageWrite) -> Result<()> {
        self.write_raw_varint32(value.serialized_size() as u32)?;
        value.write_to(self)
    }

    /// Writes a `uint32` value.
    pub fn write_uint32_no_tag(&mut self, value: u32) -> Result<()> {
        self.write_raw_varint32(value)
    }

    /// Writes an enum value; encoded exactly like `int32`.
    pub fn write_enum_no_tag(&mut self, value: i32) -> Result<()> {
        self.write_int32_no_tag(value)
    }

    /// Writes an `sfixed32` value.
    pub fn write_sfixed32_no_tag(&mut self, value: i32) -> Result<()> {
        self.write_raw_little_endian32(value as u32)
    }

    /// Writes an `sfixed64` value.
    pub fn write_sfixed64_no_tag(&mut self, value: i64) -> Result<()> {
        self.write_raw_little_endian64(value as u64)
    }

    /// Writes an `sint32` value.
    pub fn write_sint32_no_tag(&mut self, value: i32) -> Result<()> {
        self.write_raw_varint32(encode_zigzag32(value))
    }

    /// Writes an `sint64` value.
    pub fn write_sint64_no_tag(&mut self, value: i64) -> Result<()> {
        self.write_raw_varint64(encode_zigzag64(value))
    }

    tagged_writers! {
        /// Writes a `double` field.
        write_double => write_double_no_tag(f64), I64;
        /// Writes a `float` field.
        write_float => write_float_no_tag(f32), I32;
        /// Writes a `uint64` field.
        write_uint64 => write_uint64_no_tag(u64), Varint;
        /// Writes an `int64` field.
        write_int64 => write_int64_no_tag(i64), Varint;
        /// Writes an `int32` field.
        write_int32 => write_int32_no_tag(i32), Varint;
        /// Writes a `fixed64` field.
        write_fixed64 => write_fixed64_no_tag(u64), I64;
        /// Writes a `fixed32` field.
        write_fixed32 => write_fixed32_no_tag(u32), I32;
        /// Writes a `bool` field.
        write_bool => write_bool_no_tag(bool), Varint;
        /// Writes a `string` field.
        write_string => write_string_no_tag(&str), Len;
        /// Writes a `bytes` field.
        write_bytes => write_bytes_no_tag(&[u8]), Len;
        /// Writes an embedded message field.
        write_message => write_message_no_tag(&dyn MessageWrite), Len;
        /// Writes a `uint32` field.
        write_uint32 => write_uint32_no_tag(u32), Varint;
        /// Writes an enum field.
        write_enum => write_enum_no_tag(i32), Varint;
        /// Writes an `sfixed32` field.
        write_sfixed32 => write_sfixed32_no_tag(i32), I32;
        /// Writes an `sfixed64` field.
        write_sfixed64 => write_sfixed64_no_tag(i64), I64;
        /// Writes an `sint32` field.
        write_sint32 => write_sint32_no_tag(i32), Varint;
        /// Writes an `sint64` field.
        write_sint64 => write_sint64_no_tag(i64), Varint;
    }

    /// Writes a group field: start tag, body, end tag.
    pub fn write_group(&mut self, field_number: u32, value: &dyn MessageWrite) -> Result<()> {
        self.write_tag(field_number, WireType::StartGroup)?;
        self.write_group_no_tag(value)?;
        self.write_tag(field_number, WireType::EndGroup)
    }

    /// Writes a group of unknown fields.
    pub fn write_unknown_group(&mut self, field_number: u32, value: &UnknownFieldSet) -> Result<()> {
        self.write_group(field_number, value)
    }
}
