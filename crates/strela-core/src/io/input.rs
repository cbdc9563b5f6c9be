//! Coded input stream.
//!
//! Sub-messages are framed with limits instead of nested streams: the stream
//! keeps one absolute `current_limit`, and `push_limit`/`pop_limit` save and
//! restore it around a length-delimited region. Bytes of the buffer that lie
//! past the limit are hidden in `buffer_size_after_limit` so the fast paths
//! only ever look at `buffer[buffer_pos..buffer_size]`.

use super::InputConfig;
use crate::error::{Error, Result};
use crate::extension::ExtensionRegistry;
use crate::message::MergeFromCodedStream;
use crate::unknown::UnknownFieldSet;
use crate::wire::{
    decode_varint, decode_zigzag32, decode_zigzag64, make_tag, tag_field_number,
    tag_wire_type, WireType, MAX_VARINT_LEN,
};
use bytes::Bytes;
use std::borrow::Cow;
use std::fmt;
use std::io::{ErrorKind, Read};
use tracing::trace;

/// Decodes protobuf values from a byte slice or a blocking reader.
pub struct CodedInputStream<'a> {
    buffer: Cow<'a, [u8]>,
    /// Readable bytes in `buffer`, excluding anything past the limit
    buffer_size: usize,
    buffer_size_after_limit: usize,
    buffer_pos: usize,
    input: Option<Box<dyn Read + 'a>>,
    /// Bytes consumed from the source before the current buffer
    total_bytes_retired: usize,
    /// Absolute offset where the size limit counter was last reset
    size_counter_base: usize,
    /// Absolute offset of the innermost limit; `None` when unbounded
    current_limit: Option<usize>,
    last_tag: u32,
    recursion_depth: u32,
    config: InputConfig,
}

impl fmt::Debug for CodedInputStream<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodedInputStream")
            .field("position", &self.total_bytes_read())
            .field("current_limit", &self.current_limit)
            .field("last_tag", &self.last_tag)
            .field("recursion_depth", &self.recursion_depth)
            .field("reader", &self.input.is_some())
            .finish()
    }
}

impl<'a> CodedInputStream<'a> {
    /// Creates a stream over an in-memory buffer.
    pub fn from_bytes(data: &'a [u8]) -> Self {
        Self::from_bytes_with_config(data, InputConfig::default())
    }

    /// Creates a stream over an in-memory buffer with custom limits.
    pub fn from_bytes_with_config(data: &'a [u8], config: InputConfig) -> Self {
        Self {
            buffer_size: data.len(),
            buffer: Cow::Borrowed(data),
            buffer_size_after_limit: 0,
            buffer_pos: 0,
            input: None,
            total_bytes_retired: 0,
            size_counter_base: 0,
            current_limit: None,
            last_tag: 0,
            recursion_depth: 0,
            config,
        }
    }

    /// Creates a stream that pulls from a blocking reader.
    pub fn from_reader(reader: impl Read + 'a) -> Self {
        Self::with_config(reader, InputConfig::default())
    }

    /// Creates a reader-backed stream with custom limits.
    pub fn with_config(reader: impl Read + 'a, config: InputConfig) -> Self {
        Self {
            buffer: Cow::Owned(vec![0u8; config.buffer_size.max(MAX_VARINT_LEN)]),
            buffer_size: 0,
            buffer_size_after_limit: 0,
            buffer_pos: 0,
            input: Some(Box::new(reader)),
            total_bytes_retired: 0,
            size_counter_base: 0,
            current_limit: None,
            last_tag: 0,
            recursion_depth: 0,
            config,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    /// Whether string fields are validated as UTF-8.
    pub fn strict_utf8(&self) -> bool {
        self.config.strict_utf8
    }

    /// Absolute number of bytes consumed so far.
    pub fn total_bytes_read(&self) -> usize {
        self.total_bytes_retired + self.buffer_pos
    }

    /// Current nesting depth of messages and groups.
    pub fn recursion_depth(&self) -> u32 {
        self.recursion_depth
    }

    /// Restarts the count used for the size limit at the current position.
    pub fn reset_size_counter(&mut self) {
        self.size_counter_base = self.total_bytes_read();
    }

    /// The most recent tag returned by [`read_tag`](Self::read_tag), or 0.
    pub fn last_tag(&self) -> u32 {
        self.last_tag
    }

    /// Fails unless the last tag read equals `value`.
    ///
    /// Used after a nested parse to confirm it stopped on the matching
    /// end-group tag (or at the end of its limit, for `value == 0`).
    pub fn check_last_tag_was(&self, value: u32) -> Result<()> {
        if self.last_tag != value {
            return Err(Error::InvalidEndTag {
                expected: value,
                actual: self.last_tag,
            });
        }
        Ok(())
    }

    /// Returns true if the stream is at its end or at the current limit.
    pub fn is_at_end(&mut self) -> Result<bool> {
        Ok(self.buffer_pos == self.buffer_size && !self.refill_buffer(false)?)
    }

    /// Reads a tag, returning 0 at the end of input or of the current limit.
    pub fn read_tag(&mut self) -> Result<u32> {
        if self.is_at_end()? {
            self.last_tag = 0;
            return Ok(0);
        }

        let tag = self.read_raw_varint32()?;
        if tag_field_number(tag) == 0 {
            return Err(Error::invalid_tag(tag, "field number zero"));
        }
        tag_wire_type(tag)?;

        self.last_tag = tag;
        Ok(tag)
    }

    /// Discards the field introduced by `tag`.
    ///
    /// Returns false for an end-group tag so that group parsing loops stop
    /// instead of skipping past their own end marker.
    pub fn skip_field(&mut self, tag: u32) -> Result<bool> {
        trace!("skipping field {} ({:#x})", tag_field_number(tag), tag);
        match tag_wire_type(tag)? {
            WireType::Varint => {
                self.read_raw_varint64()?;
                Ok(true)
            }
            WireType::I64 => {
                self.skip_raw_bytes(8)?;
                Ok(true)
            }
            WireType::Len => {
                let length = self.read_length()?;
                self.skip_raw_bytes(length)?;
                Ok(true)
            }
            WireType::StartGroup => {
                self.enter_recursion()?;
                let skipped = self.skip_message();
                self.recursion_depth -= 1;
                skipped?;
                self.check_last_tag_was(make_tag(tag_field_number(tag), WireType::EndGroup))?;
                Ok(true)
            }
            WireType::EndGroup => Ok(false),
            WireType::I32 => {
                self.skip_raw_bytes(4)?;
                Ok(true)
            }
        }
    }

    /// Discards fields until the end of input, the current limit, or an
    /// end-group tag.
    pub fn skip_message(&mut self) -> Result<()> {
        loop {
            let tag = self.read_tag()?;
            if tag == 0 || !self.skip_field(tag)? {
                return Ok(());
            }
        }
    }

    /// Reads a `double` value.
    pub fn read_double(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_raw_little_endian64()?))
    }

    /// Reads a `float` value.
    pub fn read_float(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_raw_little_endian32()?))
    }

    /// Reads a `uint64` value.
    pub fn read_uint64(&mut self) -> Result<u64> {
        self.read_raw_varint64()
    }

    /// Reads an `int64` value.
    pub fn read_int64(&mut self) -> Result<i64> {
        Ok(self.read_raw_varint64()? as i64)
    }

    /// Reads an `int32` value; the sign-extended upper bits are dropped.
    pub fn read_int32(&mut self) -> Result<i32> {
        Ok(self.read_raw_varint64()? as i32)
    }

    /// Reads a `fixed64` value.
    pub fn read_fixed64(&mut self) -> Result<u64> {
        self.read_raw_little_endian64()
    }

    /// Reads a `fixed32` value.
    pub fn read_fixed32(&mut self) -> Result<u32> {
        self.read_raw_little_endian32()
    }

    /// Reads a `bool` value.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_raw_varint64()? != 0)
    }

    /// Reads a length-prefixed string.
    ///
    /// Invalid UTF-8 fails when strict validation is enabled and is replaced
    /// with U+FFFD otherwise.
    pub fn read_string(&mut self) -> Result<String> {
        let length = self.read_length()?;
        let data = self.read_raw_bytes(length)?;
        if self.config.strict_utf8 {
            Ok(String::from_utf8(data)?)
        } else {
            Ok(String::from_utf8_lossy(&data).into_owned())
        }
    }

    /// Reads a length-prefixed byte run.
    pub fn read_bytes(&mut self) -> Result<Bytes> {
        let length = self.read_length()?;
        Ok(Bytes::from(self.read_raw_bytes(length)?))
    }

    /// Reads a `uint32` value.
    pub fn read_uint32(&mut self) -> Result<u32> {
        self.read_raw_varint32()
    }

    /// Reads an enum number. Validity against the enum is the caller's call.
    pub fn read_enum(&mut self) -> Result<i32> {
        Ok(self.read_raw_varint64()? as i32)
    }

    /// Reads an `sfixed32` value.
    pub fn read_sfixed32(&mut self) -> Result<i32> {
        Ok(self.read_raw_little_endian32()? as i32)
    }

    /// Reads an `sfixed64` value.
    pub fn read_sfixed64(&mut self) -> Result<i64> {
        Ok(self.read_raw_little_endian64()? as i64)
    }

    /// Reads an `sint32` value.
    pub fn read_sint32(&mut self) -> Result<i32> {
        Ok(decode_zigzag32(self.read_raw_varint32()?))
    }

    /// Reads an `sint64` value.
    pub fn read_sint64(&mut self) -> Result<i64> {
        Ok(decode_zigzag64(self.read_raw_varint64()?))
    }

    /// Reads a length-delimited message into `builder`.
    pub fn read_message<B>(&mut self, builder: &mut B, registry: &ExtensionRegistry) -> Result<()>
    where
        B: MergeFromCodedStream + ?Sized,
    {
        let length = self.read_length()?;
        self.enter_recursion()?;
        let old_limit = match self.push_limit(length) {
            Ok(old_limit) => old_limit,
            Err(err) => {
                self.recursion_depth -= 1;
                return Err(err);
            }
        };
        let merged = builder.merge_from_coded_stream(self, registry);
        self.recursion_depth -= 1;
        merged?;
        self.check_last_tag_was(0)?;
        self.pop_limit(old_limit);
        Ok(())
    }

    /// Reads a group body into `builder`; the start tag was already read.
    pub fn read_group<B>(
        &mut self,
        field_number: u32,
        builder: &mut B,
        registry: &ExtensionRegistry,
    ) -> Result<()>
    where
        B: MergeFromCodedStream + ?Sized,
    {
        self.enter_recursion()?;
        let merged = builder.merge_from_coded_stream(self, registry);
        self.recursion_depth -= 1;
        merged?;
        self.check_last_tag_was(make_tag(field_number, WireType::EndGroup))
    }

    /// Reads a group of unknown fields into `set`.
    pub fn read_unknown_group(&mut self, field_number: u32, set: &mut UnknownFieldSet) -> Result<()> {
        self.read_group(field_number, set, ExtensionRegistry::empty())
    }

    /// Bounds reads to the next `byte_limit` bytes.
    ///
    /// Returns the previous limit, to be handed back to [`pop_limit`](Self::pop_limit).
    pub fn push_limit(&mut self, byte_limit: usize) -> Result<Option<usize>> {
        let new_limit = self
            .total_bytes_read()
            .checked_add(byte_limit)
            .ok_or(Error::TruncatedMessage)?;
        let old_limit = self.current_limit;

        if old_limit.map_or(false, |old| new_limit > old) {
            return Err(Error::truncated());
        }
        if new_limit - self.size_counter_base > self.config.size_limit {
            return Err(Error::SizeLimitExceeded {
                limit: self.config.size_limit,
            });
        }

        trace!("push limit {} (was {:?})", new_limit, old_limit);
        self.current_limit = Some(new_limit);
        self.recompute_buffer_size_after_limit();
        Ok(old_limit)
    }

    /// Restores the limit returned by the matching [`push_limit`](Self::push_limit).
    pub fn pop_limit(&mut self, old_limit: Option<usize>) {
        trace!("pop limit to {:?}", old_limit);
        self.current_limit = old_limit;
        self.recompute_buffer_size_after_limit();
    }

    /// Bytes left before the innermost limit, or `None` without a limit.
    pub fn bytes_until_limit(&self) -> Option<usize> {
        self.current_limit
            .map(|limit| limit.saturating_sub(self.total_bytes_read()))
    }

    /// Reads one raw byte.
    pub fn read_raw_byte(&mut self) -> Result<u8> {
        if self.buffer_pos == self.buffer_size {
            self.refill_buffer(true)?;
        }
        let byte = self.buffer[self.buffer_pos];
        self.buffer_pos += 1;
        Ok(byte)
    }

    /// Reads a varint and keeps the low 32 bits.
    pub fn read_raw_varint32(&mut self) -> Result<u32> {
        Ok(self.read_raw_varint64()? as u32)
    }

    /// Reads the length prefix of a length-delimited value.
    ///
    /// Like every 32-bit varint, only the low 32 bits count: a prefix of
    /// `2^32 + 1` is a length of one.
    pub fn read_length(&mut self) -> Result<usize> {
        Ok(self.read_raw_varint32()? as usize)
    }

    /// Reads a varint of up to ten bytes.
    pub fn read_raw_varint64(&mut self) -> Result<u64> {
        let start = self.total_bytes_read();
        match decode_varint(&self.buffer[self.buffer_pos..self.buffer_size]) {
            Ok((value, len)) => {
                self.buffer_pos += len;
                return Ok(value);
            }
            Err(Error::MalformedVarint { .. }) => return Err(Error::malformed_varint(start)),
            // The varint straddles a refill or the limit; go byte by byte.
            Err(_) => {}
        }

        let mut result = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = self.read_raw_byte()?;
            result |= u64::from(byte & 0x7F) << (7 * i);
            if byte & 0x80 == 0 {
                return Ok(result);
            }
        }
        Err(Error::malformed_varint(start))
    }

    /// Reads four little-endian bytes.
    pub fn read_raw_little_endian32(&mut self) -> Result<u32> {
        let mut bytes = [0u8; 4];
        self.read_raw_into(&mut bytes)?;
        Ok(u32::from_le_bytes(bytes))
    }

    /// Reads eight little-endian bytes.
    pub fn read_raw_little_endian64(&mut self) -> Result<u64> {
        let mut bytes = [0u8; 8];
        self.read_raw_into(&mut bytes)?;
        Ok(u64::from_le_bytes(bytes))
    }

    /// Reads exactly `size` raw bytes.
    pub fn read_raw_bytes(&mut self, size: usize) -> Result<Vec<u8>> {
        self.check_read_bounds(size)?;
        let mut data = vec![0u8; size];
        self.read_raw_into(&mut data)?;
        Ok(data)
    }

    /// Discards exactly `size` raw bytes.
    pub fn skip_raw_bytes(&mut self, size: usize) -> Result<()> {
        self.check_read_bounds(size)?;
        let mut remaining = size;
        loop {
            let available = (self.buffer_size - self.buffer_pos).min(remaining);
            self.buffer_pos += available;
            remaining -= available;
            if remaining == 0 {
                return Ok(());
            }
            self.refill_buffer(true)?;
        }
    }

    fn read_raw_into(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        loop {
            let available = (self.buffer_size - self.buffer_pos).min(out.len() - filled);
            out[filled..filled + available]
                .copy_from_slice(&self.buffer[self.buffer_pos..self.buffer_pos + available]);
            self.buffer_pos += available;
            filled += available;
            if filled == out.len() {
                return Ok(());
            }
            self.refill_buffer(true)?;
        }
    }

    // Rejects a read that would cross the limit or the size cap before any
    // bytes are allocated for it.
    fn check_read_bounds(&self, size: usize) -> Result<()> {
        let end = self
            .total_bytes_read()
            .checked_add(size)
            .ok_or(Error::TruncatedMessage)?;
        if self.current_limit.map_or(false, |limit| end > limit) {
            return Err(Error::truncated());
        }
        if end - self.size_counter_base > self.config.size_limit {
            return Err(Error::SizeLimitExceeded {
                limit: self.config.size_limit,
            });
        }
        if self.input.is_none() && size > self.buffer_size - self.buffer_pos {
            return Err(Error::truncated());
        }
        Ok(())
    }

    fn enter_recursion(&mut self) -> Result<()> {
        if self.recursion_depth >= self.config.recursion_limit {
            return Err(Error::RecursionLimitExceeded {
                limit: self.config.recursion_limit,
            });
        }
        self.recursion_depth += 1;
        Ok(())
    }

    fn recompute_buffer_size_after_limit(&mut self) {
        self.buffer_size += self.buffer_size_after_limit;
        let buffer_end = self.total_bytes_retired + self.buffer_size;
        match self.current_limit {
            Some(limit) if buffer_end > limit => {
                self.buffer_size_after_limit = buffer_end - limit;
                self.buffer_size -= self.buffer_size_after_limit;
            }
            _ => self.buffer_size_after_limit = 0,
        }
    }

    /// Pulls more bytes from the reader once the buffer is exhausted.
    ///
    /// Returns false (or fails with `TruncatedMessage` when `must_succeed`)
    /// at the current limit or the end of input.
    fn refill_buffer(&mut self, must_succeed: bool) -> Result<bool> {
        let at_limit = self
            .current_limit
            .map_or(false, |limit| self.total_bytes_retired + self.buffer_size == limit);
        if at_limit || self.buffer_size_after_limit > 0 {
            return if must_succeed {
                Err(Error::truncated())
            } else {
                Ok(false)
            };
        }

        let Some(reader) = self.input.as_mut() else {
            return if must_succeed {
                Err(Error::truncated())
            } else {
                Ok(false)
            };
        };

        let buffer = self.buffer.to_mut();
        let read = loop {
            match reader.read(buffer) {
                Ok(read) => break read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        };

        self.total_bytes_retired += self.buffer_size;
        self.buffer_pos = 0;
        self.buffer_size = read;

        if read == 0 {
            return if must_succeed {
                Err(Error::truncated())
            } else {
                Ok(false)
            };
        }

        self.recompute_buffer_size_after_limit();
        let total_read = self.total_bytes_retired + self.buffer_size + self.buffer_size_after_limit;
        if total_read - self.size_counter_base > self.config.size_limit {
            return Err(Error::SizeLimitExceeded {
                limit: self.config.size_limit,
            });
        }
        trace!("refilled {} bytes at offset {}", read, self.total_bytes_retired);
        Ok(true)
    }
}
