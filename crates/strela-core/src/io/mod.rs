//! Buffered, limit-aware coded streams.
//!
//! [`CodedInputStream`] and [`CodedOutputStream`] are the only types in the
//! crate that touch raw byte buffers; everything above them reads and writes
//! typed values. Neither stream is synchronized: use one stream per parse or
//! serialization.

mod input;
mod output;
mod ring;

pub use input::CodedInputStream;
pub use output::CodedOutputStream;
pub use ring::RingBuffer;

/// Default nesting depth for messages and groups.
pub const DEFAULT_RECURSION_LIMIT: u32 = 64;

/// Default cap on the bytes one input stream will read.
pub const DEFAULT_SIZE_LIMIT: usize = 64 << 20;

/// Default buffer size for reader-backed input and for output coalescing.
pub const DEFAULT_BUFFER_SIZE: usize = 4096;

/// Configuration for a [`CodedInputStream`]
#[derive(Debug, Clone)]
pub struct InputConfig {
    /// Maximum nesting of sub-messages and groups
    pub recursion_limit: u32,
    /// Maximum number of bytes the stream will read in total
    pub size_limit: usize,
    /// Refill buffer size for reader-backed streams
    pub buffer_size: usize,
    /// Reject string fields that are not valid UTF-8
    pub strict_utf8: bool,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            size_limit: DEFAULT_SIZE_LIMIT,
            buffer_size: DEFAULT_BUFFER_SIZE,
            strict_utf8: true,
        }
    }
}

impl InputConfig {
    /// Creates a new input config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum nesting depth
    pub fn recursion_limit(mut self, limit: u32) -> Self {
        self.recursion_limit = limit;
        self
    }

    /// Sets the total size limit in bytes
    pub fn size_limit(mut self, limit: usize) -> Self {
        self.size_limit = limit;
        self
    }

    /// Sets the refill buffer size
    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size;
        self
    }

    /// Enables or disables strict UTF-8 validation of strings
    pub fn strict_utf8(mut self, strict: bool) -> Self {
        self.strict_utf8 = strict;
        self
    }
}
