//! Error types for the strela-core library.
//!
//! This module provides comprehensive error handling using the `thiserror` crate,
//! with detailed error variants for every failure mode of the runtime: wire
//! decoding, stream limits, builder validation, descriptor loading and typed
//! array access.

use crate::array::ArrayValueType;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for strela operations
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error type for all strela operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A varint ran past ten bytes without terminating
    #[error("malformed varint at offset {offset}: more than 10 bytes")]
    MalformedVarint {
        /// Absolute byte offset where the varint started
        offset: usize,
    },

    /// A read would cross the active limit or the end of input
    #[error(
        "truncated message: input ended unexpectedly in the middle of a field, \
         or a length-delimited field claimed more bytes than remain"
    )]
    TruncatedMessage,

    /// Nesting of messages or groups exceeded the configured depth
    #[error("message nesting exceeds the recursion limit of {limit}")]
    RecursionLimitExceeded {
        /// The configured limit
        limit: u32,
    },

    /// The stream would read more than its configured total size
    #[error("message exceeds the size limit of {limit} bytes")]
    SizeLimitExceeded {
        /// The configured limit
        limit: usize,
    },

    /// A tag had field number zero or an undefined wire type
    #[error("invalid tag {tag:#x}: {details}")]
    InvalidTag {
        /// The raw tag value
        tag: u32,
        /// What was wrong with it
        details: String,
    },

    /// A group ended with the wrong end-group tag
    #[error("invalid end tag: expected {expected:#x}, found {actual:#x}")]
    InvalidEndTag {
        /// The end-group tag that should have been read
        expected: u32,
        /// The tag that was actually read last
        actual: u32,
    },

    /// A string field held bytes that are not UTF-8
    #[error("string field contains invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// `build()` was called while a required field is unset
    #[error("message '{message}' is missing required fields")]
    RequiredFieldMissing {
        /// Full name of the message type that failed validation
        message: String,
    },

    /// A symbol or (type, number) pair was registered twice
    #[error("descriptor conflict for '{name}': {details}")]
    DescriptorConflict {
        /// The conflicting fully-qualified name
        name: String,
        /// Description of the existing registration
        details: String,
    },

    /// A type name could not be resolved during cross-linking
    #[error("'{name}' referenced from '{scope}' is not defined")]
    UnresolvedType {
        /// The unresolved type name as written
        name: String,
        /// Full name of the element that referenced it
        scope: String,
    },

    /// A declared default value could not be parsed for its field type
    #[error("invalid default value '{value}' for field '{field}'")]
    InvalidDefaultValue {
        /// Full name of the field
        field: String,
        /// The default value as written in the schema
        value: String,
    },

    /// Typed array accessed with the wrong element kind
    #[error("array type mismatch: expected {expected:?} elements, array holds {actual:?}")]
    ArrayTypeMismatch {
        /// Element kind the caller asked for
        expected: ArrayValueType,
        /// Element kind the array was constructed with
        actual: ArrayValueType,
    },

    /// Typed array accessed past its end
    #[error("array index {index} out of bounds (count {count})")]
    ArrayIndexOutOfBounds {
        /// Requested index
        index: usize,
        /// Number of elements in the array
        count: usize,
    },

    /// A reflective value does not fit the field it was assigned to
    #[error("value does not match field '{field}': expected {expected}")]
    ValueTypeMismatch {
        /// Full name of the field
        field: String,
        /// Description of the expected value kind
        expected: String,
    },

    /// Failed to read input file
    #[error("failed to read file '{path}': {source}")]
    FileRead {
        /// Path to the file that failed to read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// I/O failure on the underlying byte source or sink
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse a descriptor set with prost
    #[error("failed to parse descriptor set: {0}")]
    DescriptorParse(#[from] prost::DecodeError),
}

impl Error {
    /// Creates a new malformed varint error
    pub fn malformed_varint(offset: usize) -> Self {
        Self::MalformedVarint { offset }
    }

    /// Creates a new truncated message error
    pub fn truncated() -> Self {
        Self::TruncatedMessage
    }

    /// Creates a new invalid tag error
    pub fn invalid_tag(tag: u32, details: impl Into<String>) -> Self {
        Self::InvalidTag {
            tag,
            details: details.into(),
        }
    }

    /// Creates a new required field error
    pub fn required_field_missing(message: impl Into<String>) -> Self {
        Self::RequiredFieldMissing {
            message: message.into(),
        }
    }

    /// Creates a new descriptor conflict error
    pub fn descriptor_conflict(name: impl Into<String>, details: impl Into<String>) -> Self {
        Self::DescriptorConflict {
            name: name.into(),
            details: details.into(),
        }
    }

    /// Creates a new unresolved type error
    pub fn unresolved_type(name: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::UnresolvedType {
            name: name.into(),
            scope: scope.into(),
        }
    }

    /// Creates a new value mismatch error
    pub fn value_type_mismatch(field: impl Into<String>, expected: impl Into<String>) -> Self {
        Self::ValueTypeMismatch {
            field: field.into(),
            expected: expected.into(),
        }
    }

    /// Creates a new file read error
    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    /// Returns true if this error came from decoding a payload.
    ///
    /// Decode errors reject one input; anything else (schema conflicts,
    /// unresolved types, I/O) is a configuration problem.
    pub fn is_decode_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedVarint { .. }
                | Self::TruncatedMessage
                | Self::RecursionLimitExceeded { .. }
                | Self::SizeLimitExceeded { .. }
                | Self::InvalidTag { .. }
                | Self::InvalidEndTag { .. }
                | Self::InvalidUtf8(_)
                | Self::RequiredFieldMissing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::descriptor_conflict("pkg.Foo", "already defined in a.proto");
        assert!(err.to_string().contains("pkg.Foo"));
        assert!(err.to_string().contains("a.proto"));

        let err = Error::invalid_tag(0, "field number zero");
        assert!(err.to_string().contains("0x0"));
    }

    #[test]
    fn test_is_decode_error() {
        assert!(Error::truncated().is_decode_error());
        assert!(Error::malformed_varint(3).is_decode_error());
        assert!(!Error::descriptor_conflict("a", "b").is_decode_error());
        assert!(!Error::unresolved_type("a", "b").is_decode_error());
    }
}
