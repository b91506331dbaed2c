//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors raised while turning values into payload bytes or back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A value cannot be represented in the payload format.
    #[error("encoding failed: {message}")]
    EncodingFailed {
        /// What could not be encoded.
        message: String,
    },

    /// A map holds the same key twice.
    #[error("duplicate map key: {key}")]
    DuplicateKey {
        /// Debug rendering of the repeated key.
        key: String,
    },

    /// Payload bytes are well-formed CBOR but not the expected shape.
    #[error("decoding failed: {message}")]
    DecodingFailed {
        /// What was wrong with the payload.
        message: String,
    },

    /// The payload is tagged with a different type than the one requested.
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        /// Type identifier the caller asked for.
        expected: String,
        /// Type identifier carried by the payload.
        found: String,
    },

    /// Floats have no canonical form here.
    #[error("float values are forbidden in canonical CBOR")]
    FloatForbidden,

    /// Indefinite-length items are forbidden.
    #[error("indefinite-length items are forbidden")]
    IndefiniteLengthForbidden,

    /// Text string is not valid UTF-8.
    #[error("invalid UTF-8 string")]
    InvalidUtf8,

    /// Input ended in the middle of an item.
    #[error("unexpected end of input")]
    UnexpectedEof,

    /// Bytes remain after the top-level item.
    #[error("{remaining} trailing bytes after payload")]
    TrailingBytes {
        /// Number of unread bytes.
        remaining: usize,
    },

    /// Structural rule violated (ordering, shortest form, reserved values).
    #[error("invalid CBOR structure: {message}")]
    InvalidStructure {
        /// Which rule was violated.
        message: String,
    },

    /// CBOR construct outside the supported subset.
    #[error("unsupported CBOR type: {type_name}")]
    UnsupportedType {
        /// Name of the construct.
        type_name: String,
    },

    /// A declared length exceeds what the decoder will allocate.
    #[error("size limit exceeded: claimed {claimed}, max {max_allowed}")]
    SizeLimitExceeded {
        /// Length declared in the input.
        claimed: u64,
        /// Largest accepted length.
        max_allowed: u64,
    },

    /// Negative integer below `i64::MIN`.
    #[error("integer overflow")]
    IntegerOverflow,
}

impl CodecError {
    /// Create an encoding failed error.
    pub fn encoding_failed(message: impl Into<String>) -> Self {
        Self::EncodingFailed {
            message: message.into(),
        }
    }

    /// Create a decoding failed error.
    pub fn decoding_failed(message: impl Into<String>) -> Self {
        Self::DecodingFailed {
            message: message.into(),
        }
    }

    /// Create an invalid structure error.
    pub fn invalid_structure(message: impl Into<String>) -> Self {
        Self::InvalidStructure {
            message: message.into(),
        }
    }

    /// Create an unsupported type error.
    pub fn unsupported_type(type_name: impl Into<String>) -> Self {
        Self::UnsupportedType {
            type_name: type_name.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Returns true if the error was raised while producing bytes.
    pub fn is_encode_side(&self) -> bool {
        matches!(
            self,
            CodecError::EncodingFailed { .. } | CodecError::DuplicateKey { .. }
        )
    }
}
