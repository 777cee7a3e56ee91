//! Error types for data parsing in aquarium-types.

use thiserror::Error;

/// Errors that can occur when encoding or decoding controller payloads.
///
/// This error type is platform-agnostic and does not include
/// BLE-specific errors (those belong in aquarium-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The payload is shorter than its fixed layout requires.
    #[error("Invalid data: payload requires {expected} bytes, got {actual}")]
    InsufficientBytes {
        /// Number of bytes the layout requires.
        expected: usize,
        /// Number of bytes received.
        actual: usize,
    },

    /// A text payload was not valid UTF-8.
    #[error("Invalid data: payload is not valid UTF-8")]
    InvalidUtf8,

    /// A field held a value outside its allowed range or format.
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// A text frame did not start with any known prefix.
    #[error("Unknown frame: {0:?}")]
    UnknownFrame(String),
}

impl ParseError {
    /// Create an invalid value error.
    pub fn invalid_value(message: impl Into<String>) -> Self {
        Self::InvalidValue(message.into())
    }
}

/// Result type alias using aquarium-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
