//! Error types shared by the protocol codecs

use thiserror::Error;

use crate::types::IdentifierError;

/// Errors produced by the compact binary codecs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Input ended before a field could be read
    #[error("buffer too short: need {needed} bytes, have {available}")]
    BufferTooShort {
        /// Number of bytes needed
        needed: usize,
        /// Number of bytes available
        available: usize,
    },

    /// PDU header carries an unknown message class
    #[error("unknown message class: {0}")]
    UnknownMessageClass(u8),

    /// Bytes left over after the message body
    #[error("{0} trailing bytes after message body")]
    TrailingData(usize),

    /// The length field in the header does not match the body
    #[error("length mismatch: header says {declared}, body has {actual}")]
    LengthMismatch {
        /// Length from the header
        declared: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// A field carries a value outside its domain
    #[error("invalid value {value} for {field}")]
    InvalidValue {
        /// Field name
        field: &'static str,
        /// Offending value
        value: u64,
    },

    /// A string field is not valid UTF-8
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),

    /// Identifier decoding failed
    #[error(transparent)]
    Identifier(#[from] IdentifierError),
}

/// Result type for codec operations
pub type Result<T> = std::result::Result<T, CodecError>;
