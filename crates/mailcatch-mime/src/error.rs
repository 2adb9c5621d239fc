//! Error types for message decoding.

use std::io;
use std::string::FromUtf8Error;

/// Result type alias for decoding operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Decoding error types.
///
/// Every content error names the header or part it came from so a failing
/// test can tell which piece of the stored message was malformed.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error while reading a stored message.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Base64 decode error.
    #[error("Base64 decode error in {context}: {source}")]
    Base64 {
        /// Header or part being decoded.
        context: String,
        /// Underlying decoder error.
        #[source]
        source: base64::DecodeError,
    },

    /// Decoded bytes were not valid UTF-8.
    #[error("UTF-8 decode error in {context}: {source}")]
    Utf8 {
        /// Header or part being decoded.
        context: String,
        /// Underlying conversion error.
        #[source]
        source: FromUtf8Error,
    },

    /// Malformed encoded-word.
    #[error("Invalid encoding: {0}")]
    InvalidEncoding(String),

    /// Date header that could not be parsed.
    #[error("Invalid date in {header}: {value:?}")]
    InvalidDate {
        /// Header name.
        header: String,
        /// Raw header value.
        value: String,
    },

    /// Invalid content type.
    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    /// Markup that could not be normalized.
    #[error("Markup error: {0}")]
    Markup(String),
}

impl Error {
    /// Creates a base64 error for the given header or part.
    pub fn base64(context: impl Into<String>, source: base64::DecodeError) -> Self {
        Self::Base64 {
            context: context.into(),
            source,
        }
    }

    /// Creates a UTF-8 error for the given header or part.
    pub fn utf8(context: impl Into<String>, source: FromUtf8Error) -> Self {
        Self::Utf8 {
            context: context.into(),
            source,
        }
    }
}
