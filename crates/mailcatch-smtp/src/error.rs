//! Error types for the SMTP receiver.

use crate::types::{Reply, ReplyCode};
use std::io;

/// Result type alias for SMTP operations.
pub type Result<T> = std::result::Result<T, Error>;

/// SMTP receiver error types.
///
/// Every variant ends the current session. Command sequencing mistakes are
/// not errors at this level; they are answered with a [`CommandError`]
/// reply and the session continues.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Protocol error (line or payload over the configured limit).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// No data arrived within the configured read timeout.
    #[error("Timed out waiting for client data")]
    Timeout,

    /// Persisting a captured message failed.
    #[error("Sink error: {0}")]
    Sink(String),

    /// The accept loop gave up after too many sessions failed in a row.
    #[error("Giving up after {0} consecutive session failures")]
    TooManyFailures(u32),
}

/// A command the client sent at the wrong time or that is not supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// Command issued in a state that does not accept it.
    #[error("Bad command sequence")]
    BadCommandSequence,

    /// Command keyword not recognized.
    #[error("Command not implemented")]
    CommandNotImplemented,
}

impl CommandError {
    /// Returns the reply code for this error.
    #[must_use]
    pub const fn code(self) -> ReplyCode {
        match self {
            Self::BadCommandSequence => ReplyCode::BAD_SEQUENCE,
            Self::CommandNotImplemented => ReplyCode::NOT_IMPLEMENTED,
        }
    }

    /// Returns the reply sent to the client.
    #[must_use]
    pub fn reply(self) -> Reply {
        Reply::new(self.code(), vec![self.to_string()])
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_replies() {
        assert_eq!(
            CommandError::BadCommandSequence.reply().to_wire(),
            "503 Bad command sequence\r\n"
        );
        assert_eq!(
            CommandError::CommandNotImplemented.reply().to_wire(),
            "502 Command not implemented\r\n"
        );
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::TooManyFailures(5).to_string(),
            "Giving up after 5 consecutive session failures"
        );
        assert_eq!(
            Error::Protocol("line too long".into()).to_string(),
            "Protocol error: line too long"
        );
    }
}
