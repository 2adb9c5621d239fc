//! SMTP commands understood by the receiver.

use crate::types::Address;
use std::fmt;

/// SMTP command received from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// HELO - Simple greeting
    Helo {
        /// Client hostname
        hostname: String,
    },
    /// EHLO - Extended greeting
    Ehlo {
        /// Client hostname
        hostname: String,
    },
    /// MAIL FROM - Start mail transaction
    MailFrom {
        /// Sender address
        from: Address,
    },
    /// RCPT TO - Add recipient
    RcptTo {
        /// Recipient address
        to: Address,
    },
    /// DATA - Begin message data
    Data,
    /// QUIT - Close connection
    Quit,
    /// Anything else, kept verbatim for logging.
    Unknown(String),
}

impl Command {
    /// Returns the command keyword.
    #[must_use]
    pub const fn keyword(&self) -> &'static str {
        match self {
            Self::Helo { .. } => "HELO",
            Self::Ehlo { .. } => "EHLO",
            Self::MailFrom { .. } => "MAIL",
            Self::RcptTo { .. } => "RCPT",
            Self::Data => "DATA",
            Self::Quit => "QUIT",
            Self::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Helo { hostname } => write!(f, "HELO {hostname}"),
            Self::Ehlo { hostname } => write!(f, "EHLO {hostname}"),
            Self::MailFrom { from } => write!(f, "MAIL FROM:<{from}>"),
            Self::RcptTo { to } => write!(f, "RCPT TO:<{to}>"),
            Self::Data => f.write_str("DATA"),
            Self::Quit => f.write_str("QUIT"),
            Self::Unknown(line) => f.write_str(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_helo_display() {
        let cmd = Command::Helo {
            hostname: "client.example.com".to_string(),
        };
        assert_eq!(cmd.to_string(), "HELO client.example.com");
        assert_eq!(cmd.keyword(), "HELO");
    }

    #[test]
    fn test_mail_from_display() {
        let cmd = Command::MailFrom {
            from: Address::new("sender@example.com"),
        };
        assert_eq!(cmd.to_string(), "MAIL FROM:<sender@example.com>");
    }

    #[test]
    fn test_rcpt_to_display() {
        let cmd = Command::RcptTo {
            to: Address::new("recipient@example.com"),
        };
        assert_eq!(cmd.to_string(), "RCPT TO:<recipient@example.com>");
    }

    #[test]
    fn test_unknown_display() {
        let cmd = Command::Unknown("NOOP".to_string());
        assert_eq!(cmd.to_string(), "NOOP");
        assert_eq!(cmd.keyword(), "UNKNOWN");
    }
}
