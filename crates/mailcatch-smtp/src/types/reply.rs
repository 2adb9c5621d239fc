//! SMTP reply types.

use std::fmt::Write as _;
use std::net::IpAddr;

/// SMTP reply sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply code (e.g., 250).
    pub code: ReplyCode,
    /// Reply message lines.
    pub message: Vec<String>,
}

impl Reply {
    /// Creates a new reply.
    #[must_use]
    #[allow(clippy::missing_const_for_fn)] // Vec is not const-compatible
    pub fn new(code: ReplyCode, message: Vec<String>) -> Self {
        Self { code, message }
    }

    /// Creates a single-line reply.
    #[must_use]
    pub fn single(code: ReplyCode, text: impl Into<String>) -> Self {
        Self::new(code, vec![text.into()])
    }

    /// `220 Welcome <ip>, SMTP Server.`
    #[must_use]
    pub fn greeting(peer: IpAddr) -> Self {
        Self::single(ReplyCode::SERVICE_READY, format!("Welcome {peer}, SMTP Server."))
    }

    /// `250 Hello <name>`
    #[must_use]
    pub fn hello(name: &str) -> Self {
        Self::single(ReplyCode::OK, format!("Hello {name}"))
    }

    /// `250 OK`
    #[must_use]
    pub fn ok() -> Self {
        Self::single(ReplyCode::OK, "OK")
    }

    /// `354 Start mail input; end with <CRLF>.<CRLF>`
    #[must_use]
    pub fn start_data() -> Self {
        Self::single(ReplyCode::START_DATA, "Start mail input; end with <CRLF>.<CRLF>")
    }

    /// `221 Good bye`
    #[must_use]
    pub fn closing() -> Self {
        Self::single(ReplyCode::CLOSING, "Good bye")
    }

    /// `451 Requested action aborted: local error in processing`
    #[must_use]
    pub fn local_error() -> Self {
        Self::single(
            ReplyCode::LOCAL_ERROR,
            "Requested action aborted: local error in processing",
        )
    }

    /// Returns the class of the reply code.
    #[must_use]
    pub const fn class(&self) -> ReplyClass {
        self.code.class()
    }

    /// Returns the full message as a single string.
    #[must_use]
    pub fn message_text(&self) -> String {
        self.message.join("\n")
    }

    /// Renders the reply as it goes on the wire.
    ///
    /// Multi-line replies use `-` after the code on every line but the last.
    #[must_use]
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        let last = self.message.len().saturating_sub(1);

        if self.message.is_empty() {
            let _ = write!(out, "{}\r\n", self.code);
        }
        for (i, line) in self.message.iter().enumerate() {
            let sep = if i == last { ' ' } else { '-' };
            let _ = write!(out, "{}{sep}{line}\r\n", self.code);
        }
        out
    }
}

impl std::fmt::Display for Reply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.message_text())
    }
}

/// SMTP reply code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReplyCode(u16);

impl ReplyCode {
    /// Creates a new reply code.
    #[must_use]
    pub const fn new(code: u16) -> Self {
        Self(code)
    }

    /// Returns the numeric code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Classifies the code by its first digit.
    #[must_use]
    pub const fn class(self) -> ReplyClass {
        match self.0 / 100 {
            2 => ReplyClass::Completed,
            3 => ReplyClass::Intermediate,
            4 => ReplyClass::Transient,
            _ => ReplyClass::Permanent,
        }
    }
}

/// How a client is expected to react to a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyClass {
    /// 2xx: the command succeeded.
    Completed,
    /// 3xx: more input is expected (DATA).
    Intermediate,
    /// 4xx: failed, may succeed if retried.
    Transient,
    /// 5xx and anything unrecognized: failed.
    Permanent,
}

impl std::fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Codes this server sends
impl ReplyCode {
    /// 220 Service ready
    pub const SERVICE_READY: Self = Self(220);
    /// 221 Service closing transmission channel
    pub const CLOSING: Self = Self(221);
    /// 250 Requested mail action okay, completed
    pub const OK: Self = Self(250);
    /// 354 Start mail input
    pub const START_DATA: Self = Self(354);
    /// 451 Local error in processing
    pub const LOCAL_ERROR: Self = Self(451);
    /// 502 Command not implemented
    pub const NOT_IMPLEMENTED: Self = Self(502);
    /// 503 Bad sequence of commands
    pub const BAD_SEQUENCE: Self = Self(503);
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
    use std::net::Ipv4Addr;

    mod reply_code_tests {
        use super::*;

        #[test]
        fn classes() {
            assert_eq!(ReplyCode::SERVICE_READY.class(), ReplyClass::Completed);
            assert_eq!(ReplyCode::CLOSING.class(), ReplyClass::Completed);
            assert_eq!(ReplyCode::START_DATA.class(), ReplyClass::Intermediate);
            assert_eq!(ReplyCode::LOCAL_ERROR.class(), ReplyClass::Transient);
            assert_eq!(ReplyCode::BAD_SEQUENCE.class(), ReplyClass::Permanent);
            assert_eq!(ReplyCode::NOT_IMPLEMENTED.class(), ReplyClass::Permanent);
            assert_eq!(ReplyCode::new(999).class(), ReplyClass::Permanent);
        }

        #[test]
        fn display() {
            assert_eq!(format!("{}", ReplyCode::OK), "250");
            assert_eq!(ReplyCode::new(503).as_u16(), 503);
        }
    }

    mod reply_tests {
        use super::*;

        #[test]
        fn wire_single_line() {
            assert_eq!(Reply::ok().to_wire(), "250 OK\r\n");
            assert_eq!(Reply::hello("client").to_wire(), "250 Hello client\r\n");
            assert_eq!(Reply::closing().to_wire(), "221 Good bye\r\n");
            assert_eq!(
                Reply::start_data().to_wire(),
                "354 Start mail input; end with <CRLF>.<CRLF>\r\n"
            );
        }

        #[test]
        fn wire_greeting() {
            let reply = Reply::greeting(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 7)));
            assert_eq!(reply.to_wire(), "220 Welcome 10.0.0.7, SMTP Server.\r\n");
        }

        #[test]
        fn wire_multi_line() {
            let reply = Reply::new(
                ReplyCode::OK,
                vec!["first".to_string(), "second".to_string()],
            );
            assert_eq!(reply.to_wire(), "250-first\r\n250 second\r\n");
        }

        #[test]
        fn wire_empty_message() {
            assert_eq!(Reply::new(ReplyCode::OK, vec![]).to_wire(), "250\r\n");
        }

        #[test]
        fn classification() {
            assert_eq!(Reply::ok().class(), ReplyClass::Completed);
            assert_eq!(Reply::local_error().class(), ReplyClass::Transient);
        }

        #[test]
        fn display() {
            assert_eq!(Reply::ok().to_string(), "250 OK");
        }
    }
}
