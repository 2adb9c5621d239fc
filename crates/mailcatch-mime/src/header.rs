//! Header lines: unfolding, splitting and recognition.

use std::collections::HashMap;
use std::fmt;

/// Header names the decoder maps onto dedicated [`ParsedEmail`] fields.
///
/// [`ParsedEmail`]: crate::ParsedEmail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderKind {
    /// `X-Sender`, written by the capturing server.
    XSender,
    /// `X-Receiver`, written by the capturing server.
    XReceiver,
    /// `Received`
    Received,
    /// `MIME-Version`
    MimeVersion,
    /// `From`
    From,
    /// `To`
    To,
    /// `Cc`
    Cc,
    /// `Date`
    Date,
    /// `Subject`
    Subject,
    /// `Content-Type`
    ContentType,
    /// `Content-Transfer-Encoding`
    ContentTransferEncoding,
    /// `Return-Path`
    ReturnPath,
    /// `Message-ID`
    MessageId,
    /// `X-OriginalArrivalTime`
    XOriginalArrivalTime,
}

impl HeaderKind {
    /// Looks up a header name, ignoring case. Returns `None` for headers
    /// outside the recognized set.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "x-sender" => Self::XSender,
            "x-receiver" => Self::XReceiver,
            "received" => Self::Received,
            "mime-version" => Self::MimeVersion,
            "from" => Self::From,
            "to" => Self::To,
            "cc" => Self::Cc,
            "date" => Self::Date,
            "subject" => Self::Subject,
            "content-type" => Self::ContentType,
            "content-transfer-encoding" => Self::ContentTransferEncoding,
            "return-path" => Self::ReturnPath,
            "message-id" => Self::MessageId,
            "x-originalarrivaltime" => Self::XOriginalArrivalTime,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical header name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::XSender => "X-Sender",
            Self::XReceiver => "X-Receiver",
            Self::Received => "Received",
            Self::MimeVersion => "MIME-Version",
            Self::From => "From",
            Self::To => "To",
            Self::Cc => "Cc",
            Self::Date => "Date",
            Self::Subject => "Subject",
            Self::ContentType => "Content-Type",
            Self::ContentTransferEncoding => "Content-Transfer-Encoding",
            Self::ReturnPath => "Return-Path",
            Self::MessageId => "Message-ID",
            Self::XOriginalArrivalTime => "X-OriginalArrivalTime",
        }
    }
}

impl fmt::Display for HeaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive, multi-valued header map.
///
/// Used for headers outside the recognized set. Repeated names keep every
/// value in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Headers {
    headers: HashMap<String, Vec<String>>,
}

impl Headers {
    /// Creates a new empty header collection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a header value.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into().to_lowercase();
        let value = value.into();
        self.headers.entry(name).or_default().push(value);
    }

    /// Gets the first value for a header.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_lowercase())
            .and_then(|v| v.first().map(String::as_str))
    }

    /// Gets all values for a header.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .get(&name.to_lowercase())
            .map(|v| v.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Returns true if no headers are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Returns an iterator over all headers.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }
}

impl fmt::Display for Headers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sorted_headers: Vec<_> = self.headers.iter().collect();
        sorted_headers.sort_by(|(a, _), (b, _)| a.cmp(b));

        for (name, values) in sorted_headers {
            for value in values {
                writeln!(f, "{name}: {value}")?;
            }
        }

        Ok(())
    }
}

/// Splits a header line at its first `:` into a trimmed name and value.
///
/// Returns `None` for lines without a colon.
#[must_use]
pub fn split_header(line: &str) -> Option<(&str, &str)> {
    line.split_once(':')
        .map(|(name, value)| (name.trim(), value.trim()))
}

/// Merges folded header lines.
///
/// Within the header block (everything before the first empty line), a line
/// that is non-empty and starts with whitespace continues the previous
/// line: it is trimmed and appended after a single space. Lines after the
/// separator are copied untouched.
///
/// Returns the merged lines and the index of the empty separator line in
/// them, or `None` if the text has no separator.
#[must_use]
pub fn unfold<S: AsRef<str>>(lines: &[S]) -> (Vec<String>, Option<usize>) {
    let mut merged = Vec::with_capacity(lines.len());
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].as_ref();
        if line.is_empty() {
            let separator = merged.len();
            merged.push(String::new());
            merged.extend(lines[i + 1..].iter().map(|l| l.as_ref().to_string()));
            return (merged, Some(separator));
        }

        let mut logical = line.to_string();
        while let Some(next) = lines.get(i + 1).map(AsRef::as_ref) {
            if !next.chars().next().is_some_and(char::is_whitespace) {
                break;
            }
            logical.push(' ');
            logical.push_str(next.trim());
            i += 1;
        }
        merged.push(logical);
        i += 1;
    }

    (merged, None)
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
    fn test_header_kind_lookup() {
        assert_eq!(HeaderKind::from_name("Subject"), Some(HeaderKind::Subject));
        assert_eq!(HeaderKind::from_name("X-RECEIVER"), Some(HeaderKind::XReceiver));
        assert_eq!(
            HeaderKind::from_name("x-originalarrivaltime"),
            Some(HeaderKind::XOriginalArrivalTime)
        );
        assert_eq!(HeaderKind::from_name("X-Mailer"), None);
    }

    #[test]
    fn test_headers_add_get() {
        let mut headers = Headers::new();
        headers.add("X-Mailer", "test");
        assert_eq!(headers.get("X-Mailer"), Some("test"));
        assert_eq!(headers.get("x-mailer"), Some("test")); // Case insensitive
    }

    #[test]
    fn test_headers_keep_duplicates() {
        let mut headers = Headers::new();
        headers.add("X-Tag", "one");
        headers.add("x-tag", "two");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get_all("X-Tag"), vec!["one", "two"]);
        assert_eq!(headers.iter().count(), 2);
    }

    #[test]
    fn test_split_header() {
        assert_eq!(split_header("Subject:  Hi: there "), Some(("Subject", "Hi: there")));
        assert_eq!(split_header("no colon here"), None);
    }

    #[test]
    fn test_unfold_continuation() {
        let lines = ["Subject: first", " second", "To: a@x.com", "", "body"];
        let (merged, separator) = unfold(&lines);
        assert_eq!(merged, vec!["Subject: first second", "To: a@x.com", "", "body"]);
        assert_eq!(separator, Some(2));
    }

    #[test]
    fn test_unfold_chained_continuation() {
        let lines = ["Content-Type: multipart/mixed;", "\tcharset=utf-8;", "  boundary=XYZ", ""];
        let (merged, _) = unfold(&lines);
        assert_eq!(
            merged[0],
            "Content-Type: multipart/mixed; charset=utf-8; boundary=XYZ"
        );
    }

    #[test]
    fn test_unfold_leaves_body_untouched() {
        let lines = ["Subject: s", "", "line", "  indented"];
        let (merged, _) = unfold(&lines);
        assert_eq!(merged, vec!["Subject: s", "", "line", "  indented"]);
    }

    #[test]
    fn test_unfold_without_separator() {
        let (merged, separator) = unfold(&["Subject: s", "From: a"]);
        assert_eq!(merged.len(), 2);
        assert_eq!(separator, None);
    }

    #[test]
    fn test_headers_display() {
        let mut headers = Headers::new();
        headers.add("X-B", "2");
        headers.add("X-A", "1");
        assert_eq!(headers.to_string(), "x-a: 1\nx-b: 2\n");
    }
}
