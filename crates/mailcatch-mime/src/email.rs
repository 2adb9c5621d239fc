//! Decoding of a captured `.eml` blob into a [`ParsedEmail`].

use crate::content_type::ContentType;
use crate::date::{parse_arrival_time, parse_date};
use crate::encoding::{contains_encoded_word, decode_base64_text, decode_encoded_words};
use crate::error::Result;
use crate::header::{HeaderKind, Headers, split_header, unfold};
use crate::html::sanitize_html;
use crate::multipart::{Collected, TransferEncoding, walk};
use chrono::{DateTime, FixedOffset};
use std::fmt;
use std::io::Read;
use std::path::Path;

/// A decoded email.
///
/// Recognized headers land in dedicated fields (the last occurrence wins,
/// except `X-Receiver` which accumulates); every other header is kept in
/// [`ParsedEmail::unsupported_headers`].
///
/// Equality compares only what a test usually asserts on: envelope sender
/// and receivers, `From`, `To`, subject, body, image and attachments.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ParsedEmail {
    /// Envelope sender written by the capturing server.
    pub x_sender: Option<String>,
    /// Envelope recipients missing from the visible headers (Bcc).
    pub x_receivers: Vec<String>,
    /// `Received` trace header.
    pub received: Option<String>,
    /// `MIME-Version`.
    pub mime_version: Option<String>,
    /// `From`, verbatim.
    pub from: Option<String>,
    /// `To`, split on commas and spaces.
    pub to: Vec<String>,
    /// `Cc`, verbatim.
    pub cc: Option<String>,
    /// `Date`.
    pub date: Option<DateTime<FixedOffset>>,
    /// `Subject`, with encoded-words decoded.
    pub subject: Option<String>,
    /// Top-level `Content-Type`, verbatim.
    pub content_type: Option<String>,
    /// Top-level `Content-Transfer-Encoding`, or the first part's if the
    /// message has none.
    pub content_transfer_encoding: Option<String>,
    /// `Return-Path`.
    pub return_path: Option<String>,
    /// `Message-ID`, verbatim.
    pub message_id: Option<String>,
    /// Date portion of `X-OriginalArrivalTime`.
    pub original_arrival_time: Option<DateTime<FixedOffset>>,
    /// Text or HTML body. HTML is normalized when well-formed.
    pub body: Option<String>,
    /// Decoded `image/jpeg` part.
    pub image: Option<Vec<u8>>,
    /// Decoded `application/pdf` parts.
    pub attachments: Vec<Vec<u8>>,
    /// Headers outside the recognized set.
    pub unsupported_headers: Headers,
}

impl ParsedEmail {
    /// Decodes an email from its text.
    ///
    /// # Errors
    ///
    /// Returns an error if a `Date`-style header cannot be parsed, or if a
    /// Base64 body, part or encoded subject is malformed.
    pub fn parse(raw: &str) -> Result<Self> {
        let lines: Vec<&str> = raw.lines().collect();
        let (merged, separator) = unfold(&lines);

        let header_end = separator.unwrap_or(merged.len());
        let mut email = Self::default();
        for line in &merged[..header_end] {
            if let Some((name, value)) = split_header(line) {
                email.apply_header(name, value)?;
            }
        }

        let Some(separator) = separator else {
            tracing::debug!("message has no body separator");
            return Ok(email);
        };

        let declared_base64 = email.transfer_encoding() == TransferEncoding::Base64;

        let body = if email.is_multipart() {
            let mut collected = Collected::default();
            walk(&merged, &mut collected)?;
            email.image = collected.image;
            email.attachments = collected.attachments;
            if email.content_transfer_encoding.is_none() {
                email.content_transfer_encoding = collected.first_transfer_encoding;
            }
            collected.body
        } else {
            Some(
                merged[separator + 1..]
                    .iter()
                    .flat_map(|line| [line.as_str(), "\r\n"])
                    .collect(),
            )
        };

        let body = match body {
            Some(text) if declared_base64 => Some(decode_base64_text(&text, "message body")?),
            other => other,
        };
        email.body = body.map(|text| sanitize_html(&text).into_owned());

        tracing::debug!(
            subject = email.subject.as_deref().unwrap_or_default(),
            attachments = email.attachments.len(),
            has_image = email.image.is_some(),
            "decoded email"
        );
        Ok(email)
    }

    /// Decodes an email read to the end from `reader`.
    ///
    /// Invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if reading fails, or any error from
    /// [`ParsedEmail::parse`].
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut raw = Vec::new();
        reader.read_to_end(&mut raw)?;
        Self::parse(&String::from_utf8_lossy(&raw))
    }

    /// Decodes a stored `.eml` file.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be read, or any error from
    /// [`ParsedEmail::parse`].
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read(path.as_ref())?;
        tracing::trace!(path = %path.as_ref().display(), bytes = raw.len(), "reading stored email");
        Self::parse(&String::from_utf8_lossy(&raw))
    }

    /// Returns true if the top-level content type is multipart.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("multipart"))
    }

    /// Parses the top-level content type, if present and well-formed.
    #[must_use]
    pub fn mime_type(&self) -> Option<ContentType> {
        ContentType::parse(self.content_type.as_deref()?).ok()
    }

    /// Returns the effective transfer encoding.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.content_transfer_encoding
            .as_deref()
            .map(TransferEncoding::parse)
            .unwrap_or_default()
    }

    /// Returns the `Message-ID` without surrounding angle brackets.
    #[must_use]
    pub fn message_id_bare(&self) -> Option<&str> {
        self.message_id
            .as_deref()
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>'))
    }

    fn apply_header(&mut self, name: &str, value: &str) -> Result<()> {
        let Some(kind) = HeaderKind::from_name(name) else {
            self.unsupported_headers.add(name, value);
            return Ok(());
        };

        match kind {
            HeaderKind::XSender => self.x_sender = Some(value.to_string()),
            HeaderKind::XReceiver => self.x_receivers.extend(
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_string),
            ),
            HeaderKind::Received => self.received = Some(value.to_string()),
            HeaderKind::MimeVersion => self.mime_version = Some(value.to_string()),
            HeaderKind::From => self.from = Some(value.to_string()),
            HeaderKind::To => {
                self.to = value
                    .split([',', ' '])
                    .filter(|r| !r.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            HeaderKind::Cc => self.cc = Some(value.to_string()),
            HeaderKind::Date => self.date = Some(parse_date(value, kind.as_str())?),
            HeaderKind::Subject => {
                self.subject = Some(if contains_encoded_word(value) {
                    decode_encoded_words(value, kind.as_str())?
                } else {
                    value.to_string()
                });
            }
            HeaderKind::ContentType => self.content_type = Some(value.to_string()),
            HeaderKind::ContentTransferEncoding => {
                self.content_transfer_encoding = Some(value.to_string());
            }
            HeaderKind::ReturnPath => self.return_path = Some(value.to_string()),
            HeaderKind::MessageId => self.message_id = Some(value.to_string()),
            HeaderKind::XOriginalArrivalTime => {
                if let Some(time) = parse_arrival_time(value)? {
                    self.original_arrival_time = Some(time);
                }
            }
        }
        Ok(())
    }
}

impl PartialEq for ParsedEmail {
    fn eq(&self, other: &Self) -> bool {
        self.x_receivers == other.x_receivers
            && self.x_sender == other.x_sender
            && self.to == other.to
            && self.from == other.from
            && self.subject == other.subject
            && self.body == other.body
            && self.image == other.image
            && self.attachments == other.attachments
    }
}

impl Eq for ParsedEmail {}

/// One-line summary: subject, `From`, `To`, receivers, sender and body.
impl fmt::Display for ParsedEmail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Subject: {}, From: {}, To: {}, Receivers: {}, Senders: {}, Body: {}",
            self.subject.as_deref().unwrap_or_default(),
            self.from.as_deref().unwrap_or_default(),
            self.to.join(", "),
            self.x_receivers.join(", "),
            self.x_sender.as_deref().unwrap_or_default(),
            self.body.as_deref().unwrap_or_default(),
        )
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
    use crate::encoding::{encode_base64, encode_rfc2047};
    use chrono::Datelike;

    #[test]
    fn test_parse_simple() {
        let raw = "x-sender: a@x.com\r\n\
                   x-receiver: b@x.com\r\n\
                   From: a@x.com\r\n\
                   To: c@x.com\r\n\
                   Subject: Hello\r\n\
                   \r\n\
                   Body line\r\n";
        let email = ParsedEmail::parse(raw).unwrap();

        assert_eq!(email.x_sender.as_deref(), Some("a@x.com"));
        assert_eq!(email.x_receivers, vec!["b@x.com"]);
        assert_eq!(email.from.as_deref(), Some("a@x.com"));
        assert_eq!(email.to, vec!["c@x.com"]);
        assert_eq!(email.subject.as_deref(), Some("Hello"));
        assert_eq!(email.body.as_deref(), Some("Body line\r\n"));
    }

    #[test]
    fn test_x_receiver_accumulates_and_skips_empties() {
        let raw = "x-receiver: a@x.com,,b@x.com\r\nx-receiver: c@x.com\r\n\r\n";
        let email = ParsedEmail::parse(raw).unwrap();
        assert_eq!(email.x_receivers, vec!["a@x.com", "b@x.com", "c@x.com"]);
    }

    #[test]
    fn test_to_splits_on_comma_and_space() {
        let raw = "To: a@x.com, b@x.com,c@x.com\r\n\r\n";
        let email = ParsedEmail::parse(raw).unwrap();
        assert_eq!(email.to, vec!["a@x.com", "b@x.com", "c@x.com"]);
    }

    #[test]
    fn test_last_recognized_header_wins() {
        let raw = "Subject: first\r\nSubject: second\r\n\r\n";
        let email = ParsedEmail::parse(raw).unwrap();
        assert_eq!(email.subject.as_deref(), Some("second"));
    }

    #[test]
    fn test_folded_subject() {
        let raw = "Subject: a long\r\n  folded subject\r\nFrom: a@x.com\r\n\r\nbody";
        let email = ParsedEmail::parse(raw).unwrap();
        assert_eq!(email.subject.as_deref(), Some("a long folded subject"));
        assert_eq!(email.from.as_deref(), Some("a@x.com"));
    }

    #[test]
    fn test_encoded_subject() {
        let raw = format!("Subject: {}\r\n\r\n", encode_rfc2047("Grüße aus Köln"));
        let email = ParsedEmail::parse(&raw).unwrap();
        assert_eq!(email.subject.as_deref(), Some("Grüße aus Köln"));
    }

    #[test]
    fn test_folded_subject_with_padded_words() {
        let raw = "Subject: =?utf-8?b?SMOpbA==?=\r\n =?utf-8?b?bG8=?=\r\n\r\nbody";
        let email = ParsedEmail::parse(raw).unwrap();
        assert_eq!(email.subject.as_deref(), Some("Héllo"));
    }

    #[test]
    fn test_invalid_encoded_subject_fails() {
        let raw = "Subject: =?utf-8?b?@@@?=\r\n\r\n";
        assert!(ParsedEmail::parse(raw).is_err());
    }

    #[test]
    fn test_unsupported_headers_keep_duplicates() {
        let raw = "X-Tag: one\r\nX-Tag: two\r\nX-Mailer: test\r\n\r\n";
        let email = ParsedEmail::parse(raw).unwrap();
        assert_eq!(email.unsupported_headers.get_all("x-tag"), vec!["one", "two"]);
        assert_eq!(email.unsupported_headers.get("X-Mailer"), Some("test"));
    }

    #[test]
    fn test_dates() {
        let raw = "Date: Mon, 15 Jan 2024 10:30:00 +0000\r\n\
                   X-OriginalArrivalTime: 15 Jan 2024 10:30:00.0578 (UTC) FILETIME=[6F24D220:01CCDCF6]\r\n\
                   \r\n";
        let email = ParsedEmail::parse(raw).unwrap();
        assert_eq!(email.date.unwrap().year(), 2024);
        assert_eq!(email.original_arrival_time.unwrap().day(), 15);
    }

    #[test]
    fn test_invalid_date_fails() {
        let raw = "Date: not a date\r\n\r\n";
        assert!(ParsedEmail::parse(raw).is_err());
    }

    #[test]
    fn test_headers_only() {
        let email = ParsedEmail::parse("Subject: x\r\nFrom: a@x.com").unwrap();
        assert_eq!(email.subject.as_deref(), Some("x"));
        assert!(email.body.is_none());
    }

    #[test]
    fn test_base64_body() {
        let raw = format!(
            "Content-Type: text/plain\r\nContent-Transfer-Encoding: base64\r\n\r\n{}\r\n",
            encode_base64(b"decoded text")
        );
        let email = ParsedEmail::parse(&raw).unwrap();
        assert_eq!(email.body.as_deref(), Some("decoded text"));
        assert_eq!(email.transfer_encoding(), TransferEncoding::Base64);
    }

    #[test]
    fn test_invalid_base64_body_fails() {
        let raw = "Content-Transfer-Encoding: base64\r\n\r\n***\r\n";
        let err = ParsedEmail::parse(raw).unwrap_err();
        assert!(err.to_string().contains("message body"));
    }

    #[test]
    fn test_multipart_with_pdf() {
        let pdf = encode_base64(b"%PDF-1.4 fake");
        let raw = format!(
            "x-sender: a@x.com\r\n\
             x-receiver: hidden@x.com\r\n\
             From: a@x.com\r\n\
             To: b@x.com\r\n\
             Subject: Report\r\n\
             Content-Type: multipart/mixed;\r\n\
             \tboundary=\"XYZ\"\r\n\
             \r\n\
             --XYZ\r\n\
             Content-Type: text/plain\r\n\
             \r\n\
             See attached\r\n\
             --XYZ\r\n\
             Content-Type: application/pdf\r\n\
             Content-Transfer-Encoding: base64\r\n\
             \r\n\
             {pdf}\r\n\
             --XYZ--\r\n"
        );
        let email = ParsedEmail::parse(&raw).unwrap();

        assert!(email.is_multipart());
        assert_eq!(email.mime_type().unwrap().boundary(), Some("XYZ"));
        assert_eq!(email.body.as_deref(), Some("See attached"));
        assert_eq!(email.attachments, vec![b"%PDF-1.4 fake".to_vec()]);
        assert_eq!(email.content_transfer_encoding.as_deref(), Some("base64"));
        assert_eq!(email.x_receivers, vec!["hidden@x.com"]);
    }

    #[test]
    fn test_html_body_is_normalized() {
        let raw = "Content-Type: text/html\r\n\r\n<html><body><p>A & B</p></body></html>\r\n";
        let email = ParsedEmail::parse(raw).unwrap();
        let body = email.body.unwrap();
        assert!(body.starts_with("<html>"));
        assert!(body.contains("A &amp; B"));
    }

    #[test]
    fn test_message_id_bare() {
        let email = ParsedEmail::parse("Message-ID: <abc@host>\r\n\r\n").unwrap();
        assert_eq!(email.message_id.as_deref(), Some("<abc@host>"));
        assert_eq!(email.message_id_bare(), Some("abc@host"));
    }

    #[test]
    fn test_parse_is_idempotent() {
        let raw = "From: a@x.com\r\nTo: b@x.com\r\nSubject: s\r\n\r\nhello\r\n";
        assert_eq!(ParsedEmail::parse(raw).unwrap(), ParsedEmail::parse(raw).unwrap());
    }

    #[test]
    fn test_equality_ignores_unlisted_fields() {
        let a = ParsedEmail::parse("Subject: s\r\nX-Mailer: one\r\n\r\nbody").unwrap();
        let b = ParsedEmail::parse("Subject: s\r\nX-Mailer: two\r\n\r\nbody").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_from_reader() {
        let raw: &[u8] = b"Subject: via reader\r\n\r\nbody\r\n";
        let email = ParsedEmail::from_reader(raw).unwrap();
        assert_eq!(email.subject.as_deref(), Some("via reader"));
    }

    #[test]
    fn test_display() {
        let raw = "x-sender: a@x.com\r\nFrom: a@x.com\r\nTo: b@x.com, c@x.com\r\nSubject: s\r\n\r\nhello";
        let email = ParsedEmail::parse(raw).unwrap();
        assert_eq!(
            email.to_string(),
            "Subject: s, From: a@x.com, To: b@x.com, c@x.com, Receivers: , Senders: a@x.com, Body: hello\r\n"
        );
    }
}
