//! Envelope accumulation for one SMTP transaction.
//!
//! An [`EnvelopeBuilder`] is opened by `MAIL FROM`, collects `RCPT TO`
//! addresses, and is turned into an [`Envelope`] once the DATA payload has
//! been read.

use crate::connection::DATA_TERMINATOR;
use crate::types::Address;
use mailcatch_mime::encoding::{decode_rfc2047, is_encoded_word};
use uuid::Uuid;

const X_SENDER: &str = "x-sender: ";
const X_RECEIVER: &str = "x-receiver: ";
const MESSAGE_ID: &str = "message-id:";
const SUBJECT: &str = "subject:";

/// Open transaction: sender plus the recipients seen so far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeBuilder {
    sender: Address,
    recipients: Vec<Address>,
}

impl EnvelopeBuilder {
    /// Starts a transaction for `sender`.
    #[must_use]
    pub const fn begin(sender: Address) -> Self {
        Self {
            sender,
            recipients: Vec::new(),
        }
    }

    /// Adds a recipient. Duplicates are kept, in order.
    pub fn add_recipient(&mut self, recipient: Address) {
        self.recipients.push(recipient);
    }

    /// Returns the sender.
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.sender
    }

    /// Returns the recipients in the order they were added.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// Closes the transaction with the raw DATA payload.
    ///
    /// A trailing `CRLF . CRLF` is stripped. Recipients whose address already
    /// appears in the payload (typically in `To` or `Cc`) are left out of the
    /// `x-receiver` line, so it only carries the blind recipients, each
    /// listed once in the order first given.
    #[must_use]
    pub fn finalize(self, raw: &str) -> Envelope {
        let terminator = String::from_utf8_lossy(DATA_TERMINATOR);
        let data = raw.strip_suffix(terminator.as_ref()).unwrap_or(raw).to_string();

        let mut hidden: Vec<&str> = Vec::new();
        for addr in self.recipients.iter().map(Address::as_str) {
            if !data.contains(addr) && !hidden.contains(&addr) {
                hidden.push(addr);
            }
        }
        let x_receiver = format!("{X_RECEIVER}{}", hidden.join(","));
        let x_sender = format!("{X_SENDER}{}", self.sender);

        let message_id = header_value(&data, MESSAGE_ID)
            .map(|id| id.trim().trim_start_matches('<').trim_end_matches('>'))
            .filter(|id| !id.is_empty())
            .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);

        let subject = header_value(&data, SUBJECT).map(|s| decode_subject(s.trim_start()));

        Envelope {
            sender: self.sender,
            recipients: self.recipients,
            data,
            message_id,
            subject,
            x_sender,
            x_receiver,
        }
    }
}

/// A completed transaction, ready to be persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    sender: Address,
    recipients: Vec<Address>,
    data: String,
    message_id: String,
    subject: Option<String>,
    x_sender: String,
    x_receiver: String,
}

impl Envelope {
    /// Returns the sender.
    #[must_use]
    pub const fn sender(&self) -> &Address {
        &self.sender
    }

    /// Returns all recipients, including those present in the payload.
    #[must_use]
    pub fn recipients(&self) -> &[Address] {
        &self.recipients
    }

    /// Returns the DATA payload without its terminator.
    #[must_use]
    pub fn data(&self) -> &str {
        &self.data
    }

    /// Returns the `Message-ID` of the payload, or a generated identifier.
    #[must_use]
    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// Returns the decoded subject, if the payload has one.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Returns the synthetic `x-sender: <addr>` line.
    #[must_use]
    pub fn x_sender(&self) -> &str {
        &self.x_sender
    }

    /// Returns the synthetic `x-receiver: <a>,<b>` line.
    #[must_use]
    pub fn x_receiver(&self) -> &str {
        &self.x_receiver
    }

    /// Renders the stored form: `x-sender`, `x-receiver`, then the payload,
    /// separated by CRLF.
    #[must_use]
    pub fn to_blob(&self) -> String {
        format!("{}\r\n{}\r\n{}", self.x_sender, self.x_receiver, self.data)
    }
}

/// Returns the rest of the first line that starts with `name`
/// (case-insensitive), up to the line break.
fn header_value<'a>(data: &'a str, name: &str) -> Option<&'a str> {
    data.split("\r\n").find_map(|line| {
        line.get(..name.len())
            .filter(|head| head.eq_ignore_ascii_case(name))
            .map(|_| &line[name.len()..])
    })
}

fn decode_subject(subject: &str) -> String {
    if !is_encoded_word(subject) {
        return subject.to_string();
    }
    decode_rfc2047(subject).unwrap_or_else(|e| {
        tracing::warn!(error = %e, subject, "could not decode subject, keeping it encoded");
        subject.to_string()
    })
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
    use mailcatch_mime::encoding::encode_rfc2047;
    use proptest::prelude::*;

    fn builder(sender: &str, recipients: &[&str]) -> EnvelopeBuilder {
        let mut builder = EnvelopeBuilder::begin(Address::new(sender));
        for r in recipients {
            builder.add_recipient(Address::new(*r));
        }
        builder
    }

    #[test]
    fn test_terminator_stripped() {
        let envelope = builder("a@x.com", &[]).finalize("Subject: s\r\n\r\nhello\r\n.\r\n");
        assert_eq!(envelope.data(), "Subject: s\r\n\r\nhello");
    }

    #[test]
    fn test_payload_without_terminator_kept() {
        let envelope = builder("a@x.com", &[]).finalize("hello");
        assert_eq!(envelope.data(), "hello");
    }

    #[test]
    fn test_x_receiver_lists_hidden_recipients_only() {
        let envelope = builder("a@x.com", &["b@x.com", "bcc@x.com", "c@x.com"])
            .finalize("To: b@x.com\r\nCc: c@x.com\r\n\r\nhi\r\n.\r\n");
        assert_eq!(envelope.x_receiver(), "x-receiver: bcc@x.com");
        assert_eq!(envelope.recipients().len(), 3);
    }

    #[test]
    fn test_x_receiver_lists_repeated_recipient_once() {
        let envelope = builder("a@x.com", &["bcc@x.com", "to@x.com", "bcc@x.com", "cc@x.com"])
            .finalize("To: to@x.com\r\n\r\nhi\r\n.\r\n");
        assert_eq!(envelope.x_receiver(), "x-receiver: bcc@x.com,cc@x.com");
        assert_eq!(envelope.recipients().len(), 4);
    }

    #[test]
    fn test_x_receiver_empty() {
        let envelope = builder("a@x.com", &["b@x.com"]).finalize("To: b@x.com\r\n\r\n");
        assert_eq!(envelope.x_receiver(), "x-receiver: ");
    }

    #[test]
    fn test_x_sender() {
        let envelope = builder("a@x.com", &[]).finalize("\r\n");
        assert_eq!(envelope.x_sender(), "x-sender: a@x.com");
        assert_eq!(envelope.sender().as_str(), "a@x.com");
    }

    #[test]
    fn test_message_id_extracted() {
        let envelope =
            builder("a@x.com", &[]).finalize("Message-ID: <abc.123@host>\r\nSubject: s\r\n\r\n");
        assert_eq!(envelope.message_id(), "abc.123@host");
    }

    #[test]
    fn test_message_id_case_insensitive() {
        let envelope = builder("a@x.com", &[]).finalize("MESSAGE-ID:  <id-9> \r\n\r\n");
        assert_eq!(envelope.message_id(), "id-9");
    }

    #[test]
    fn test_message_id_generated_when_missing_or_empty() {
        let first = builder("a@x.com", &[]).finalize("Subject: s\r\n\r\n");
        let second = builder("a@x.com", &[]).finalize("Message-ID: <>\r\n\r\n");
        assert!(!first.message_id().is_empty());
        assert!(Uuid::parse_str(second.message_id()).is_ok());
        assert_ne!(first.message_id(), second.message_id());
    }

    #[test]
    fn test_subject_plain() {
        let envelope = builder("a@x.com", &[]).finalize("subject:   hello there\r\n\r\n");
        assert_eq!(envelope.subject(), Some("hello there"));
    }

    #[test]
    fn test_subject_encoded() {
        let raw = format!("Subject: {}\r\n\r\n", encode_rfc2047("Héllo"));
        let envelope = builder("a@x.com", &[]).finalize(&raw);
        assert_eq!(envelope.subject(), Some("Héllo"));
    }

    #[test]
    fn test_subject_undecodable_kept() {
        let envelope = builder("a@x.com", &[]).finalize("Subject: =?utf-8?b?@@@?=\r\n\r\n");
        assert_eq!(envelope.subject(), Some("=?utf-8?b?@@@?="));
    }

    #[test]
    fn test_blob_layout() {
        let envelope =
            builder("a@x.com", &["hidden@x.com"]).finalize("Subject: s\r\n\r\nbody\r\n.\r\n");
        assert_eq!(
            envelope.to_blob(),
            "x-sender: a@x.com\r\nx-receiver: hidden@x.com\r\nSubject: s\r\n\r\nbody"
        );
    }

    proptest! {
        #[test]
        fn prop_x_receiver_holds_exactly_the_absent_recipients(
            present in proptest::collection::vec("[a-z]{3,8}@in\\.test", 0..4),
            absent in proptest::collection::vec("[a-z]{3,8}@out\\.test", 0..4),
        ) {
            let mut builder = EnvelopeBuilder::begin(Address::new("s@x.test"));
            for r in present.iter().chain(absent.iter()) {
                builder.add_recipient(Address::new(r.clone()));
            }
            let raw = format!("To: {}\r\n\r\nbody\r\n.\r\n", present.join(", "));
            let envelope = builder.finalize(&raw);

            let listed: Vec<&str> = envelope
                .x_receiver()
                .trim_start_matches(X_RECEIVER)
                .split(',')
                .filter(|r| !r.is_empty())
                .collect();
            let mut expected: Vec<&str> = Vec::new();
            for r in &absent {
                if !expected.contains(&r.as_str()) {
                    expected.push(r.as_str());
                }
            }
            prop_assert_eq!(listed, expected);
        }
    }
}
