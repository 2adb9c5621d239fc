//! Destinations for captured messages.

use std::future::Future;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use crate::envelope::Envelope;
use crate::{Error, Result};

/// Receives each completed envelope.
///
/// A failed delivery is reported to the client as a transient error and the
/// session carries on.
pub trait MessageSink {
    /// Persists or forwards one envelope.
    fn deliver(&mut self, envelope: Envelope) -> impl Future<Output = Result<()>> + Send;
}

/// Writes each message to `<dir>/<message-id>.eml`.
///
/// The file is written under a temporary name and renamed into place, so a
/// reader polling the directory never sees a partial message.
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
}

impl FileSink {
    /// Creates the sink, creating `dir` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    /// Returns the output directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Returns the path a message with this identifier is stored at.
    #[must_use]
    pub fn path_for(&self, message_id: &str) -> PathBuf {
        self.dir.join(format!("{}.eml", file_stem(message_id)))
    }
}

impl MessageSink for FileSink {
    async fn deliver(&mut self, envelope: Envelope) -> Result<()> {
        let path = self.path_for(envelope.message_id());
        let staging = path.with_extension("eml.tmp");

        tokio::fs::write(&staging, envelope.to_blob()).await?;
        tokio::fs::rename(&staging, &path).await?;

        tracing::info!(
            message_id = envelope.message_id(),
            path = %path.display(),
            "message saved"
        );
        Ok(())
    }
}

/// Forwards envelopes to an in-process channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<Envelope>,
}

impl ChannelSink {
    /// Creates a sink and the receiver its envelopes arrive on.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    async fn deliver(&mut self, envelope: Envelope) -> Result<()> {
        self.tx
            .send(envelope)
            .await
            .map_err(|_| Error::Sink("receiver dropped".to_string()))
    }
}

/// Maps a message identifier onto a safe file name.
fn file_stem(message_id: &str) -> String {
    message_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@' | '+' | '=') {
                c
            } else {
                '_'
            }
        })
        .collect()
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
    use crate::envelope::EnvelopeBuilder;
    use crate::types::Address;

    fn envelope(raw: &str) -> Envelope {
        let mut builder = EnvelopeBuilder::begin(Address::new("a@x.com"));
        builder.add_recipient(Address::new("hidden@x.com"));
        builder.finalize(raw)
    }

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("mailcatch-sink-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn test_file_stem() {
        assert_eq!(file_stem("abc.123@host"), "abc.123@host");
        assert_eq!(file_stem("a/b\\c:d"), "a_b_c_d");
        assert_eq!(file_stem("../etc"), ".._etc");
    }

    #[tokio::test]
    async fn test_file_sink_writes_blob() {
        let dir = temp_dir();
        let mut sink = FileSink::create(&dir).await.unwrap();
        assert!(sink.dir().is_dir());

        sink.deliver(envelope("Message-ID: <m1@host>\r\nSubject: s\r\n\r\nbody\r\n.\r\n"))
            .await
            .unwrap();

        let path = sink.path_for("m1@host");
        let stored = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(
            stored,
            "x-sender: a@x.com\r\nx-receiver: hidden@x.com\r\nMessage-ID: <m1@host>\r\nSubject: s\r\n\r\nbody"
        );
        assert!(!path.with_extension("eml.tmp").exists());

        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn test_file_sink_fails_when_dir_removed() {
        let dir = temp_dir();
        let mut sink = FileSink::create(&dir).await.unwrap();
        tokio::fs::remove_dir_all(&dir).await.unwrap();

        let result = sink.deliver(envelope("Subject: s\r\n\r\n")).await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_channel_sink() {
        let (mut sink, mut rx) = ChannelSink::new(4);
        sink.deliver(envelope("Subject: s\r\n\r\nbody")).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.subject(), Some("s"));
    }

    #[tokio::test]
    async fn test_channel_sink_closed() {
        let (mut sink, rx) = ChannelSink::new(1);
        drop(rx);

        let result = sink.deliver(envelope("Subject: s\r\n\r\n")).await;
        assert!(matches!(result, Err(Error::Sink(_))));
    }
}
