//! Framed I/O for the SMTP receiver.
//!
//! Commands are CRLF-terminated lines; message data ends with
//! `CRLF . CRLF`. Both are read with [`LineTransport::read_until`], which
//! leaves anything the client pipelined after the terminator buffered for
//! the next read.

#![allow(clippy::missing_errors_doc)]

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

use crate::types::Reply;
use crate::{Error, Result};

/// Default buffer size for reading.
const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Terminator of a command line.
pub const LINE_TERMINATOR: &[u8] = b"\r\n";

/// Terminator of the DATA payload.
pub const DATA_TERMINATOR: &[u8] = b"\r\n.\r\n";

/// Buffered, terminator-delimited connection.
pub struct LineTransport<S> {
    reader: BufReader<S>,
    write_buffer: BytesMut,
    read_timeout: Option<Duration>,
}

impl<S> LineTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new transport with no read deadline.
    pub fn new(stream: S) -> Self {
        Self {
            reader: BufReader::with_capacity(DEFAULT_BUFFER_SIZE, stream),
            write_buffer: BytesMut::with_capacity(DEFAULT_BUFFER_SIZE),
            read_timeout: None,
        }
    }

    /// Sets the deadline for each read from the peer.
    #[must_use]
    pub const fn with_read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Reads until `terminator` has been received, inclusive.
    ///
    /// Returns `Ok(None)` if the peer closes first; any partial data is
    /// discarded and logged. Fails with [`Error::Protocol`] once more than
    /// `limit` bytes arrive without a terminator, and with [`Error::Timeout`]
    /// if a read deadline is set and passes.
    ///
    /// The terminator is matched anywhere in the accumulated data, so a
    /// payload that itself contains the terminator ends early.
    pub async fn read_until(&mut self, terminator: &[u8], limit: usize) -> Result<Option<Vec<u8>>> {
        let mut data = Vec::new();

        loop {
            let buf = match self.read_timeout {
                Some(deadline) => tokio::time::timeout(deadline, self.reader.fill_buf())
                    .await
                    .map_err(|_| Error::Timeout)??,
                None => self.reader.fill_buf().await?,
            };

            if buf.is_empty() {
                if !data.is_empty() {
                    tracing::warn!(
                        bytes = data.len(),
                        "peer closed mid-read, discarding partial data"
                    );
                }
                return Ok(None);
            }

            // The terminator may straddle two reads
            let search_from = data.len().saturating_sub(terminator.len());
            let previous = data.len();
            let len = buf.len();
            data.extend_from_slice(buf);

            if let Some(pos) = find(&data[search_from..], terminator) {
                let end = search_from + pos + terminator.len();
                self.reader.consume(end - previous);
                data.truncate(end);
                return Ok(Some(data));
            }

            self.reader.consume(len);

            if data.len() > limit {
                return Err(Error::Protocol(format!(
                    "no terminator within {limit} bytes"
                )));
            }
        }
    }

    /// Reads one CRLF-terminated command line, lossily decoded as UTF-8.
    pub async fn read_line(&mut self, limit: usize) -> Result<Option<String>> {
        let line = self.read_until(LINE_TERMINATOR, limit).await?;
        Ok(line.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Reads a DATA payload up to and including `CRLF . CRLF`.
    pub async fn read_data(&mut self, limit: usize) -> Result<Option<String>> {
        let data = self.read_until(DATA_TERMINATOR, limit).await?;
        Ok(data.map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Writes a reply and flushes it.
    pub async fn send(&mut self, reply: &Reply) -> Result<()> {
        self.write_buffer.clear();
        self.write_buffer.extend_from_slice(reply.to_wire().as_bytes());

        let stream = self.reader.get_mut();
        stream.write_all(&self.write_buffer).await?;
        stream.flush().await?;

        tracing::debug!(%reply, "sent");
        Ok(())
    }

    /// Shuts down the write half of the connection.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.reader.get_mut().shutdown().await?;
        Ok(())
    }
}

/// Finds the first occurrence of `needle` in `haystack`.
fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|w| w == needle)
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
    use tokio_test::io::Builder;

    const LIMIT: usize = 1024;

    #[test]
    fn test_find() {
        assert_eq!(find(b"hello\r\n", b"\r\n"), Some(5));
        assert_eq!(find(b"\r\n", b"\r\n"), Some(0));
        assert_eq!(find(b"no newline", b"\r\n"), None);
        assert_eq!(find(b"a\r\n.\r\n", DATA_TERMINATOR), Some(1));
    }

    #[tokio::test]
    async fn test_read_simple_line() {
        let mock = Builder::new().read(b"HELO client\r\n").build();
        let mut transport = LineTransport::new(mock);

        let line = transport.read_line(LIMIT).await.unwrap();
        assert_eq!(line.as_deref(), Some("HELO client\r\n"));
    }

    #[tokio::test]
    async fn test_pipelined_lines_stay_buffered() {
        let mock = Builder::new().read(b"MAIL FROM:<a@x.com>\r\nRCPT TO:<b@x.com>\r\n").build();
        let mut transport = LineTransport::new(mock);

        assert_eq!(
            transport.read_line(LIMIT).await.unwrap().as_deref(),
            Some("MAIL FROM:<a@x.com>\r\n")
        );
        assert_eq!(
            transport.read_line(LIMIT).await.unwrap().as_deref(),
            Some("RCPT TO:<b@x.com>\r\n")
        );
        assert_eq!(transport.read_line(LIMIT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_terminator_split_across_reads() {
        let mock = Builder::new()
            .read(b"Subject: x\r\n\r\nbody\r\n.")
            .read(b"\r\nQUIT\r\n")
            .build();
        let mut transport = LineTransport::new(mock);

        let data = transport.read_data(LIMIT).await.unwrap().unwrap();
        assert_eq!(data, "Subject: x\r\n\r\nbody\r\n.\r\n");
        assert_eq!(
            transport.read_line(LIMIT).await.unwrap().as_deref(),
            Some("QUIT\r\n")
        );
    }

    #[tokio::test]
    async fn test_peer_close_mid_line() {
        let mock = Builder::new().read(b"HELO cli").build();
        let mut transport = LineTransport::new(mock);

        assert_eq!(transport.read_line(LIMIT).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_line_length_limit() {
        let long_line = "A".repeat(LIMIT + 100);
        let mock = Builder::new().read(long_line.as_bytes()).build();
        let mut transport = LineTransport::new(mock);

        let result = transport.read_line(LIMIT).await;
        assert!(matches!(result, Err(Error::Protocol(_))));
    }

    #[tokio::test]
    async fn test_send_reply() {
        let mock = Builder::new().write(b"250 OK\r\n").build();
        let mut transport = LineTransport::new(mock);

        transport.send(&Reply::ok()).await.unwrap();
    }

    #[tokio::test]
    async fn test_read_timeout() {
        // The peer end stays open but never writes
        let (stream, _peer) = tokio::io::duplex(64);
        let mut transport =
            LineTransport::new(stream).with_read_timeout(Some(Duration::from_millis(20)));

        let result = transport.read_line(LIMIT).await;
        assert!(matches!(result, Err(Error::Timeout)));
    }
}
