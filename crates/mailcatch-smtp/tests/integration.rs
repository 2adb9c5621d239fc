//! Integration tests for the SMTP receiver.
//!
//! The first group drives a session over an in-memory stream; the second
//! runs a real listener on the loopback interface and decodes the stored
//! message with `mailcatch-mime`.

use std::io::{self, Cursor};
use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, ReadBuf};
use tokio::net::TcpStream;

use mailcatch_mime::ParsedEmail;
use mailcatch_smtp::connection::serve;
use mailcatch_smtp::{ChannelSink, FileSink, Server, ServerConfig};

const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Mock stream that plays back a client script.
struct MockStream {
    /// Bytes the client sends (in order).
    script: Cursor<Vec<u8>>,
    /// Captured replies written by the server.
    sent: Vec<u8>,
}

impl MockStream {
    fn new(script: &[u8]) -> Self {
        Self {
            script: Cursor::new(script.to_vec()),
            sent: Vec::new(),
        }
    }

    fn replies(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.sent)
            .split_terminator("\r\n")
            .map(str::to_string)
            .collect()
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let data = self.script.get_ref();
        let pos = self.script.position() as usize;

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let remaining = &data[pos..];
        let to_read = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..to_read]);
        self.script.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Routes session logs to the test harness output; `RUST_LOG` overrides.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mailcatch_smtp=debug".into());
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

async fn read_reply(conn: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    conn.read_line(&mut line).await.unwrap();
    line
}

fn temp_dir() -> PathBuf {
    std::env::temp_dir().join(format!("mailcatch-it-{}", uuid::Uuid::new_v4()))
}

#[tokio::test]
async fn test_session_reply_codes() {
    init_tracing();
    let mut stream = MockStream::new(
        b"EHLO tester\r\n\
          MAIL FROM:<a@x.com>\r\n\
          RCPT TO:<b@x.com>\r\n\
          DATA\r\n\
          Subject: hi\r\n\r\nbody\r\n.\r\n\
          QUIT\r\n",
    );
    let (mut sink, mut rx) = ChannelSink::new(1);

    serve(&mut stream, LOCALHOST, &mut sink, &ServerConfig::new())
        .await
        .unwrap();

    let replies = stream.replies();
    let codes: Vec<&str> = replies.iter().map(|r| &r[..3]).collect();
    assert_eq!(codes, ["220", "250", "250", "250", "354", "250", "221"]);

    let envelope = rx.recv().await.unwrap();
    assert_eq!(envelope.subject(), Some("hi"));
    assert_eq!(envelope.x_receiver(), "x-receiver: b@x.com");
}

#[tokio::test]
async fn test_session_out_of_order() {
    init_tracing();
    let mut stream = MockStream::new(
        b"MAIL FROM:<a@x.com>\r\n\
          HELO tester\r\n\
          RCPT TO:<b@x.com>\r\n\
          VRFY b@x.com\r\n\
          QUIT\r\n",
    );
    let (mut sink, _rx) = ChannelSink::new(1);

    serve(&mut stream, LOCALHOST, &mut sink, &ServerConfig::new())
        .await
        .unwrap();

    assert_eq!(
        stream.replies(),
        [
            "220 Welcome 127.0.0.1, SMTP Server.",
            "503 Bad command sequence",
            "250 Hello tester",
            "503 Bad command sequence",
            "502 Command not implemented",
            "221 Good bye",
        ]
    );
}

#[tokio::test]
async fn test_session_ends_on_hangup() {
    init_tracing();
    let mut stream = MockStream::new(b"HELO tester\r\n");
    let (mut sink, _rx) = ChannelSink::new(1);

    serve(&mut stream, LOCALHOST, &mut sink, &ServerConfig::new())
        .await
        .unwrap();

    assert_eq!(stream.replies().len(), 2);
}

#[tokio::test]
async fn test_loopback_capture_to_file() {
    init_tracing();
    let dir = temp_dir();
    let config = ServerConfig::builder()
        .bind_addr(LOCALHOST)
        .port(0)
        .output_dir(&dir)
        .build();
    let sink = FileSink::create(&config.output_dir).await.unwrap();
    let mut server = Server::bind(config, sink).await.unwrap();
    let addr = server.local_addr().unwrap();

    let client = tokio::spawn(async move {
        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = BufReader::new(stream);
        let mut replies = Vec::new();

        replies.push(read_reply(&mut conn).await);
        for command in [
            "HELO tester\r\n",
            "MAIL FROM:<sender@x.com>\r\n",
            "RCPT TO:<to@x.com>\r\n",
            "RCPT TO:<hidden@x.com>\r\n",
            "DATA\r\n",
        ] {
            conn.get_mut().write_all(command.as_bytes()).await.unwrap();
            replies.push(read_reply(&mut conn).await);
        }
        conn.get_mut()
            .write_all(
                b"Message-ID: <loop-1@x.com>\r\n\
                  From: sender@x.com\r\n\
                  To: to@x.com\r\n\
                  Subject: test\r\n\
                  \r\n\
                  hello\r\n\
                  .\r\n",
            )
            .await
            .unwrap();
        replies.push(read_reply(&mut conn).await);
        conn.get_mut().write_all(b"QUIT\r\n").await.unwrap();
        replies.push(read_reply(&mut conn).await);
        replies
    });

    server.serve_one().await.unwrap();
    let replies = client.await.unwrap();
    let codes: Vec<&str> = replies.iter().map(|r| &r[..3]).collect();
    assert_eq!(codes, ["220", "250", "250", "250", "250", "354", "250", "221"]);

    let path = server.sink().path_for("loop-1@x.com");
    let email = ParsedEmail::from_path(&path).unwrap();
    assert_eq!(email.subject.as_deref(), Some("test"));
    assert_eq!(email.body.as_deref(), Some("hello\r\n"));
    assert_eq!(email.x_sender.as_deref(), Some("sender@x.com"));
    assert_eq!(email.x_receivers, ["hidden@x.com"]);
    assert_eq!(email.to, ["to@x.com"]);

    tokio::fs::remove_dir_all(&dir).await.unwrap();
}
