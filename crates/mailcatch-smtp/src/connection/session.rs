//! Per-connection SMTP state machine.
//!
//! [`Session`] decides the reply to each command without doing any I/O;
//! [`serve`] drives it over a [`LineTransport`] and hands completed
//! envelopes to a [`MessageSink`].
//!
//! ```text
//! Connected ── HELO/EHLO ──→ Identified ── MAIL ──→ Mail ── RCPT ──→ Recipient
//!                                ↑                    │                 │
//!                                │                    └────── DATA ─────┤
//!                               MAIL ←─────────────── Data ←────────────┘
//! ```
//!
//! `HELO`/`EHLO` is accepted in every state and discards any open envelope.
//! `QUIT` closes the session from every state.

use std::net::IpAddr;

use tokio::io::{AsyncRead, AsyncWrite};

use super::framed::LineTransport;
use crate::command::Command;
use crate::config::ServerConfig;
use crate::envelope::EnvelopeBuilder;
use crate::error::CommandError;
use crate::parser::parse_command;
use crate::sink::MessageSink;
use crate::types::Reply;
use crate::Result;

/// Protocol state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum State {
    /// Greeting sent, waiting for `HELO`/`EHLO`.
    #[default]
    Connected,
    /// Client identified, no transaction open.
    Identified,
    /// `MAIL FROM` accepted.
    Mail,
    /// At least one `RCPT TO` accepted.
    Recipient,
    /// A message was received; a new `MAIL FROM` may follow.
    Data,
    /// `QUIT` received.
    Disconnected,
}

/// What the driver must do after a command.
#[derive(Debug)]
pub enum Step {
    /// Send the reply and read the next command.
    Reply(Reply),
    /// Send the reply, read the DATA payload and finalize the envelope.
    Data {
        /// The `354` reply.
        reply: Reply,
        /// The transaction the payload belongs to.
        envelope: EnvelopeBuilder,
    },
    /// Send the reply and close the connection.
    Quit(Reply),
}

/// SMTP state machine for one connection.
#[derive(Debug, Default)]
pub struct Session {
    state: State,
    client_name: Option<String>,
    envelope: Option<EnvelopeBuilder>,
}

impl Session {
    /// Creates a session in the [`State::Connected`] state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> State {
        self.state
    }

    /// Returns the name the client gave in `HELO`/`EHLO`.
    #[must_use]
    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    /// Returns the open transaction, if any.
    #[must_use]
    pub const fn envelope(&self) -> Option<&EnvelopeBuilder> {
        self.envelope.as_ref()
    }

    /// Applies a command and returns what to do next.
    pub fn handle(&mut self, command: Command) -> Step {
        match command {
            Command::Quit => {
                self.state = State::Disconnected;
                self.envelope = None;
                Step::Quit(Reply::closing())
            }
            Command::Helo { hostname } | Command::Ehlo { hostname } => {
                let reply = Reply::hello(&hostname);
                self.client_name = Some(hostname);
                self.envelope = None;
                self.state = State::Identified;
                Step::Reply(reply)
            }
            _ if self.state < State::Identified => {
                Step::Reply(CommandError::BadCommandSequence.reply())
            }
            Command::MailFrom { from } => {
                if !matches!(self.state, State::Identified | State::Data) {
                    return Step::Reply(CommandError::BadCommandSequence.reply());
                }
                self.envelope = Some(EnvelopeBuilder::begin(from));
                self.state = State::Mail;
                Step::Reply(Reply::ok())
            }
            Command::RcptTo { to } => match (self.state, self.envelope.as_mut()) {
                (State::Mail | State::Recipient, Some(envelope)) => {
                    envelope.add_recipient(to);
                    self.state = State::Recipient;
                    Step::Reply(Reply::ok())
                }
                _ => Step::Reply(CommandError::BadCommandSequence.reply()),
            },
            Command::Data => match self.envelope.take() {
                Some(envelope) if matches!(self.state, State::Mail | State::Recipient) => {
                    self.state = State::Data;
                    Step::Data {
                        reply: Reply::start_data(),
                        envelope,
                    }
                }
                other => {
                    self.envelope = other;
                    Step::Reply(CommandError::BadCommandSequence.reply())
                }
            },
            Command::Unknown(_) => Step::Reply(CommandError::CommandNotImplemented.reply()),
        }
    }
}

/// Runs one SMTP session over `stream` until the client quits or hangs up.
///
/// Replies for sequencing errors and sink failures keep the session going.
///
/// # Errors
///
/// Returns an error on I/O failure, on a read timeout, or when a line or
/// payload exceeds the configured limits.
pub async fn serve<S, K>(stream: S, peer: IpAddr, sink: &mut K, config: &ServerConfig) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
    K: MessageSink,
{
    let mut transport = LineTransport::new(stream).with_read_timeout(config.read_timeout);
    let mut session = Session::new();

    transport.send(&Reply::greeting(peer)).await?;

    loop {
        let Some(line) = transport.read_line(config.max_line_length).await? else {
            tracing::debug!(state = ?session.state(), "peer closed the connection");
            return Ok(());
        };

        let command = parse_command(&line);
        tracing::debug!(%command, state = ?session.state(), "received");

        match session.handle(command) {
            Step::Reply(reply) => transport.send(&reply).await?,
            Step::Quit(reply) => {
                transport.send(&reply).await?;
                transport.shutdown().await?;
                return Ok(());
            }
            Step::Data { reply, envelope } => {
                transport.send(&reply).await?;
                let Some(payload) = transport.read_data(config.max_message_size).await? else {
                    tracing::debug!("peer closed the connection during DATA");
                    return Ok(());
                };

                let envelope = envelope.finalize(&payload);
                let message_id = envelope.message_id().to_string();
                let reply = match sink.deliver(envelope).await {
                    Ok(()) => {
                        tracing::info!(
                            message_id = %message_id,
                            client = session.client_name().unwrap_or_default(),
                            "message captured"
                        );
                        Reply::ok()
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            message_id = %message_id,
                            "failed to persist message"
                        );
                        Reply::local_error()
                    }
                };
                transport.send(&reply).await?;
            }
        }
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
    use crate::envelope::Envelope;
    use crate::sink::ChannelSink;
    use crate::types::{Address, ReplyCode};
    use crate::Error;
    use std::net::Ipv4Addr;
    use tokio_test::io::Builder;

    const GREETING: &[u8] = b"220 Welcome 127.0.0.1, SMTP Server.\r\n";
    const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

    fn code(step: &Step) -> u16 {
        match step {
            Step::Reply(reply) | Step::Quit(reply) | Step::Data { reply, .. } => {
                reply.code.as_u16()
            }
        }
    }

    fn helo() -> Command {
        Command::Helo {
            hostname: "client".to_string(),
        }
    }

    fn mail() -> Command {
        Command::MailFrom {
            from: Address::new("a@x.com"),
        }
    }

    fn rcpt() -> Command {
        Command::RcptTo {
            to: Address::new("b@x.com"),
        }
    }

    /// Sink that always fails.
    struct FailingSink;

    impl MessageSink for FailingSink {
        async fn deliver(&mut self, _envelope: Envelope) -> Result<()> {
            Err(Error::Sink("disk full".to_string()))
        }
    }

    mod state_machine_tests {
        use super::*;

        #[test]
        fn commands_before_helo_are_rejected() {
            let mut session = Session::new();
            assert_eq!(code(&session.handle(mail())), 503);
            assert_eq!(code(&session.handle(rcpt())), 503);
            assert_eq!(code(&session.handle(Command::Data)), 503);
            assert_eq!(code(&session.handle(Command::Unknown("NOOP".into()))), 503);
            assert_eq!(session.state(), State::Connected);
            assert!(session.envelope().is_none());
        }

        #[test]
        fn helo_identifies() {
            let mut session = Session::new();
            let step = session.handle(helo());
            assert!(matches!(step, Step::Reply(ref r) if r.message_text() == "Hello client"));
            assert_eq!(session.state(), State::Identified);
            assert_eq!(session.client_name(), Some("client"));
        }

        #[test]
        fn full_transaction() {
            let mut session = Session::new();
            session.handle(helo());
            assert_eq!(code(&session.handle(mail())), 250);
            assert_eq!(session.state(), State::Mail);
            assert_eq!(code(&session.handle(rcpt())), 250);
            assert_eq!(code(&session.handle(rcpt())), 250);
            assert_eq!(session.state(), State::Recipient);

            let Step::Data { reply, envelope } = session.handle(Command::Data) else {
                panic!("expected DATA step");
            };
            assert_eq!(reply.code, ReplyCode::START_DATA);
            assert_eq!(envelope.sender().as_str(), "a@x.com");
            assert_eq!(envelope.recipients().len(), 2);
            assert_eq!(session.state(), State::Data);
            assert!(session.envelope().is_none());
        }

        #[test]
        fn data_without_mail_is_rejected() {
            let mut session = Session::new();
            session.handle(helo());
            assert_eq!(code(&session.handle(Command::Data)), 503);
            assert_eq!(session.state(), State::Identified);
            assert!(session.envelope().is_none());
        }

        #[test]
        fn data_without_recipient_is_accepted() {
            let mut session = Session::new();
            session.handle(helo());
            session.handle(mail());
            assert_eq!(code(&session.handle(Command::Data)), 354);
        }

        #[test]
        fn rcpt_without_mail_is_rejected() {
            let mut session = Session::new();
            session.handle(helo());
            assert_eq!(code(&session.handle(rcpt())), 503);
        }

        #[test]
        fn mail_twice_is_rejected() {
            let mut session = Session::new();
            session.handle(helo());
            session.handle(mail());
            assert_eq!(code(&session.handle(mail())), 503);
            assert_eq!(session.state(), State::Mail);
        }

        #[test]
        fn mail_after_data_starts_new_transaction() {
            let mut session = Session::new();
            session.handle(helo());
            session.handle(mail());
            session.handle(Command::Data);
            assert_eq!(code(&session.handle(mail())), 250);
            assert_eq!(session.state(), State::Mail);
        }

        #[test]
        fn helo_resets_open_envelope() {
            let mut session = Session::new();
            session.handle(helo());
            session.handle(mail());
            session.handle(rcpt());
            session.handle(helo());
            assert_eq!(session.state(), State::Identified);
            assert!(session.envelope().is_none());
        }

        #[test]
        fn unknown_command_not_implemented() {
            let mut session = Session::new();
            session.handle(helo());
            assert_eq!(code(&session.handle(Command::Unknown("VRFY x".into()))), 502);
            assert_eq!(session.state(), State::Identified);
        }

        #[test]
        fn quit_from_any_state() {
            let mut session = Session::new();
            assert_eq!(code(&session.handle(Command::Quit)), 221);
            assert_eq!(session.state(), State::Disconnected);
        }
    }

    mod serve_tests {
        use super::*;

        #[tokio::test]
        async fn captures_message() {
            let mock = Builder::new()
                .write(GREETING)
                .read(b"HELO client\r\n")
                .write(b"250 Hello client\r\n")
                .read(b"MAIL FROM:<a@x.com>\r\n")
                .write(b"250 OK\r\n")
                .read(b"RCPT TO:<b@x.com>\r\n")
                .write(b"250 OK\r\n")
                .read(b"DATA\r\n")
                .write(b"354 Start mail input; end with <CRLF>.<CRLF>\r\n")
                .read(b"Subject: test\r\n\r\nhello\r\n.\r\n")
                .write(b"250 OK\r\n")
                .read(b"QUIT\r\n")
                .write(b"221 Good bye\r\n")
                .build();

            let (mut sink, mut rx) = ChannelSink::new(1);
            serve(mock, LOCALHOST, &mut sink, &ServerConfig::new())
                .await
                .unwrap();

            let envelope = rx.recv().await.unwrap();
            assert_eq!(envelope.data(), "Subject: test\r\n\r\nhello");
            assert_eq!(envelope.subject(), Some("test"));
            assert_eq!(envelope.x_sender(), "x-sender: a@x.com");
            assert_eq!(envelope.x_receiver(), "x-receiver: b@x.com");
        }

        #[tokio::test]
        async fn sequencing_errors_keep_session_open() {
            let mock = Builder::new()
                .write(GREETING)
                .read(b"DATA\r\n")
                .write(b"503 Bad command sequence\r\n")
                .read(b"HELO client\r\n")
                .write(b"250 Hello client\r\n")
                .read(b"NOOP\r\n")
                .write(b"502 Command not implemented\r\n")
                .read(b"DATA\r\n")
                .write(b"503 Bad command sequence\r\n")
                .build();

            let (mut sink, mut rx) = ChannelSink::new(1);
            serve(mock, LOCALHOST, &mut sink, &ServerConfig::new())
                .await
                .unwrap();

            drop(sink);
            assert!(rx.recv().await.is_none());
        }

        #[tokio::test]
        async fn sink_failure_replies_451() {
            let mock = Builder::new()
                .write(GREETING)
                .read(b"HELO client\r\n")
                .write(b"250 Hello client\r\n")
                .read(b"MAIL FROM:<a@x.com>\r\n")
                .write(b"250 OK\r\n")
                .read(b"DATA\r\n")
                .write(b"354 Start mail input; end with <CRLF>.<CRLF>\r\n")
                .read(b"Subject: s\r\n\r\nbody\r\n.\r\n")
                .write(b"451 Requested action aborted: local error in processing\r\n")
                .read(b"QUIT\r\n")
                .write(b"221 Good bye\r\n")
                .build();

            serve(mock, LOCALHOST, &mut FailingSink, &ServerConfig::new())
                .await
                .unwrap();
        }

        #[tokio::test]
        async fn pipelined_commands() {
            let mock = Builder::new()
                .write(GREETING)
                .read(b"EHLO client\r\nMAIL FROM:<a@x.com>\r\nRCPT TO:<b@x.com>\r\n")
                .write(b"250 Hello client\r\n")
                .write(b"250 OK\r\n")
                .write(b"250 OK\r\n")
                .build();

            let (mut sink, _rx) = ChannelSink::new(1);
            serve(mock, LOCALHOST, &mut sink, &ServerConfig::new())
                .await
                .unwrap();
        }

        #[tokio::test]
        async fn overlong_line_is_fatal() {
            let config = ServerConfig::builder().max_line_length(16).build();
            let mock = Builder::new()
                .write(GREETING)
                .read(b"HELO an-extremely-long-client-name")
                .build();

            let (mut sink, _rx) = ChannelSink::new(1);
            let result = serve(mock, LOCALHOST, &mut sink, &config).await;
            assert!(matches!(result, Err(Error::Protocol(_))));
        }
    }
}
