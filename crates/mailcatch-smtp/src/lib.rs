//! # mailcatch-smtp
//!
//! A minimal SMTP receiver for automated tests. It accepts messages from a
//! client under test and hands them to a [`MessageSink`], by default a
//! directory of `.eml` files that test code can decode with
//! `mailcatch-mime`.
//!
//! ## Features
//!
//! - **Small command set**: HELO, EHLO, MAIL FROM, RCPT TO, DATA, QUIT
//! - **Blind recipient capture**: recipients absent from the message headers
//!   are recorded in a synthetic `x-receiver` line
//! - **Pluggable sinks**: files on disk or an in-process channel
//! - **Bounded reads**: line and message size limits plus an optional read
//!   timeout
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailcatch_smtp::{FileSink, Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> mailcatch_smtp::Result<()> {
//!     let config = ServerConfig::builder().port(2525).output_dir("./temp").build();
//!     let sink = FileSink::create(&config.output_dir).await?;
//!
//!     let mut server = Server::bind(config, sink).await?;
//!     server.run().await
//! }
//! ```
//!
//! ## Session States
//!
//! ```text
//! Connected ── HELO/EHLO ──→ Identified ── MAIL ──→ Mail ── RCPT ──→ Recipient
//!                                ↑                    │                 │
//!                                └──── 250 ←── Data ←─┴────── DATA ─────┘
//! ```
//!
//! ## Modules
//!
//! - [`command`]: SMTP commands accepted from the client
//! - [`connection`]: Line framing and the per-session state machine
//! - [`envelope`]: Transaction accumulation and the stored message form
//! - [`parser`]: Command line parser
//! - [`server`]: Listener and accept loop
//! - [`sink`]: Message destinations
//! - [`types`]: Core SMTP types (addresses, replies)

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod config;
pub mod connection;
pub mod envelope;
mod error;
pub mod parser;
pub mod server;
pub mod sink;
pub mod types;

pub use command::Command;
pub use config::{ServerConfig, ServerConfigBuilder};
pub use connection::{Session, State, Step};
pub use envelope::{Envelope, EnvelopeBuilder};
pub use error::{CommandError, Error, Result};
pub use server::Server;
pub use sink::{ChannelSink, FileSink, MessageSink};
pub use types::{Address, Reply, ReplyClass, ReplyCode};
