//! # mailcatch-mime
//!
//! Decoder for the `.eml` files written by the capturing SMTP server.
//!
//! ## Features
//!
//! - **Envelope headers**: `x-sender` / `x-receiver` lines restored as fields
//! - **Header folding**: continuation lines merged before interpretation
//! - **Multipart**: nested trees walked; text, PDF and JPEG parts extracted
//! - **Encodings**: Base64 bodies and parts, UTF-8 Base64 encoded-word subjects
//! - **HTML**: well-formed bodies normalized so captures compare equal
//!
//! ## Quick Start
//!
//! ```
//! use mailcatch_mime::ParsedEmail;
//!
//! let raw = "x-sender: sender@example.com\r\n\
//!            x-receiver: hidden@example.com\r\n\
//!            From: sender@example.com\r\n\
//!            To: recipient@example.com\r\n\
//!            Subject: Test\r\n\
//!            \r\n\
//!            Hello, World!\r\n";
//!
//! let email = ParsedEmail::parse(raw)?;
//! assert_eq!(email.subject.as_deref(), Some("Test"));
//! assert_eq!(email.x_receivers, ["hidden@example.com"]);
//! assert_eq!(email.body.as_deref(), Some("Hello, World!\r\n"));
//! # Ok::<(), mailcatch_mime::Error>(())
//! ```
//!
//! Stored captures are read with [`ParsedEmail::from_path`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod date;
mod email;
mod error;
mod header;
mod html;
mod multipart;

pub mod encoding;

pub use content_type::ContentType;
pub use date::{parse_arrival_time, parse_date};
pub use email::ParsedEmail;
pub use error::{Error, Result};
pub use header::{HeaderKind, Headers, split_header, unfold};
pub use html::{escape_ampersands, sanitize_html};
pub use multipart::{PartKind, TransferEncoding};
