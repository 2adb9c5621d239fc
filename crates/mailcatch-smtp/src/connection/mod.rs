//! Connection handling: framed transport and per-connection sessions.

mod framed;
mod session;

pub use framed::{DATA_TERMINATOR, LINE_TERMINATOR, LineTransport};
pub use session::{Session, State, Step, serve};
