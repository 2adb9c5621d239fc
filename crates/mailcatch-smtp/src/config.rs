//! Server configuration types.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Default SMTP port.
pub const DEFAULT_PORT: u16 = 25;

/// Default directory for captured messages.
pub const DEFAULT_OUTPUT_DIR: &str = "./temp";

/// Maximum command line length to prevent memory exhaustion.
const MAX_LINE_LENGTH: usize = 1024 * 1024; // 1 MB

/// Maximum DATA payload size.
const MAX_MESSAGE_SIZE: usize = 50 * 1024 * 1024; // 50 MB

/// Receiver configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_addr: IpAddr,
    /// Port to listen on. `0` picks a free port.
    pub port: u16,
    /// Directory captured messages are written to.
    pub output_dir: PathBuf,
    /// Longest accepted command line, terminator included.
    pub max_line_length: usize,
    /// Largest accepted DATA payload, terminator included.
    pub max_message_size: usize,
    /// Deadline for each read from the client. `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
    /// Consecutive failed sessions after which the accept loop gives up.
    pub max_consecutive_failures: u32,
    /// Pause after a failed session before accepting the next connection.
    pub failure_backoff: Duration,
}

impl ServerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Creates a configuration builder.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::new()
    }

    /// Returns the socket address to bind.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    bind_addr: IpAddr,
    port: u16,
    output_dir: PathBuf,
    max_line_length: usize,
    max_message_size: usize,
    read_timeout: Option<Duration>,
    max_consecutive_failures: u32,
    failure_backoff: Duration,
}

impl ServerConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            max_line_length: MAX_LINE_LENGTH,
            max_message_size: MAX_MESSAGE_SIZE,
            read_timeout: None,
            max_consecutive_failures: 5,
            failure_backoff: Duration::from_millis(100),
        }
    }

    /// Sets the listen address.
    #[must_use]
    pub const fn bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the maximum command line length.
    #[must_use]
    pub const fn max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len;
        self
    }

    /// Sets the maximum message size.
    #[must_use]
    pub const fn max_message_size(mut self, size: usize) -> Self {
        self.max_message_size = size;
        self
    }

    /// Sets the per-read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Sets how many sessions may fail in a row before the server stops.
    #[must_use]
    pub const fn max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = failures;
        self
    }

    /// Sets the pause after a failed session.
    #[must_use]
    pub const fn failure_backoff(mut self, backoff: Duration) -> Self {
        self.failure_backoff = backoff;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            bind_addr: self.bind_addr,
            port: self.port,
            output_dir: self.output_dir,
            max_line_length: self.max_line_length,
            max_message_size: self.max_message_size,
            read_timeout: self.read_timeout,
            max_consecutive_failures: self.max_consecutive_failures.max(1),
            failure_backoff: self.failure_backoff,
        }
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
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

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new();
        assert_eq!(config.bind_addr, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.port, 25);
        assert_eq!(config.output_dir, PathBuf::from("./temp"));
        assert_eq!(config.max_line_length, 1024 * 1024);
        assert_eq!(config.max_message_size, 50 * 1024 * 1024);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.max_consecutive_failures, 5);
        assert_eq!(config.failure_backoff, Duration::from_millis(100));
    }

    #[test]
    fn test_builder() {
        let config = ServerConfig::builder()
            .bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(2525)
            .output_dir("/tmp/mail")
            .read_timeout(Duration::from_secs(10))
            .max_consecutive_failures(2)
            .failure_backoff(Duration::ZERO)
            .build();

        assert_eq!(config.socket_addr(), "127.0.0.1:2525".parse().unwrap());
        assert_eq!(config.output_dir, PathBuf::from("/tmp/mail"));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(10)));
        assert_eq!(config.max_consecutive_failures, 2);
        assert_eq!(config.failure_backoff, Duration::ZERO);
    }

    #[test]
    fn test_zero_failures_clamped() {
        let config = ServerConfig::builder().max_consecutive_failures(0).build();
        assert_eq!(config.max_consecutive_failures, 1);
    }
}
