//! TCP listener serving one session at a time.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use crate::config::ServerConfig;
use crate::connection::serve;
use crate::sink::MessageSink;
use crate::{Error, Result};

/// SMTP receiver bound to a listening socket.
///
/// Sessions are served one after another; the next connection is accepted
/// only once the current one has finished.
pub struct Server<K> {
    listener: TcpListener,
    config: ServerConfig,
    sink: K,
}

impl<K: MessageSink> Server<K> {
    /// Binds the listening socket.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(config: ServerConfig, sink: K) -> Result<Self> {
        let listener = TcpListener::bind(config.socket_addr()).await?;
        tracing::info!(addr = %listener.local_addr()?, "SMTP server listening");
        Ok(Self {
            listener,
            config,
            sink,
        })
    }

    /// Returns the bound address.
    ///
    /// # Errors
    ///
    /// Returns an error if the socket address cannot be read.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the sink.
    #[must_use]
    pub const fn sink(&self) -> &K {
        &self.sink
    }

    /// Accepts one connection and serves it to completion.
    ///
    /// # Errors
    ///
    /// Returns an error if accepting fails or the session ends with an error.
    pub async fn serve_one(&mut self) -> Result<()> {
        let (stream, peer) = self.listener.accept().await?;
        tracing::info!(%peer, "session started");

        let result = serve(stream, peer.ip(), &mut self.sink, &self.config).await;
        tracing::info!(%peer, ok = result.is_ok(), "session ended");
        result
    }

    /// Serves sessions until too many fail in a row.
    ///
    /// A failed session is dropped (closing its socket) and, after
    /// [`ServerConfig::failure_backoff`], the next connection is accepted. A
    /// session that ends cleanly resets the count.
    ///
    /// This does return: clients that keep resetting mid-session stop the
    /// server. Raise `max_consecutive_failures` for a fixture that must
    /// outlive misbehaving clients.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TooManyFailures`] once
    /// [`ServerConfig::max_consecutive_failures`] sessions have failed back to
    /// back.
    pub async fn run(&mut self) -> Result<()> {
        let mut failures = 0u32;

        loop {
            match self.serve_one().await {
                Ok(()) => failures = 0,
                Err(e) => {
                    failures += 1;
                    tracing::warn!(
                        error = %e,
                        failures,
                        limit = self.config.max_consecutive_failures,
                        "session failed, accepting a new connection"
                    );
                    if failures >= self.config.max_consecutive_failures {
                        return Err(Error::TooManyFailures(failures));
                    }
                    tokio::time::sleep(self.config.failure_backoff).await;
                }
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
    use crate::sink::ChannelSink;
    use std::net::{IpAddr, Ipv4Addr};
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::net::TcpStream;

    fn loopback_config() -> ServerConfig {
        ServerConfig::builder()
            .bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(0)
            .build()
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let (sink, _rx) = ChannelSink::new(1);
        let server = Server::bind(loopback_config(), sink).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
        assert_eq!(server.config().port, 0);
    }

    #[tokio::test]
    async fn test_serve_one_greets_with_peer_ip() {
        let (sink, _rx) = ChannelSink::new(1);
        let mut server = Server::bind(loopback_config(), sink).await.unwrap();
        let addr = server.local_addr().unwrap();

        let client = tokio::spawn(async move {
            let stream = TcpStream::connect(addr).await.unwrap();
            let mut reader = BufReader::new(stream);
            let mut greeting = String::new();
            reader.read_line(&mut greeting).await.unwrap();
            reader.get_mut().write_all(b"QUIT\r\n").await.unwrap();
            let mut bye = String::new();
            reader.read_line(&mut bye).await.unwrap();
            (greeting, bye)
        });

        server.serve_one().await.unwrap();
        let (greeting, bye) = client.await.unwrap();
        assert_eq!(greeting, "220 Welcome 127.0.0.1, SMTP Server.\r\n");
        assert_eq!(bye, "221 Good bye\r\n");
    }

    #[tokio::test]
    async fn test_run_gives_up_after_consecutive_failures() {
        let config = ServerConfig::builder()
            .bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(0)
            .read_timeout(Duration::from_millis(50))
            .max_consecutive_failures(2)
            .failure_backoff(Duration::from_millis(10))
            .build();
        let (sink, _rx) = ChannelSink::new(1);
        let mut server = Server::bind(config, sink).await.unwrap();
        let addr = server.local_addr().unwrap();

        // Two clients that connect and then stay silent until timed out
        let clients = tokio::spawn(async move {
            let mut held = Vec::new();
            for _ in 0..2 {
                held.push(TcpStream::connect(addr).await.unwrap());
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            drop(held);
        });

        let result = server.run().await;
        assert!(matches!(result, Err(Error::TooManyFailures(2))));
        clients.abort();
    }

    #[tokio::test]
    async fn test_run_clean_session_resets_failure_count() {
        let config = ServerConfig::builder()
            .bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .port(0)
            .read_timeout(Duration::from_millis(50))
            .max_consecutive_failures(2)
            .failure_backoff(Duration::from_millis(10))
            .build();
        let (sink, _rx) = ChannelSink::new(1);
        let mut server = Server::bind(config, sink).await.unwrap();
        let addr = server.local_addr().unwrap();

        // Silent, polite, silent, greeted: the fourth client is only accepted
        // if the clean second session reset the count
        let clients = tokio::spawn(async move {
            let mut held = vec![TcpStream::connect(addr).await.unwrap()];

            let mut polite = BufReader::new(TcpStream::connect(addr).await.unwrap());
            let mut line = String::new();
            polite.read_line(&mut line).await.unwrap();
            polite.get_mut().write_all(b"QUIT\r\n").await.unwrap();
            polite.read_line(&mut line).await.unwrap();

            held.push(TcpStream::connect(addr).await.unwrap());

            let mut last = BufReader::new(TcpStream::connect(addr).await.unwrap());
            let mut greeting = String::new();
            last.read_line(&mut greeting).await.unwrap();
            (held, last, greeting)
        });

        let result = server.run().await;
        assert!(matches!(result, Err(Error::TooManyFailures(2))));

        let (_held, _last, greeting) = tokio::time::timeout(Duration::from_secs(5), clients)
            .await
            .unwrap()
            .unwrap();
        assert!(greeting.starts_with("220 "));
    }
}
