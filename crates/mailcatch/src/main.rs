//! `mailcatch` - SMTP test double
//!
//! Listens for SMTP clients and stores every received message as an `.eml`
//! file for tests to pick up.
//!
//! ```text
//! mailcatch [PORT] [OUTPUT_DIR]
//! ```
//!
//! `PORT` falls back to `MAILCATCH_PORT`, then 25. `OUTPUT_DIR` falls back to
//! `MAILCATCH_DIR`, then `./temp`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use mailcatch_smtp::config::{DEFAULT_OUTPUT_DIR, DEFAULT_PORT};
use mailcatch_smtp::{FileSink, Server, ServerConfig};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "mailcatch=info,mailcatch_smtp=debug,mailcatch_mime=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let port = resolve_port(args.next())?;
    let output_dir = resolve_output_dir(args.next());

    let config = ServerConfig::builder()
        .port(port)
        .output_dir(output_dir)
        .build();
    let sink = FileSink::create(&config.output_dir)
        .await
        .with_context(|| format!("creating output directory {}", config.output_dir.display()))?;

    info!(
        port,
        output_dir = %config.output_dir.display(),
        "Starting mailcatch"
    );
    let mut server = Server::bind(config, sink)
        .await
        .with_context(|| format!("binding port {port}"))?;

    tokio::select! {
        result = server.run() => result.context("SMTP server stopped")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for Ctrl-C")?;
            info!("Shutting down");
        }
    }

    Ok(())
}

fn resolve_port(arg: Option<String>) -> anyhow::Result<u16> {
    let Some(raw) = arg.or_else(|| std::env::var("MAILCATCH_PORT").ok()) else {
        warn!(port = DEFAULT_PORT, "No port given, using the default");
        return Ok(DEFAULT_PORT);
    };
    raw.trim()
        .parse()
        .with_context(|| format!("invalid port {raw:?}"))
}

fn resolve_output_dir(arg: Option<String>) -> PathBuf {
    arg.or_else(|| std::env::var("MAILCATCH_DIR").ok())
        .map_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR), PathBuf::from)
}
