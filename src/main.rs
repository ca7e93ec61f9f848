//! larkd - Lark IRC Daemon.
//!
//! A light and speedy IRC server: one framing task per connection, one
//! dispatcher task owning all shared state.

mod channel;
mod config;
mod dispatcher;
mod network;
mod session;

use crate::config::{Config, ServerInfo};
use crate::dispatcher::Dispatcher;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    let config = Config::load(&config_path).map_err(|e| {
        error!(path = %config_path, error = %e, "Failed to load config");
        e
    })?;

    let server = Arc::new(ServerInfo::from_config(&config).map_err(|e| {
        error!(path = %config.server.motd_path, error = %e, "Failed to load MOTD");
        e
    })?);

    info!(
        hostname = %server.hostname,
        network = %server.network,
        "Starting larkd"
    );

    // One ordered intent queue: every connection produces, exactly one
    // dispatcher consumes.
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    tokio::spawn(Dispatcher::new(Arc::clone(&server)).run(events_rx));

    network::run(config.listen.address, server, events_tx).await
}
