//! Configuration loading and server identity.

use chrono::{DateTime, Local};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Configuration errors. All of them are fatal at startup; there is no
/// partial-startup mode.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server identity.
    pub server: ServerConfig,
    /// Network listen configuration.
    pub listen: ListenConfig,
}

/// Server identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name used as the prefix of every numeric reply
    /// (e.g., "irc.lark.net").
    pub hostname: String,
    /// Network name advertised in ISUPPORT (e.g., "LarkNet").
    pub network: String,
    /// Path to the message-of-the-day file.
    pub motd_path: String,
    /// Display host substituted for every client's real address, if set.
    pub default_cloak: Option<String>,
}

/// Network listener configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind to (e.g., "0.0.0.0:6667").
    pub address: SocketAddr,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Immutable server identity shared by the dispatcher and the welcome
/// sequence. Built once at startup.
#[derive(Debug)]
pub struct ServerInfo {
    pub hostname: String,
    pub network: String,
    pub default_cloak: Option<String>,
    /// Preloaded MOTD lines, sent verbatim one RPL_MOTD each.
    pub motd: Vec<String>,
    pub started: DateTime<Local>,
}

impl ServerInfo {
    /// Assemble the runtime identity from config, reading the MOTD file.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(&config.server.motd_path)?;
        let motd: Vec<String> = raw.lines().map(str::to_string).collect();
        info!(path = %config.server.motd_path, lines = motd.len(), "MOTD loaded");

        Ok(Self {
            hostname: config.server.hostname.clone(),
            network: config.server.network.clone(),
            default_cloak: config.server.default_cloak.clone(),
            motd,
            started: Local::now(),
        })
    }
}
