//! Core configuration types and loading.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use super::defaults::*;
use crate::network::{ConnectionFlags, ConnectionSettings, Identity};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Relay configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Worker pool sizing and shutdown behaviour.
    #[serde(default)]
    pub workers: WorkersConfig,
    /// Transport settings shared by every server connection.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Default identity for servers that don't override it.
    #[serde(default)]
    pub identity: IdentityConfig,
    /// Servers to connect to at start-up.
    #[serde(default)]
    pub servers: Vec<ServerConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Registration identity for `server`, falling back to `[identity]`.
    pub fn identity_for(&self, server: &ServerConfig) -> Identity {
        Identity {
            nick: server
                .nick
                .clone()
                .unwrap_or_else(|| self.identity.nick.clone()),
            username: server
                .username
                .clone()
                .unwrap_or_else(|| self.identity.username.clone()),
            realname: server
                .realname
                .clone()
                .unwrap_or_else(|| self.identity.realname.clone()),
            password: server.password.clone(),
            channels: server.channels.clone(),
        }
    }

    /// Transport settings derived from `[connection]`.
    pub fn connection_settings(&self) -> ConnectionSettings {
        ConnectionSettings {
            read_timeout: Duration::from_secs(self.connection.read_timeout_secs),
            reconnect_delay: Duration::from_secs(self.connection.reconnect_delay_secs),
            tls_verify: self.connection.tls_verify,
            ..ConnectionSettings::default()
        }
    }

    #[cfg(test)]
    /// Look up a configured server by name.
    pub fn server(&self, name: &str) -> Option<&ServerConfig> {
        self.servers.iter().find(|s| s.name == name)
    }
}

/// Worker pool configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WorkersConfig {
    /// Number of worker processes kept alive (default: 4).
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// Seconds to wait for workers to exit on shutdown before killing them (default: 5).
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,
    /// Frames buffered per worker before it is treated as full (default: 1024).
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl WorkersConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Connection transport configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Seconds without any inbound data before the link is declared dead (default: 300).
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
    /// Seconds to wait before redialling after a disconnect (default: 5).
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
    /// Verify server certificates against the system roots (default: true).
    /// Set to false only for testing or self-signed certs.
    #[serde(default = "default_true")]
    pub tls_verify: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            read_timeout_secs: default_read_timeout_secs(),
            reconnect_delay_secs: default_reconnect_delay_secs(),
            tls_verify: true,
        }
    }
}

/// Default registration identity.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    #[serde(default = "default_nick")]
    pub nick: String,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_realname")]
    pub realname: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            nick: default_nick(),
            username: default_username(),
            realname: default_realname(),
        }
    }
}

/// One `[[servers]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Name used to address this server from workers (e.g., "libera").
    pub name: String,
    /// Remote hostname or IP.
    pub host: String,
    /// Remote port (default: 6667).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Whether to use TLS for this server.
    #[serde(default)]
    pub tls: bool,
    /// Redial automatically after the link drops (default: true).
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
    pub nick: Option<String>,
    pub username: Option<String>,
    pub realname: Option<String>,
    /// Connection password, sent as PASS before registering.
    pub password: Option<String>,
    /// Channels joined once the server welcomes us (entries may carry a key: "#chan key").
    #[serde(default)]
    pub channels: Vec<String>,
}

impl ServerConfig {
    pub fn flags(&self) -> ConnectionFlags {
        ConnectionFlags {
            tls: self.tls,
            auto_reconnect: self.auto_reconnect,
        }
    }
}

/// Start-up source of server descriptors.
pub trait ServerSource {
    /// Invoke `f` once per configured server, in configuration order.
    fn each_server(&self, f: &mut dyn FnMut(&ServerConfig));
}

impl ServerSource for Config {
    fn each_server(&self, f: &mut dyn FnMut(&ServerConfig)) {
        for server in &self.servers {
            f(server);
        }
    }
}
