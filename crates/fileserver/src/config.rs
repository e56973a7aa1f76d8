//! Configuration management for ts-fileserver.
//!
//! This module provides TOML-based configuration file loading and the
//! immutable [`ServerConfig`] handed to the request handler.
//! The default configuration path is `~/.config/ts-fileserver/config.toml`.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::files::resolver::absolutize;

/// Default address the HTTP listener binds to.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("root must not be empty")]
    EmptyRoot,

    #[error("listen must be a socket address like 100.64.0.1:80, got {0}")]
    InvalidListenAddress(String),

    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),
}

/// Errors building the runtime [`ServerConfig`]. Fatal to startup.
#[derive(Debug, Error)]
pub enum ServerConfigError {
    /// The configured root exists but is not a directory.
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    /// The configured root could not be made absolute or stat'ed.
    #[error("can't resolve root {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure, as read from the TOML file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Listener configuration.
    pub network: NetworkConfig,

    /// Served directory configuration.
    pub files: FileConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,
}

/// Listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address to bind, usually the overlay network interface address.
    pub listen: String,
}

/// Served directory configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FileConfig {
    /// Directory to expose.
    pub root: PathBuf,

    /// Whether clients may upload files.
    pub writable: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            writable: false,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ts-fileserver")
        .join("config.toml")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - TS_FILESERVER_ROOT: Override the served directory
    /// - TS_FILESERVER_WRITABLE: Enable uploads (`1`, `true`, `yes`, `on`)
    /// - TS_FILESERVER_LISTEN: Override the listen address
    /// - TS_FILESERVER_LOG_LEVEL: Override log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("TS_FILESERVER_ROOT") {
            if !root.is_empty() {
                tracing::info!("Overriding root from environment: {}", root);
                self.files.root = PathBuf::from(root);
            }
        }

        if let Ok(writable) = std::env::var("TS_FILESERVER_WRITABLE") {
            if !writable.is_empty() {
                let enabled = matches!(
                    writable.to_lowercase().as_str(),
                    "1" | "true" | "yes" | "on"
                );
                tracing::info!("Overriding writable from environment: {}", enabled);
                self.files.writable = enabled;
            }
        }

        if let Ok(listen) = std::env::var("TS_FILESERVER_LISTEN") {
            if !listen.is_empty() {
                tracing::info!("Overriding listen from environment: {}", listen);
                self.network.listen = listen;
            }
        }

        if let Ok(level) = std::env::var("TS_FILESERVER_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.files.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyRoot);
        }

        if self.network.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidListenAddress(
                self.network.listen.clone(),
            ));
        }

        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        Ok(())
    }

    /// The parsed listen address. Call [`Config::validate`] first.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.network
            .listen
            .parse()
            .map_err(|_| ConfigError::InvalidListenAddress(self.network.listen.clone()))
    }

    /// Build the immutable runtime configuration for the request handler.
    pub fn server_config(&self) -> Result<ServerConfig, ServerConfigError> {
        ServerConfig::new(&self.files.root, self.files.writable)
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}

/// Immutable settings shared by every request.
///
/// Created once at startup. The base directory is absolute and lexically
/// normalized, which the path resolver relies on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    root: PathBuf,
    writable: bool,
}

impl ServerConfig {
    /// Create a configuration serving `root`.
    ///
    /// Fails if `root` cannot be stat'ed or is not a directory.
    pub fn new(root: impl AsRef<Path>, writable: bool) -> Result<Self, ServerConfigError> {
        let requested = root.as_ref();
        let root = absolutize(requested).map_err(|source| ServerConfigError::Io {
            path: requested.to_path_buf(),
            source,
        })?;

        let metadata = fs::metadata(&root).map_err(|source| ServerConfigError::Io {
            path: root.clone(),
            source,
        })?;
        if !metadata.is_dir() {
            return Err(ServerConfigError::NotADirectory(root));
        }

        Ok(Self { root, writable })
    }

    /// The absolute base directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether uploads are accepted.
    pub fn writable(&self) -> bool {
        self.writable
    }
}
