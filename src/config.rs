//! Configuration file support for the DX cluster client.
//!
//! Loads settings from `~/.config/dx-cluster-client/config.toml` on Linux
//! (or platform-appropriate location on other OSes), then applies
//! `DX_CLUSTER_*` environment overrides.

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::band::{InvalidRegion, Region};
use crate::client::{ClusterClientConfig, DEFAULT_CLUSTER_HOST, DEFAULT_CLUSTER_PORT};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cluster host cannot be empty")]
    EmptyHost,

    #[error("Callsign cannot be empty")]
    EmptyCallsign,

    #[error("Invalid port number: {0}")]
    InvalidPort(u32),

    #[error(transparent)]
    InvalidRegion(#[from] InvalidRegion),

    #[error("Buffer size must be positive: {0}")]
    InvalidBufferSize(usize),

    #[error("{0} timeout must be positive")]
    InvalidTimeout(&'static str),

    #[error("Invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid TOML in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Application configuration loaded from TOML file and environment.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Callsign sent to the cluster at login.
    pub callsign: String,

    /// Cluster hostname.
    pub host: String,

    /// Cluster port.
    pub port: u32,

    /// IARU region used for band lookups ("1", "2" or "3").
    pub iaru_region: String,

    /// Number of spots kept in memory.
    pub buffer_size: usize,

    /// Connection timeout in seconds.
    pub connection_timeout: u64,

    /// Receive timeout in seconds before a connection is considered stale.
    pub receive_timeout: u64,

    /// Seconds to wait before and after sending the login callsign.
    pub login_delay: u64,

    /// Seconds to wait after login for the initial backlog of spots.
    pub initial_wait: u64,

    /// Whether the CLI reconnects after a failure or disconnect.
    pub reconnect: bool,

    /// Delay between reconnection attempts in seconds.
    pub reconnect_delay: u64,

    /// Print a status report every N seconds.
    pub report_interval: u64,

    /// Enable the HTTP status endpoint.
    pub http_enabled: bool,

    /// Port for the HTTP status endpoint.
    pub http_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            callsign: "N0CALL".to_string(),
            host: DEFAULT_CLUSTER_HOST.to_string(),
            port: u32::from(DEFAULT_CLUSTER_PORT),
            iaru_region: "2".to_string(),
            buffer_size: 500,
            connection_timeout: 10,
            receive_timeout: 120,
            login_delay: 1,
            initial_wait: 3,
            reconnect: true,
            reconnect_delay: 5,
            report_interval: 30,
            http_enabled: false,
            http_port: 8000,
        }
    }
}

/// Parse an environment value, naming the variable on failure.
fn parse_env<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { name, value })
}

impl Config {
    /// Load configuration from the default config file location.
    ///
    /// Returns default config if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Config::default()),
        }
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns the path to the config file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("dx-cluster-client/config.toml"))
    }

    /// Apply `DX_CLUSTER_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_from(|name| std::env::var(name).ok())
    }

    /// Apply `DX_CLUSTER_*` overrides using `lookup` to read variables.
    pub fn apply_env_from(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup("DX_CLUSTER_HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("DX_CLUSTER_PORT") {
            self.port = parse_env("DX_CLUSTER_PORT", port)?;
        }
        if let Some(callsign) = lookup("DX_CLUSTER_CALLSIGN") {
            self.callsign = callsign;
        }
        if let Some(region) = lookup("DX_CLUSTER_IARU_REGION") {
            self.iaru_region = region;
        }
        if let Some(size) = lookup("DX_CLUSTER_BUFFER_SIZE") {
            self.buffer_size = parse_env("DX_CLUSTER_BUFFER_SIZE", size)?;
        }
        if let Some(secs) = lookup("DX_CLUSTER_CONNECTION_TIMEOUT") {
            self.connection_timeout = parse_env("DX_CLUSTER_CONNECTION_TIMEOUT", secs)?;
        }
        if let Some(secs) = lookup("DX_CLUSTER_RECEIVE_TIMEOUT") {
            self.receive_timeout = parse_env("DX_CLUSTER_RECEIVE_TIMEOUT", secs)?;
        }
        Ok(())
    }

    /// Validate all configuration settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        if !(1..=65535).contains(&self.port) {
            return Err(ConfigError::InvalidPort(self.port));
        }
        if self.callsign.trim().is_empty() {
            return Err(ConfigError::EmptyCallsign);
        }
        self.iaru_region.parse::<Region>()?;
        if self.buffer_size < 1 {
            return Err(ConfigError::InvalidBufferSize(self.buffer_size));
        }
        if self.connection_timeout == 0 {
            return Err(ConfigError::InvalidTimeout("Connection"));
        }
        if self.receive_timeout == 0 {
            return Err(ConfigError::InvalidTimeout("Receive"));
        }
        Ok(())
    }

    /// Build a validated client configuration.
    pub fn client_config(&self) -> Result<ClusterClientConfig, ConfigError> {
        self.validate()?;
        let port = u16::try_from(self.port).map_err(|_| ConfigError::InvalidPort(self.port))?;

        Ok(ClusterClientConfig {
            host: self.host.clone(),
            port,
            callsign: self.callsign.clone(),
            region: self.iaru_region.parse()?,
            buffer_size: self.buffer_size,
            connect_timeout: Duration::from_secs(self.connection_timeout),
            receive_timeout: Duration::from_secs(self.receive_timeout),
            login_delay: Duration::from_secs(self.login_delay),
            initial_wait: Duration::from_secs(self.initial_wait),
        })
    }
}
