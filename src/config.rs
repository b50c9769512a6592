//! Server configuration.
//!
//! Sources, later ones winning:
//! 1. built-in defaults
//! 2. the YAML file named by `WAYWARD_CONFIG`
//! 3. `LISTEN`: comma-separated endpoints (`127.0.0.1:8080,unix:/tmp/w.sock`)
//!
//! ```yaml
//! listen:
//!   - "[::]:3000"
//!   - "unix:/run/wayward.sock"
//! backlog: 1024
//! max_body_size: 1048576
//! shutdown_grace_ms: 5000
//! log_level: debug
//! ```

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::server::transport::Endpoint;

pub const CONFIG_ENV: &str = "WAYWARD_CONFIG";
pub const LISTEN_ENV: &str = "LISTEN";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Endpoints to bind at startup.
    pub listen: Vec<Endpoint>,
    /// Listen backlog for TCP endpoints.
    pub backlog: u32,
    /// Bytes requested from the socket per read.
    pub recv_buffer_size: usize,
    /// Largest accepted request head (request line + headers).
    pub max_head_size: usize,
    /// Largest accepted declared `Content-Length`; larger requests get 413.
    pub max_body_size: usize,
    /// How long shutdown waits for live connections.
    pub shutdown_grace_ms: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: vec![Endpoint::Tcp("127.0.0.1:8080".to_string())],
            backlog: 1024,
            recv_buffer_size: 1024,
            max_head_size: 64 * 1024,
            max_body_size: 1024 * 1024,
            shutdown_grace_ms: 5000,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    /// Loads configuration using `lookup` in place of the environment.
    pub fn load_with<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = match lookup(CONFIG_ENV) {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };

        if let Some(listen) = lookup(LISTEN_ENV) {
            cfg.listen = parse_listen_list(&listen)?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_yaml_str(&content)
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_yaml_str(content: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(content)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// The configured log level; unknown names fall back to INFO.
    pub fn log_level(&self) -> tracing::Level {
        self.log_level.parse().unwrap_or(tracing::Level::INFO)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(!self.listen.is_empty(), "no listen endpoints configured");
        anyhow::ensure!(self.recv_buffer_size > 0, "recv_buffer_size must be positive");
        anyhow::ensure!(self.max_head_size > 0, "max_head_size must be positive");
        Ok(())
    }
}

/// Parses a comma-separated endpoint list, skipping empty items.
pub fn parse_listen_list(s: &str) -> anyhow::Result<Vec<Endpoint>> {
    s.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(Endpoint::parse)
        .collect()
}
