//! ==============================================================================
//! config.rs - Runtime Configuration Loader
//! ==============================================================================
//!
//! purpose:
//!     defines the schema for `relay.toml`.
//!     loads configuration from file or falls back to defaults, then lets
//!     environment variables override individual values.
//!
//! structure:
//!     - ServerConfig: bind address, production/development, static assets.
//!     - PollingConfig: how often the controller is asked for a report.
//!     - HistoryConfig: admission interval and capacity of the rolling history.
//!     - LoggingConfig: default log filter when RUST_LOG is unset.
//!
//! environment overrides:
//!     HOST, PORT, RELAY_ENV, RELAY_STATIC_DIR, RELAY_POLL_INTERVAL_SECS,
//!     RELAY_HISTORY_INTERVAL_SECS, RELAY_MAX_HISTORY, RELAY_LOG
//!
//! ==============================================================================

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
pub struct RelayConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Production,
    #[default]
    Development,
}

impl FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            other => Err(anyhow!("expected production or development, got {:?}", other)),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    /// directory holding the dashboard page and its assets
    pub static_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    pub interval_seconds: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// minimum spacing between two admitted samples
    pub interval_seconds: u64,
    /// samples kept per history, oldest evicted first
    pub capacity: usize,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            environment: Environment::Development,
            static_dir: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_seconds: 30 }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        // one point an hour, a day's worth
        Self { interval_seconds: 3600, capacity: 24 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

impl PollingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl HistoryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

impl RelayConfig {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

        let config: RelayConfig = toml::from_str(&content).context("Failed to parse config")?;

        Ok(config)
    }

    /// Load with default fallback
    pub fn load_or_default() -> Self {
        let paths = [
            PathBuf::from("config").join("relay.toml"),
            PathBuf::from("..").join("config").join("relay.toml"),
        ];

        for path in &paths {
            if path.exists() {
                match Self::load(path) {
                    Ok(config) => {
                        tracing::info!(path = %path.display(), "configuration loaded");
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %format!("{:#}", e), "failed to load config");
                    }
                }
            }
        }

        tracing::warn!("no config file found - using defaults");
        Self::default()
    }

    /// file (or defaults), then process environment on top
    pub fn from_env() -> anyhow::Result<Self> {
        let mut config = Self::load_or_default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// apply overrides from `lookup` (the process environment in production,
    /// a map in tests)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.server.port = parse_var("PORT", &port)?;
        }
        if let Some(env) = lookup("RELAY_ENV") {
            self.server.environment = parse_var("RELAY_ENV", &env)?;
        }
        if let Some(dir) = lookup("RELAY_STATIC_DIR") {
            self.server.static_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = lookup("RELAY_POLL_INTERVAL_SECS") {
            self.polling.interval_seconds = parse_var("RELAY_POLL_INTERVAL_SECS", &secs)?;
        }
        if let Some(secs) = lookup("RELAY_HISTORY_INTERVAL_SECS") {
            self.history.interval_seconds = parse_var("RELAY_HISTORY_INTERVAL_SECS", &secs)?;
        }
        if let Some(cap) = lookup("RELAY_MAX_HISTORY") {
            self.history.capacity = parse_var("RELAY_MAX_HISTORY", &cap)?;
        }
        if let Some(level) = lookup("RELAY_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.polling.interval_seconds == 0 {
            bail!("polling.interval_seconds must be greater than zero");
        }
        self.server.socket_addr()?;
        Ok(())
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            listen = %format!("{}:{}", self.server.host, self.server.port),
            environment = ?self.server.environment,
            static_dir = ?self.server.static_dir,
            poll_interval_s = self.polling.interval_seconds,
            history_interval_s = self.history.interval_seconds,
            history_capacity = self.history.capacity,
            "relay configuration"
        );
    }
}

fn parse_var<T>(name: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("invalid value {:?} for {}: {}", raw, name, e))
}
