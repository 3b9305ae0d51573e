//! Configuration module for RSSY.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{Result, RssyError};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/rssy.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/rssy.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Poller configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollerConfig {
    /// Enable the background poller.
    #[serde(default = "default_poller_enabled")]
    pub enabled: bool,
    /// Interval between polling cycles in seconds.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Number of sources fetched concurrently within one cycle.
    #[serde(default = "default_max_concurrent_fetches")]
    pub max_concurrent_fetches: usize,
    /// Insert the default sources when the database has none.
    #[serde(default = "default_seed_default_feeds")]
    pub seed_default_feeds: bool,
}

fn default_poller_enabled() -> bool {
    true
}

fn default_poll_interval() -> u64 {
    crate::feed::DEFAULT_POLL_INTERVAL_SECS
}

fn default_max_concurrent_fetches() -> usize {
    1
}

fn default_seed_default_feeds() -> bool {
    true
}

impl PollerConfig {
    /// Polling interval as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            enabled: default_poller_enabled(),
            interval_secs: default_poll_interval(),
            max_concurrent_fetches: default_max_concurrent_fetches(),
            seed_default_feeds: default_seed_default_feeds(),
        }
    }
}

/// Remote feed retrieval configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Connect timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects to follow.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed document size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// User agent sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Allow loopback and private network hosts (development and tests only).
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_user_agent() -> String {
    format!("RSSY/{} (Feed Reader)", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            user_agent: default_user_agent(),
            allow_private_hosts: false,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Poller configuration.
    #[serde(default)]
    pub poller: PollerConfig,
    /// Feed retrieval configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RssyError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RssyError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `RSSY_DATABASE_PATH`: database file path
    /// - `RSSY_FEED_REFRESH_INTERVAL`: polling interval (`90s`, `10m`, `1h30m`)
    /// - `RSSY_LOG_LEVEL`: log level
    ///
    /// Invalid values are ignored with a warning on stderr, keeping the
    /// configured value.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("RSSY_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }

        if let Ok(interval) = std::env::var("RSSY_FEED_REFRESH_INTERVAL") {
            match parse_duration(&interval) {
                Ok(duration) => self.poller.interval_secs = duration.as_secs(),
                Err(e) => eprintln!("Ignoring RSSY_FEED_REFRESH_INTERVAL: {e}"),
            }
        }

        if let Ok(level) = std::env::var("RSSY_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.poller.interval_secs == 0 {
            return Err(RssyError::Config(
                "poller.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.poller.max_concurrent_fetches == 0 {
            return Err(RssyError::Config(
                "poller.max_concurrent_fetches must be greater than zero".to_string(),
            ));
        }
        if self.fetch.total_timeout_secs == 0 {
            return Err(RssyError::Config(
                "fetch.total_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a duration string made of `<number><unit>` groups.
///
/// Units: `ms`, `s`, `m`, `h`. Groups may be combined (`1h30m`).
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(RssyError::Config("empty duration".to_string()));
    }

    let mut total = Duration::ZERO;
    let mut rest = s;

    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| RssyError::Config(format!("missing unit in duration: {s}")))?;
        if digits == 0 {
            return Err(RssyError::Config(format!("invalid duration: {s}")));
        }
        let value: u64 = rest[..digits]
            .parse()
            .map_err(|_| RssyError::Config(format!("invalid duration: {s}")))?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let part = match &rest[..unit_len] {
            "ms" => Duration::from_millis(value),
            "s" => Duration::from_secs(value),
            "m" => Duration::from_secs(value * 60),
            "h" => Duration::from_secs(value * 3600),
            unit => {
                return Err(RssyError::Config(format!(
                    "unknown duration unit '{unit}' in {s}"
                )))
            }
        };
        total += part;
        rest = &rest[unit_len..];
    }

    Ok(total)
}
