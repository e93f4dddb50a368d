//! Configuration module for feedrelay.

use serde::Deserialize;
use std::path::Path;

use crate::subscription::SeedPolicy;
use crate::{RelayError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/feedrelay.db".to_string()
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
    /// Path to the log file. Empty disables file output.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedrelay.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Poll scheduler configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PollConfig {
    /// Seconds between poll cycles.
    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
    /// Maximum number of subscriptions processed concurrently within a cycle.
    #[serde(default = "default_poll_max_concurrent")]
    pub max_concurrent: usize,
    /// Number of newest entries delivered when a subscription has no usable
    /// marker (never delivered, or the marker fell out of the feed).
    #[serde(default = "default_poll_catch_up_limit")]
    pub catch_up_limit: usize,
    /// Marker stored when a subscription is added.
    #[serde(default)]
    pub seed: SeedPolicy,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_poll_max_concurrent() -> usize {
    4
}

fn default_poll_catch_up_limit() -> usize {
    1
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_poll_interval(),
            max_concurrent: default_poll_max_concurrent(),
            catch_up_limit: default_poll_catch_up_limit(),
            seed: SeedPolicy::default(),
        }
    }
}

/// Feed fetching configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_fetch_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_fetch_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_fetch_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Allow feeds on loopback/private addresses.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_fetch_connect_timeout() -> u64 {
    10
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_fetch_max_redirects() -> usize {
    5
}

fn default_fetch_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_fetch_connect_timeout(),
            timeout_secs: default_fetch_timeout(),
            max_redirects: default_fetch_max_redirects(),
            max_feed_size_bytes: default_fetch_max_feed_size(),
            allow_private_hosts: false,
        }
    }
}

/// Telegram delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Bot API token.
    #[serde(default)]
    pub bot_token: String,
    /// Default destination chat ID.
    #[serde(default)]
    pub chat_id: String,
    /// Bot API base URL.
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
    /// Request timeout in seconds.
    #[serde(default = "default_telegram_timeout")]
    pub timeout_secs: u64,
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_telegram_timeout() -> u64 {
    15
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: default_telegram_api_base(),
            timeout_secs: default_telegram_timeout(),
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
    /// Poll scheduler configuration.
    #[serde(default)]
    pub poll: PollConfig,
    /// Feed fetching configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Telegram delivery configuration.
    #[serde(default)]
    pub telegram: TelegramConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(RelayError::Io)?;
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
        toml::from_str(s).map_err(|e| RelayError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FEEDRELAY_TOKEN`: Telegram bot token
    /// - `FEEDRELAY_CHAT_ID`: default destination chat
    /// - `FEEDRELAY_DELAY`: poll interval in seconds
    pub fn apply_env_overrides(&mut self) {
        if let Some(token) = non_empty_env("FEEDRELAY_TOKEN") {
            self.telegram.bot_token = token;
        }
        if let Some(chat_id) = non_empty_env("FEEDRELAY_CHAT_ID") {
            self.telegram.chat_id = chat_id;
        }
        if let Some(delay) = non_empty_env("FEEDRELAY_DELAY") {
            match delay.parse() {
                Ok(secs) => self.poll.interval_secs = secs,
                Err(_) => tracing::warn!("Ignoring invalid FEEDRELAY_DELAY value: {}", delay),
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.poll.interval_secs == 0 {
            return Err(RelayError::Config(
                "poll.interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.poll.max_concurrent == 0 {
            return Err(RelayError::Config(
                "poll.max_concurrent must be greater than 0".to_string(),
            ));
        }
        if self.poll.catch_up_limit == 0 {
            return Err(RelayError::Config(
                "poll.catch_up_limit must be greater than 0".to_string(),
            ));
        }
        if self.telegram.bot_token.is_empty() {
            return Err(RelayError::Config(
                "telegram.bot_token is not set. \
                 Set it in config.toml or via FEEDRELAY_TOKEN environment variable."
                    .to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}
