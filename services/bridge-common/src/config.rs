//! Configuration management for the market bridge.
//!
//! The service reads a single JSON file at `~/.market-bridge/config.json`
//! (or an explicit path). Every field has a default, so a missing file or an
//! empty object is a valid configuration.
//!
//! # Configuration Priority
//!
//! 1. Command-line flags
//! 2. Environment variables (BRIDGE_* prefix)
//! 3. Explicit config file values
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! - `BRIDGE_HOST` → server.host
//! - `BRIDGE_PORT` → server.port
//! - `BRIDGE_LOG_LEVEL` → observability.log_level
//! - `BRIDGE_LOG_FORMAT` → observability.log_format
//! - `BRIDGE_NAME_MAP` → market.name_map_path
//! - `BRIDGE_UPSTREAM_TIMEOUT_SECS` → market.upstream_timeout_secs

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".market-bridge"),
        |dirs| dirs.home_dir().join(".market-bridge"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// HTTP listener configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Upstream market-data configuration
    #[serde(default)]
    pub market: MarketConfig,
}

/// Values given on the command line; they win over the file and the environment.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name_map_path: Option<PathBuf>,
}

impl CliOverrides {
    fn apply(&self, config: &mut Config) {
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(path) = &self.name_map_path {
            config.market.name_map_path = path.clone();
        }
    }
}

/// A validated configuration plus the overrides that were skipped on the way.
#[derive(Debug)]
pub struct LoadedConfig {
    pub config: Config,
    pub ignored: Vec<String>,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::from(e).with_context(format!("Failed to read config from {}", path.display()))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            Error::from(e).with_context(format!("Failed to parse config from {}", path.display()))
        })
    }

    /// Load the file, apply `BRIDGE_*` variables and then command-line
    /// overrides, and validate the result.
    pub fn load_with_env(path: Option<&Path>, cli: &CliOverrides) -> Result<LoadedConfig> {
        Self::load_with_lookup(path, |key| std::env::var(key).ok(), cli)
    }

    /// [`Config::load_with_env`] with an injectable variable lookup.
    pub fn load_with_lookup<F>(
        path: Option<&Path>,
        lookup: F,
        cli: &CliOverrides,
    ) -> Result<LoadedConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        let ignored = config.apply_overrides_from(lookup);
        cli.apply(&mut config);
        config.validate()?;
        Ok(LoadedConfig { config, ignored })
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Values that fail to parse leave the file value in place and are
    /// returned as messages, since logging is not up yet at this point.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Vec<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut ignored = Vec::new();
        if let Some(host) = lookup("BRIDGE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("BRIDGE_PORT") {
            match port.parse() {
                Ok(p) => self.server.port = p,
                Err(_) => ignored.push(format!("Ignoring invalid BRIDGE_PORT={}", port)),
            }
        }
        if let Some(level) = lookup("BRIDGE_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("BRIDGE_LOG_FORMAT") {
            self.observability.log_format = format;
        }
        if let Some(path) = lookup("BRIDGE_NAME_MAP") {
            self.market.name_map_path = PathBuf::from(path);
        }
        if let Some(secs) = lookup("BRIDGE_UPSTREAM_TIMEOUT_SECS") {
            match secs.parse() {
                Ok(s) => self.market.upstream_timeout_secs = s,
                Err(_) => ignored.push(format!(
                    "Ignoring invalid BRIDGE_UPSTREAM_TIMEOUT_SECS={}",
                    secs
                )),
            }
        }
        ignored
    }

    /// Reject values the service cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(Error::Config("server.port must be non-zero".into()));
        }
        if self.market.upstream_timeout_secs == 0 {
            return Err(Error::Config(
                "market.upstream_timeout_secs must be non-zero".into(),
            ));
        }
        if self.market.snapshot_retry.max_attempts == 0 {
            return Err(Error::Config(
                "market.snapshot_retry.max_attempts must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Socket address string for the HTTP listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

// ============================================================================
// Server
// ============================================================================

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind host. Default is `127.0.0.1` (local only).
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets clamped to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

// ============================================================================
// Market Data
// ============================================================================

/// Upstream market-data configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Path of the symbol → company name JSON table
    #[serde(default = "default_name_map_path")]
    pub name_map_path: PathBuf,

    /// Per-call upstream timeout in seconds
    #[serde(default = "default_upstream_timeout")]
    pub upstream_timeout_secs: u64,

    /// Retry policy for the CN bulk snapshot
    #[serde(default)]
    pub snapshot_retry: RetryConfig,

    /// CN provider endpoints
    #[serde(default)]
    pub eastmoney: EastmoneyConfig,

    /// Global provider endpoints
    #[serde(default)]
    pub yahoo: YahooConfig,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            name_map_path: default_name_map_path(),
            upstream_timeout_secs: default_upstream_timeout(),
            snapshot_retry: RetryConfig::default(),
            eastmoney: EastmoneyConfig::default(),
            yahoo: YahooConfig::default(),
        }
    }
}

/// Fixed-backoff retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: u32,

    /// Sleep between attempts in milliseconds
    #[serde(default = "default_retry_backoff_ms")]
    pub backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            backoff_ms: default_retry_backoff_ms(),
        }
    }
}

/// Eastmoney / Cailian endpoints used by the CN provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EastmoneyConfig {
    /// Historical K-line API
    #[serde(default = "default_em_kline_url")]
    pub kline_url: String,

    /// Bulk A-share list API
    #[serde(default = "default_em_spot_url")]
    pub spot_url: String,

    /// Single-stock quote/profile API
    #[serde(default = "default_em_quote_url")]
    pub quote_url: String,

    /// Per-stock news search API
    #[serde(default = "default_em_news_url")]
    pub news_url: String,

    /// Cailian Press telegraph feed
    #[serde(default = "default_cls_telegraph_url")]
    pub telegraph_url: String,

    /// Client request timeout in seconds
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

impl Default for EastmoneyConfig {
    fn default() -> Self {
        Self {
            kline_url: default_em_kline_url(),
            spot_url: default_em_spot_url(),
            quote_url: default_em_quote_url(),
            news_url: default_em_news_url(),
            telegraph_url: default_cls_telegraph_url(),
            timeout_secs: default_client_timeout(),
        }
    }
}

/// Yahoo Finance endpoints used by the global provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooConfig {
    /// Query host for chart/search/screener
    #[serde(default = "default_yahoo_query_base")]
    pub query_base: String,

    /// Query host for quoteSummary
    #[serde(default = "default_yahoo_summary_base")]
    pub summary_base: String,

    /// Cookie bootstrap URL
    #[serde(default = "default_yahoo_cookie_url")]
    pub cookie_url: String,

    /// Client request timeout in seconds
    #[serde(default = "default_client_timeout")]
    pub timeout_secs: u64,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            query_base: default_yahoo_query_base(),
            summary_base: default_yahoo_summary_base(),
            cookie_url: default_yahoo_cookie_url(),
            timeout_secs: default_client_timeout(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "pretty".into()
}
fn default_name_map_path() -> PathBuf {
    PathBuf::from("data/cn_stock_names.json")
}
fn default_upstream_timeout() -> u64 {
    15
}
fn default_retry_attempts() -> u32 {
    3
}
fn default_retry_backoff_ms() -> u64 {
    1000
}
fn default_client_timeout() -> u64 {
    30
}
fn default_em_kline_url() -> String {
    "https://push2his.eastmoney.com/api/qt/stock/kline/get".into()
}
fn default_em_spot_url() -> String {
    "https://82.push2.eastmoney.com/api/qt/clist/get".into()
}
fn default_em_quote_url() -> String {
    "https://push2.eastmoney.com/api/qt/stock/get".into()
}
fn default_em_news_url() -> String {
    "https://search-api-web.eastmoney.com/search/jsonp".into()
}
fn default_cls_telegraph_url() -> String {
    "https://www.cls.cn/nodeapi/telegraphList".into()
}
fn default_yahoo_query_base() -> String {
    "https://query1.finance.yahoo.com".into()
}
fn default_yahoo_summary_base() -> String {
    "https://query2.finance.yahoo.com".into()
}
fn default_yahoo_cookie_url() -> String {
    "https://fc.yahoo.com".into()
}
