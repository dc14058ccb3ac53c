//! Configuration management for panel-sync
//!
//! This module handles loading, parsing, and validating application configuration
//! from YAML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;

pub use crate::error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Retry queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Queue scheduler configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Fallback settings for the Enhance adapter
    #[serde(default)]
    pub enhance: EnhanceDefaults,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(format!("Failed to read config file: {}", e)))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        // Expand environment variables before parsing
        let expanded = expand_env_vars(yaml);
        serde_yaml::from_str(&expanded)
            .map_err(|e| ConfigError::Parse(format!("Failed to parse YAML: {}", e)))
    }

    /// Load configuration from environment variables with prefix PANEL_SYNC_
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("PANEL_SYNC_SERVER_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PANEL_SYNC_SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid port number".to_string()))?;
        }

        if let Ok(path) = std::env::var("PANEL_SYNC_DATABASE_PATH") {
            config.database.path = path;
        }

        if let Ok(limit) = std::env::var("PANEL_SYNC_QUEUE_BATCH_LIMIT") {
            config.queue.batch_limit = limit
                .parse()
                .map_err(|_| ConfigError::Parse("Invalid batch limit".to_string()))?;
        }

        if let Ok(level) = std::env::var("PANEL_SYNC_LOG_LEVEL") {
            config.logging.level = level;
        }

        Ok(config)
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
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

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8088
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    /// Path to SQLite database file
    #[serde(default = "default_database_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

fn default_database_path() -> String {
    "/data/db/panel-sync.db".to_string()
}

/// Retry queue configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueConfig {
    /// Maximum automatic retry attempts before a resource is permanently failed
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Backoff schedule in minutes, indexed by retry count.
    /// Attempts past the end of the schedule reuse the last entry.
    #[serde(default = "default_backoff_minutes")]
    pub backoff_minutes: Vec<u64>,

    /// Maximum resources processed per queue run
    #[serde(default = "default_batch_limit")]
    pub batch_limit: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_minutes: default_backoff_minutes(),
            batch_limit: default_batch_limit(),
        }
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_minutes() -> Vec<u64> {
    vec![5, 15, 30, 60, 120]
}

fn default_batch_limit() -> u32 {
    25
}

/// Queue scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchedulerConfig {
    /// Whether the background queue processor runs at all
    #[serde(default = "default_scheduler_enabled")]
    pub enabled: bool,

    /// Initial delay before the first queue run (seconds)
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,

    /// Interval between queue runs (seconds)
    #[serde(default = "default_process_interval")]
    pub process_interval_secs: u64,

    /// Jitter range (seconds) added to each interval
    #[serde(default = "default_jitter")]
    pub jitter_secs: u64,

    /// Timeout for a single queue run (seconds)
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: default_scheduler_enabled(),
            initial_delay_secs: default_initial_delay(),
            process_interval_secs: default_process_interval(),
            jitter_secs: default_jitter(),
            run_timeout_secs: default_run_timeout(),
        }
    }
}

fn default_scheduler_enabled() -> bool {
    true
}

fn default_initial_delay() -> u64 {
    5
}

fn default_process_interval() -> u64 {
    300
}

fn default_jitter() -> u64 {
    30
}

fn default_run_timeout() -> u64 {
    600
}

/// Process-level fallbacks for the Enhance adapter.
///
/// Provider records stored in the database may be partially configured;
/// missing fields fall back to the `ENHANCE_*` environment variables and
/// then to these values, so development setups still function.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnhanceDefaults {
    /// Default API key
    #[serde(default)]
    pub api_key: Option<String>,

    /// Default panel base URL
    #[serde(default = "default_enhance_base_url")]
    pub base_url: String,

    /// Default reseller organization id
    #[serde(default)]
    pub org_id: Option<String>,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

impl Default for EnhanceDefaults {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_enhance_base_url(),
            org_id: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

fn default_enhance_base_url() -> String {
    "https://panel.example.com/api".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

/// Expand environment variables in a string
///
/// Supports `${VAR_NAME}` syntax
fn expand_env_vars(input: &str) -> String {
    let re = regex_lite::Regex::new(r"\$\{([^}]+)\}")
        .expect("Invalid regex pattern for environment variable expansion");

    re.replace_all(input, |caps: &regex_lite::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
