//! Application configuration.
//!
//! Values come from the process environment, after loading a `.env` file if
//! one is present. Missing variables fall back to defaults; malformed ones
//! are rejected with [`Error::Configuration`].

use std::path::PathBuf;
use std::time::Duration;

use crate::monitor::MonitorConfig;
use crate::{Error, Result};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:media-monitor.db?mode=rwc";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_HTTP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Top-level configuration for the `media-monitor` binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// SQLite connection string.
    pub database_url: String,
    /// Directory for rolling log files.
    pub log_dir: PathBuf,
    /// Timeout applied to each media server request; zero disables it.
    pub http_request_timeout: Duration,
    pub monitor: MonitorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            http_request_timeout: Duration::from_secs(DEFAULT_HTTP_REQUEST_TIMEOUT_SECS),
            monitor: MonitorConfig::default(),
        }
    }
}

/// Load a `.env` file into the process environment, if one is found.
///
/// Returns the path of the loaded file. Call before [`AppConfig::from_env`].
pub fn load_dotenv() -> Result<Option<PathBuf>> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(Error::config(format!("failed to read .env file: {}", e))),
    }
}

impl AppConfig {

    /// Read configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.database_url);

        let log_dir = lookup("LOG_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        let http_request_timeout = parse_u64(&lookup, "HTTP_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.http_request_timeout);

        let idle_interval = parse_u64(&lookup, "MONITOR_IDLE_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.monitor.idle_interval);

        let min_wake_delay = parse_u64(&lookup, "MONITOR_MIN_WAKE_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.monitor.min_wake_delay);

        if idle_interval.is_zero() {
            return Err(Error::config("MONITOR_IDLE_INTERVAL_SECS must be greater than 0"));
        }
        if min_wake_delay.is_zero() {
            return Err(Error::config("MONITOR_MIN_WAKE_DELAY_MS must be greater than 0"));
        }

        Ok(Self {
            database_url,
            log_dir,
            http_request_timeout,
            monitor: MonitorConfig {
                idle_interval,
                min_wake_delay,
            },
        })
    }
}

fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<u64>()
        .map(Some)
        .map_err(|_| Error::config(format!("{} must be a non-negative integer, got {:?}", key, raw)))
}
