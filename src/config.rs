//! Application configuration loaded from environment variables.
//!
//! A `.env` file is honoured for local development.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default per-store quota, roughly what browsers give local storage.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// JSON file backing the store
    pub storage_path: PathBuf,
    /// Maximum serialized size of all entries
    pub storage_quota_bytes: usize,
    /// Server port
    pub port: u16,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,
    /// Bearer token required on `/api/*`
    pub admin_token: String,
    pub cache_sweep_interval: Duration,
    pub sync_poll_interval: Duration,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("data/storage.json"),
            storage_quota_bytes: DEFAULT_QUOTA_BYTES,
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            admin_token: "test_admin_token".to_string(),
            cache_sweep_interval: Duration::from_secs(300),
            sync_poll_interval: Duration::from_secs(2),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let admin_token = env::var("ADMIN_TOKEN")
            .map(|v| v.trim().to_string())
            .map_err(|_| ConfigError::Missing("ADMIN_TOKEN"))?;
        if admin_token.is_empty() {
            return Err(ConfigError::Invalid("ADMIN_TOKEN", "must not be empty".to_string()));
        }

        Ok(Self {
            storage_path: env::var("STORAGE_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("data/storage.json")),
            storage_quota_bytes: parse_var("STORAGE_QUOTA_BYTES", DEFAULT_QUOTA_BYTES)?,
            port: parse_var("PORT", 8080)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            admin_token,
            cache_sweep_interval: parse_interval_secs("CACHE_SWEEP_INTERVAL_SECS", 300)?,
            sync_poll_interval: parse_interval_secs("SYNC_POLL_INTERVAL_SECS", 2)?,
        })
    }
}

fn parse_var<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(name, e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Interval in whole seconds; zero is rejected since a timer cannot tick
/// at period zero.
fn parse_interval_secs(name: &'static str, default: u64) -> Result<Duration, ConfigError> {
    match parse_var(name, default)? {
        0 => Err(ConfigError::Invalid(name, "must be greater than zero".to_string())),
        secs => Ok(Duration::from_secs(secs)),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
