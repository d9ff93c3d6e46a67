//! Environment-driven configuration.
//!
//! Read once at startup; `.env` files are honored because `main` calls
//! `dotenvy::dotenv()` before loading.

use std::time::Duration;

use anyhow::{Context, Result, bail};

const DEFAULT_BASE_URL: &str = "https://api.purpleair.com/v1/sensors";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub sensor_index: String,
    pub base_url: String,
    pub cache_ttl: Duration,
    pub timeout: Duration,
    pub stream_interval: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// `PURPLEAIR_API_KEY` and `PURPLEAIR_SENSOR_INDEX` are required;
    /// missing or empty values are fatal. Durations come from `CACHE_TTL`
    /// (default 20 s), `PURPLEAIR_TIMEOUT` (default 5 s), and
    /// `STREAM_INTERVAL` (default 1 s), all in whole seconds.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("PURPLEAIR_API_KEY").unwrap_or_default();
        let sensor_index = std::env::var("PURPLEAIR_SENSOR_INDEX").unwrap_or_default();
        if api_key.is_empty() || sensor_index.is_empty() {
            bail!("PURPLEAIR_API_KEY and PURPLEAIR_SENSOR_INDEX must be set");
        }

        let base_url = std::env::var("PURPLEAIR_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());

        Ok(Self {
            api_key,
            sensor_index,
            base_url,
            cache_ttl: Duration::from_secs(env_u64("CACHE_TTL", 20)?),
            timeout: Duration::from_secs(env_u64("PURPLEAIR_TIMEOUT", 5)?),
            stream_interval: Duration::from_secs(env_u64("STREAM_INTERVAL", 1)?),
        })
    }

    /// Full URL of the configured sensor endpoint.
    pub fn sensor_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            self.sensor_index
        )
    }
}

fn env_u64(name: &str, default: u64) -> Result<u64> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("{name} must be an integer, got '{raw}'")),
        Err(_) => Ok(default),
    }
}
