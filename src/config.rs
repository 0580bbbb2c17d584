//! Runtime configuration
//!
//! Defaults come from [`crate::constants`]; `from_env` lets a deployment
//! point the engine at another API host, change the refresh cadence, or move
//! the preferences file.

use crate::constants::{
    COINGECKO_API_URL, CONFIG_DIR_NAME, REFRESH_INTERVAL_SECS, REQUEST_TIMEOUT_SECS,
    STORE_FILE_NAME,
};
use std::path::PathBuf;
use std::time::Duration;

const ENV_API_URL: &str = "TICKER_SYNC_API_URL";
const ENV_REFRESH_SECS: &str = "TICKER_SYNC_REFRESH_SECS";
const ENV_TIMEOUT_SECS: &str = "TICKER_SYNC_TIMEOUT_SECS";
const ENV_STORE_PATH: &str = "TICKER_SYNC_STORE_PATH";

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Base URL of the market-data API, without trailing slash
    pub api_base_url: String,
    /// Period between scheduled refreshes
    pub refresh_interval: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
    /// Location of the persisted watchlist and preferences
    pub store_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_base_url: COINGECKO_API_URL.to_string(),
            refresh_interval: Duration::from_secs(REFRESH_INTERVAL_SECS),
            request_timeout: Duration::from_secs(REQUEST_TIMEOUT_SECS),
            store_path: default_store_path(),
        }
    }
}

impl SyncConfig {
    /// Defaults overridden by `TICKER_SYNC_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL) {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(secs) = parse_secs(&lookup, ENV_REFRESH_SECS) {
            config.refresh_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_secs(&lookup, ENV_TIMEOUT_SECS) {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(path) = lookup(ENV_STORE_PATH) {
            config.store_path = PathBuf::from(path);
        }

        config
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Some(secs),
        _ => {
            tracing::warn!(key, value = %raw, "Ignoring invalid duration override");
            None
        }
    }
}

/// `<config dir>/ticker-sync/preferences.json`, or the working directory when
/// the platform has no config dir
pub fn default_store_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(STORE_FILE_NAME)
}
