//! Constants for the watchlist sync engine
//!
//! Compile-time defaults live here. The runtime-tunable subset is gathered in
//! [`crate::config::SyncConfig`], which starts from these values.

/// How often the scheduler refreshes market data (in seconds)
pub const REFRESH_INTERVAL_SECS: u64 = 120;

/// HTTP request timeout when talking to the market-data API (in seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// CoinGecko API base URL
pub const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Market snapshot endpoint (price and 24h change for a list of ids)
pub const COINGECKO_MARKETS_ENDPOINT: &str = "/coins/markets";

/// Free-text coin search endpoint
pub const COINGECKO_SEARCH_ENDPOINT: &str = "/search";

/// Quote currency for every market query
pub const VS_CURRENCY: &str = "usd";

/// Maximum number of search hits handed back to the caller
pub const SEARCH_RESULT_LIMIT: usize = 10;

/// User agent for HTTP requests
pub const USER_AGENT: &str = "ticker-sync/0.1.0";

/// Watchlist used when nothing has been persisted yet
pub const DEFAULT_WATCHLIST: &[&str] = &["bitcoin", "ethereum", "solana"];

/// Persistence key holding the ordered watchlist ids
pub const WATCHLIST_KEY: &str = "savedCoinIDs";

/// Persistence key holding the auto-update preference
pub const AUTO_UPDATE_KEY: &str = "autoUpdateEnabled";

/// Message shown when a refresh is requested with nothing to track
pub const EMPTY_WATCHLIST_MESSAGE: &str = "No coins selected. Please add coins in settings.";

/// Capacity of the sync event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Directory (under the platform config dir) holding the preferences file
pub const CONFIG_DIR_NAME: &str = "ticker-sync";

/// File name of the persisted preferences
pub const STORE_FILE_NAME: &str = "preferences.json";
