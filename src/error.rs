//! Error types for the watchlist sync engine

use crate::constants::EMPTY_WATCHLIST_MESSAGE;
use thiserror::Error;

/// Errors that can occur when querying the market-data API
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The query could not be built (empty id set, unencodable id, bad base URL)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Connection, DNS or timeout failure
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx response
    #[error("Server responded with HTTP {0}")]
    HttpStatus(u16),

    /// Response body does not match the expected schema
    #[error("Invalid response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Creates an InvalidRequest error
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Creates a Decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// True when the API is throttling us (HTTP 429)
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::HttpStatus(429))
    }
}

/// Why a refresh ended in the failed state
///
/// The `Display` output is the user-facing message attached to
/// [`crate::types::SyncStatus::Failed`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// Nothing to fetch; no network call was made
    #[error("{}", EMPTY_WATCHLIST_MESSAGE)]
    EmptyWatchlist,

    /// The market-data client failed
    #[error("Failed to fetch data: {0}")]
    Provider(#[from] ProviderError),
}

/// Errors raised by watchlist/preference persistence
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors returned by watchlist mutations
#[derive(Debug, Error)]
pub enum WatchlistError {
    #[error("Index {index} out of range for watchlist of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors that can occur while building a [`crate::engine::SyncEngine`]
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
