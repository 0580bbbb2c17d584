//! # ticker-sync
//!
//! Keeps a small, user-ordered cryptocurrency watchlist in sync with an
//! off-chain market-data API (CoinGecko by default).
//!
//! ## Usage
//!
//! ```no_run
//! use ticker_sync::{SyncConfig, SyncEngine};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = SyncEngine::from_config(&SyncConfig::from_env())?;
//! engine.start();
//!
//! // Edit the watchlist, then refresh once
//! let service = engine.service();
//! service.search("cardano").await;
//! if let Some(hit) = service.search_state().results.first() {
//!     service.add_coin(hit)?;
//! }
//! engine.refresh().await;
//!
//! for coin in engine.coins() {
//!     println!("{}: ${:.2}", coin.name, coin.current_price.unwrap_or_default());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SyncScheduler (every 120s)    WatchlistService (search/add/remove/move)
//!          \                          |
//!           SyncEngine::refresh   WatchlistManager ── WatchlistStore
//!                 |                   (ordered ids, preferences)
//!        MarketDataProvider (CoinGecko)
//!                 |
//!     watch::Receiver<SyncState> / broadcast::Receiver<SyncEvent>
//! ```
//!
//! ## Stale data
//!
//! A failed refresh sets the status to `Failed(message)` but keeps the last
//! successfully fetched coins, so the presentation layer can show old prices
//! next to the error. Nothing is retried; the next scheduled tick or manual
//! refresh tries again.

pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod provider;
pub mod providers;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod types;
pub mod watchlist;

// Re-export commonly used types
pub use config::SyncConfig;
pub use engine::SyncEngine;
pub use error::{EngineError, ProviderError, StoreError, SyncError, WatchlistError};
pub use metrics::SyncMetricsSnapshot;
pub use provider::MarketDataProvider;
pub use providers::CoinGeckoProvider;
pub use service::{SearchState, WatchlistService};
pub use store::{FileStore, KeyValueStore, MemoryStore, WatchlistStore};
pub use types::{Coin, Preferences, RefreshOutcome, SyncEvent, SyncState, SyncStatus};
pub use watchlist::Watchlist;
