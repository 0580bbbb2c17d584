//! Types for the watchlist sync engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// A tracked cryptocurrency
///
/// Equality and hashing only look at `id`: a search hit and a fully priced
/// market record for the same coin compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coin {
    /// Stable API identifier (e.g. "bitcoin")
    pub id: String,

    /// Ticker symbol as reported by the API (e.g. "btc")
    pub symbol: String,

    /// Display name
    pub name: String,

    /// Icon URL
    pub image_url: Option<String>,

    /// Price in USD
    pub current_price: Option<f64>,

    /// Absolute 24h price change in USD
    pub price_change_24h: Option<f64>,

    /// 24h price change percentage
    pub price_change_percentage_24h: Option<f64>,
}

impl Coin {
    /// Create a coin without market data, as returned by search
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            name: name.into(),
            image_url: None,
            current_price: None,
            price_change_24h: None,
            price_change_percentage_24h: None,
        }
    }

    /// Attach market fields
    pub fn with_market(
        mut self,
        current_price: f64,
        price_change_24h: Option<f64>,
        price_change_percentage_24h: Option<f64>,
    ) -> Self {
        self.current_price = Some(current_price);
        self.price_change_24h = price_change_24h;
        self.price_change_percentage_24h = price_change_percentage_24h;
        self
    }

    /// True when the coin carries a price
    pub fn has_market_data(&self) -> bool {
        self.current_price.is_some()
    }

    /// True when the 24h change is zero or positive
    pub fn is_up(&self) -> bool {
        self.price_change_percentage_24h.unwrap_or(0.0) >= 0.0
    }
}

impl PartialEq for Coin {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Coin {}

impl Hash for Coin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// User preferences persisted next to the watchlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    /// Whether the scheduler refreshes on its own
    pub auto_update_enabled: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            auto_update_enabled: true,
        }
    }
}

/// Where the engine is in its refresh cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Nothing has been requested yet
    Idle,
    /// A fetch is in flight
    Loading,
    /// The last refresh succeeded at this time
    Succeeded(DateTime<Utc>),
    /// The last refresh failed with this user-facing message
    Failed(String),
}

/// Observable engine state
///
/// `coins` is the last successfully fetched list in watchlist order. It
/// survives failed refreshes so the presentation layer can keep showing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncState {
    pub status: SyncStatus,
    pub coins: Vec<Coin>,
    pub last_updated: Option<DateTime<Utc>>,
}

impl SyncState {
    /// True while a fetch is in flight
    pub fn is_loading(&self) -> bool {
        matches!(self.status, SyncStatus::Loading)
    }

    /// Message of the last failure, if the engine is currently failed
    pub fn error_message(&self) -> Option<&str> {
        match &self.status {
            SyncStatus::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Age of the displayed data, `None` if nothing was ever fetched
    pub fn age(&self) -> Option<std::time::Duration> {
        let last = self.last_updated?;
        let age = Utc::now().signed_duration_since(last);
        Some(std::time::Duration::from_secs(age.num_seconds().max(0) as u64))
    }

    /// True if the displayed data is older than `threshold_seconds` or missing
    pub fn is_stale(&self, threshold_seconds: u64) -> bool {
        self.age()
            .map(|age| age.as_secs() > threshold_seconds)
            .unwrap_or(true)
    }
}

impl Default for SyncState {
    fn default() -> Self {
        Self {
            status: SyncStatus::Idle,
            coins: Vec::new(),
            last_updated: None,
        }
    }
}

/// What a call to [`crate::engine::SyncEngine::refresh`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Displayed data was replaced with this many coins
    Updated { coins: usize },
    /// The refresh failed; displayed data was kept
    Failed { message: String },
    /// Another refresh was in flight; it will run one more pass for us
    Coalesced,
}

/// Sync events for subscribers that want transitions rather than snapshots
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncEvent {
    /// A refresh replaced the displayed data
    RefreshSucceeded {
        id: Uuid,
        coin_count: usize,
        missing_ids: Vec<String>,
        timestamp: DateTime<Utc>,
    },

    /// A refresh failed
    RefreshFailed {
        id: Uuid,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// Auto-update was switched on or off
    AutoUpdateChanged {
        id: Uuid,
        enabled: bool,
        timestamp: DateTime<Utc>,
    },
}

impl SyncEvent {
    /// Creates a RefreshSucceeded event
    pub fn refresh_succeeded(coin_count: usize, missing_ids: Vec<String>) -> Self {
        Self::RefreshSucceeded {
            id: Uuid::new_v4(),
            coin_count,
            missing_ids,
            timestamp: Utc::now(),
        }
    }

    /// Creates a RefreshFailed event
    pub fn refresh_failed(error_message: impl Into<String>) -> Self {
        Self::RefreshFailed {
            id: Uuid::new_v4(),
            error_message: error_message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Creates an AutoUpdateChanged event
    pub fn auto_update_changed(enabled: bool) -> Self {
        Self::AutoUpdateChanged {
            id: Uuid::new_v4(),
            enabled,
            timestamp: Utc::now(),
        }
    }

    /// Get the event ID
    pub fn id(&self) -> Uuid {
        match self {
            SyncEvent::RefreshSucceeded { id, .. } => *id,
            SyncEvent::RefreshFailed { id, .. } => *id,
            SyncEvent::AutoUpdateChanged { id, .. } => *id,
        }
    }

    /// Get the event type as string
    pub fn event_type(&self) -> &'static str {
        match self {
            SyncEvent::RefreshSucceeded { .. } => "REFRESH_SUCCEEDED",
            SyncEvent::RefreshFailed { .. } => "REFRESH_FAILED",
            SyncEvent::AutoUpdateChanged { .. } => "AUTO_UPDATE_CHANGED",
        }
    }
}

impl std::fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncEvent::RefreshSucceeded {
                coin_count,
                missing_ids,
                ..
            } => {
                write!(f, "Refreshed {} coins", coin_count)?;
                if !missing_ids.is_empty() {
                    write!(f, " (missing: {})", missing_ids.join(", "))?;
                }
                Ok(())
            }
            SyncEvent::RefreshFailed { error_message, .. } => {
                write!(f, "Refresh failed: {}", error_message)
            }
            SyncEvent::AutoUpdateChanged { enabled, .. } => {
                write!(f, "Auto-update {}", if *enabled { "enabled" } else { "disabled" })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_coin_identity_is_id_only() {
        let hit = Coin::new("bitcoin", "btc", "Bitcoin");
        let priced = Coin::new("bitcoin", "BTC", "Bitcoin (market)").with_market(
            65_000.0,
            Some(120.0),
            Some(0.2),
        );
        assert_eq!(hit, priced);

        let set: HashSet<Coin> = [hit, priced].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_default_state() {
        let state = SyncState::default();
        assert_eq!(state.status, SyncStatus::Idle);
        assert!(state.coins.is_empty());
        assert!(state.is_stale(60));
        assert!(state.error_message().is_none());
    }

    #[test]
    fn test_event_display() {
        let event = SyncEvent::refresh_succeeded(2, vec!["solana".to_string()]);
        assert_eq!(event.event_type(), "REFRESH_SUCCEEDED");
        assert_eq!(event.to_string(), "Refreshed 2 coins (missing: solana)");
    }
}
