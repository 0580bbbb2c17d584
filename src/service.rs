//! Watchlist mutation service
//!
//! Search, add, remove and reorder. Every mutation is persisted before it
//! returns; none of them refresh market data. Callers batch their edits and
//! then call [`crate::engine::SyncEngine::refresh`] once (e.g. when a settings
//! screen is dismissed).

use crate::{
    error::{StoreError, WatchlistError},
    provider::MarketDataProvider,
    types::Coin,
    watchlist::{Watchlist, WatchlistManager},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Observable search state for the settings surface
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    /// Query of the most recent search
    pub text: String,
    pub results: Vec<Coin>,
    pub is_searching: bool,
}

/// Search, add, remove and reorder surface over the shared watchlist
pub struct WatchlistService {
    provider: Arc<dyn MarketDataProvider>,
    watchlist: Arc<WatchlistManager>,
    search: watch::Sender<SearchState>,
    /// Bumped by every search and every clear; only the latest search publishes
    search_generation: AtomicU64,
}

impl WatchlistService {
    /// Creates the service
    ///
    /// # Arguments
    /// * `provider` - Used for `search` only
    /// * `watchlist` - Owner of the persisted watchlist, shared with the engine
    pub fn new(provider: Arc<dyn MarketDataProvider>, watchlist: Arc<WatchlistManager>) -> Self {
        let (search, _) = watch::channel(SearchState::default());
        Self {
            provider,
            watchlist,
            search,
            search_generation: AtomicU64::new(0),
        }
    }

    /// Current watchlist
    pub fn watchlist(&self) -> Watchlist {
        self.watchlist.watchlist()
    }

    /// Snapshot of the current search
    pub fn search_state(&self) -> SearchState {
        self.search.borrow().clone()
    }

    /// Receiver that observes every search state change
    pub fn subscribe_search(&self) -> watch::Receiver<SearchState> {
        self.search.subscribe()
    }

    /// Searches for coins by name or symbol
    ///
    /// A blank query does nothing. Failures are logged and leave the results
    /// empty; they never surface as an error.
    pub async fn search(&self, query: &str) {
        let query = query.trim();
        if query.is_empty() {
            return;
        }

        let generation = self.search_generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.search.send_modify(|state| {
            state.text = query.to_string();
            state.results.clear();
            state.is_searching = true;
        });

        let results = match self.provider.search_coins(query).await {
            Ok(coins) => {
                tracing::debug!(query, count = coins.len(), "Search completed");
                coins
            }
            Err(e) => {
                tracing::warn!(query, error = %e, "Search failed");
                Vec::new()
            }
        };

        if self.search_generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(query, "Discarding superseded search results");
            return;
        }
        self.search.send_modify(|state| {
            state.results = results;
            state.is_searching = false;
        });
    }

    /// Clears search text and results, discarding any search still in flight
    pub fn clear_search(&self) {
        self.search_generation.fetch_add(1, Ordering::SeqCst);
        self.search.send_replace(SearchState::default());
    }

    /// Appends `coin` to the watchlist
    ///
    /// Returns false and writes nothing if the coin is already tracked.
    /// Clears the search on success.
    pub fn add_coin(&self, coin: &Coin) -> Result<bool, StoreError> {
        if self.watchlist.watchlist().contains(&coin.id) {
            return Ok(false);
        }

        let added = self
            .watchlist
            .update(|w| Ok::<_, StoreError>(w.push(coin.id.clone())))?;
        if added {
            tracing::info!(id = %coin.id, "Added coin to watchlist");
            self.clear_search();
        }
        Ok(added)
    }

    /// Removes `id` from the watchlist; the watchlist is persisted either way
    pub fn remove_coin(&self, id: &str) -> Result<bool, StoreError> {
        let removed = self.watchlist.update(|w| Ok::<_, StoreError>(w.remove(id)))?;
        if removed {
            tracing::info!(id, "Removed coin from watchlist");
        }
        Ok(removed)
    }

    /// Moves the coin at `from` so that it ends up at index `to`
    ///
    /// `to` is the coin's final index, not an insertion offset: both indices
    /// must be `< len`, so moving the first of three coins to the end is
    /// `move_coin(0, 2)`. List widgets that report drag-and-drop as an
    /// insertion offset (where `len` means "after the last row") must
    /// subtract one when the offset is past `from`.
    ///
    /// # Returns
    /// `WatchlistError::IndexOutOfRange` without writing anything if either
    /// index is out of range
    pub fn move_coin(&self, from: usize, to: usize) -> Result<(), WatchlistError> {
        self.watchlist.update(|w| w.move_item(from, to))?;
        tracing::info!(from, to, "Reordered watchlist");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::mock::{MockFailure, MockProvider};
    use crate::store::{MemoryStore, WatchlistStore};

    struct Fixture {
        provider: Arc<MockProvider>,
        store: Arc<MemoryStore>,
        service: WatchlistService,
    }

    fn fixture() -> Fixture {
        let provider = Arc::new(MockProvider::new());
        provider.set_search_results(vec![
            Coin::new("cardano", "ada", "Cardano"),
            Coin::new("bitcoin", "btc", "Bitcoin"),
            Coin::new("bitcoin-cash", "bch", "Bitcoin Cash"),
        ]);
        let store = Arc::new(MemoryStore::new());
        let manager = Arc::new(WatchlistManager::load(store.clone()).unwrap());
        let service = WatchlistService::new(provider.clone(), manager);
        Fixture {
            provider,
            store,
            service,
        }
    }

    fn ids(watchlist: &Watchlist) -> Vec<&str> {
        watchlist.ids().iter().map(String::as_str).collect()
    }

    #[tokio::test]
    async fn test_search_results() {
        let f = fixture();
        f.service.search("  bitcoin ").await;

        let state = f.service.search_state();
        assert_eq!(state.text, "bitcoin");
        assert!(!state.is_searching);
        let found: Vec<&str> = state.results.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(found, ["bitcoin", "bitcoin-cash"]);
    }

    #[tokio::test]
    async fn test_blank_search_is_noop() {
        let f = fixture();
        f.service.search("   \n").await;

        assert_eq!(f.provider.search_calls(), 0);
        assert_eq!(f.service.search_state(), SearchState::default());
    }

    #[tokio::test]
    async fn test_search_failure_is_non_fatal() {
        let f = fixture();
        f.provider.set_search_failure(Some(MockFailure::Status(500)));
        f.service.search("cardano").await;

        let state = f.service.search_state();
        assert!(state.results.is_empty());
        assert!(!state.is_searching);
    }

    #[tokio::test]
    async fn test_is_searching_while_in_flight() {
        let f = fixture();
        f.provider.hold_calls();
        let service = Arc::new(f.service);

        let task = {
            let service = service.clone();
            tokio::spawn(async move { service.search("cardano").await })
        };
        while f.provider.search_calls() == 0 {
            tokio::task::yield_now().await;
        }
        assert!(service.search_state().is_searching);
        let mut updates = service.subscribe_search();

        f.provider.release(1);
        task.await.unwrap();
        assert!(updates.has_changed().unwrap());
        let state = updates.borrow_and_update().clone();
        assert!(!state.is_searching);
        assert_eq!(state.results.len(), 1);
        assert_eq!(state.text, "cardano");
    }

    #[tokio::test]
    async fn test_add_coin_appends_and_clears_search() {
        let f = fixture();
        f.service.search("cardano").await;
        let cardano = f.service.search_state().results[0].clone();

        assert!(f.service.add_coin(&cardano).unwrap());
        assert_eq!(
            ids(&f.service.watchlist()),
            ["bitcoin", "ethereum", "solana", "cardano"]
        );
        assert_eq!(f.store.load().unwrap(), f.service.watchlist());
        assert_eq!(f.service.search_state(), SearchState::default());
    }

    #[tokio::test]
    async fn test_add_present_coin_is_noop() {
        let f = fixture();
        f.service.search("bitcoin").await;
        let before = f.service.watchlist();

        let bitcoin = Coin::new("bitcoin", "btc", "Bitcoin");
        assert!(!f.service.add_coin(&bitcoin).unwrap());
        assert_eq!(f.service.watchlist(), before);
        // search is left alone
        assert_eq!(f.service.search_state().results.len(), 2);
    }

    #[test]
    fn test_remove_coin() {
        let f = fixture();
        assert!(f.service.remove_coin("ethereum").unwrap());
        assert!(!f.service.remove_coin("dogecoin").unwrap());

        assert_eq!(ids(&f.service.watchlist()), ["bitcoin", "solana"]);
        assert_eq!(f.store.load().unwrap(), f.service.watchlist());
    }

    #[test]
    fn test_remove_absent_still_persists() {
        let f = fixture();
        f.service.remove_coin("dogecoin").unwrap();
        assert_eq!(f.store.load().unwrap(), Watchlist::builtin());
    }

    #[test]
    fn test_move_coin() {
        let f = fixture();
        f.service.move_coin(2, 0).unwrap();
        assert_eq!(ids(&f.service.watchlist()), ["solana", "bitcoin", "ethereum"]);
        assert_eq!(f.store.load().unwrap(), f.service.watchlist());

        let err = f.service.move_coin(0, 5).unwrap_err();
        assert!(matches!(err, WatchlistError::IndexOutOfRange { .. }));
        assert_eq!(ids(&f.service.watchlist()), ["solana", "bitcoin", "ethereum"]);
    }

    #[test]
    fn test_move_coin_to_end_uses_last_index() {
        let f = fixture();
        let len = f.service.watchlist().len();

        assert!(matches!(
            f.service.move_coin(0, len),
            Err(WatchlistError::IndexOutOfRange { index: 3, len: 3 })
        ));
        f.service.move_coin(0, len - 1).unwrap();
        assert_eq!(ids(&f.service.watchlist()), ["ethereum", "solana", "bitcoin"]);
    }

    #[tokio::test]
    async fn test_superseded_search_is_discarded() {
        let f = fixture();
        f.provider.hold_calls();
        let service = Arc::new(f.service);

        let first = {
            let service = service.clone();
            tokio::spawn(async move { service.search("cardano").await })
        };
        while f.provider.search_calls() == 0 {
            tokio::task::yield_now().await;
        }
        service.clear_search();

        f.provider.release(1);
        first.await.unwrap();
        assert_eq!(service.search_state(), SearchState::default());
    }
}
