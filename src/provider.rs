//! Provider abstraction for the remote market-data API

use crate::{error::ProviderError, types::Coin};
use async_trait::async_trait;

/// Trait for market-data providers
///
/// Both queries are read-only and never retried; retry policy belongs to the
/// caller (the scheduler simply waits for its next tick).
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Fetches price and 24h change for the given coin ids
    ///
    /// # Arguments
    /// * `ids` - Non-empty list of API coin ids
    ///
    /// # Returns
    /// The coins the API knows about, in whatever order the API chose.
    /// Unknown ids are simply absent.
    async fn fetch_market(&self, ids: &[String]) -> Result<Vec<Coin>, ProviderError>;

    /// Free-text search; returns at most ten coins without market fields
    async fn search_coins(&self, query: &str) -> Result<Vec<Coin>, ProviderError>;

    /// Returns the name of this provider
    fn provider_name(&self) -> &'static str;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    /// Scripted failure, rebuilt on every call since `ProviderError` is not `Clone`
    #[derive(Debug, Clone, Copy)]
    pub enum MockFailure {
        Status(u16),
        Decode,
    }

    impl MockFailure {
        fn to_error(self) -> ProviderError {
            match self {
                MockFailure::Status(code) => ProviderError::HttpStatus(code),
                MockFailure::Decode => ProviderError::decode("mock decode failure"),
            }
        }
    }

    /// Mock provider for testing
    ///
    /// `fetch_market` answers from a fixed table of coins, keeping the table's
    /// order rather than the request's so tests can check reordering.
    pub struct MockProvider {
        market: Mutex<Vec<Coin>>,
        market_failure: Mutex<Option<MockFailure>>,
        search_results: Mutex<Vec<Coin>>,
        search_failure: Mutex<Option<MockFailure>>,
        fetch_calls: AtomicUsize,
        search_calls: AtomicUsize,
        requested: Mutex<Vec<Vec<String>>>,
        gate: Mutex<Option<Arc<Semaphore>>>,
    }

    impl Default for MockProvider {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                market: Mutex::new(Vec::new()),
                market_failure: Mutex::new(None),
                search_results: Mutex::new(Vec::new()),
                search_failure: Mutex::new(None),
                fetch_calls: AtomicUsize::new(0),
                search_calls: AtomicUsize::new(0),
                requested: Mutex::new(Vec::new()),
                gate: Mutex::new(None),
            }
        }

        /// Sets the coins the API "knows", in response order
        pub fn set_market(&self, coins: Vec<Coin>) {
            *self.market.lock() = coins;
        }

        pub fn set_market_failure(&self, failure: Option<MockFailure>) {
            *self.market_failure.lock() = failure;
        }

        pub fn set_search_results(&self, coins: Vec<Coin>) {
            *self.search_results.lock() = coins;
        }

        pub fn set_search_failure(&self, failure: Option<MockFailure>) {
            *self.search_failure.lock() = failure;
        }

        /// Makes every call wait for a permit released through [`Self::release`]
        pub fn hold_calls(&self) {
            *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
        }

        pub fn release(&self, calls: usize) {
            if let Some(gate) = self.gate.lock().as_ref() {
                gate.add_permits(calls);
            }
        }

        pub fn fetch_calls(&self) -> usize {
            self.fetch_calls.load(Ordering::SeqCst)
        }

        pub fn search_calls(&self) -> usize {
            self.search_calls.load(Ordering::SeqCst)
        }

        /// Id lists passed to `fetch_market`, one entry per call
        pub fn requested(&self) -> Vec<Vec<String>> {
            self.requested.lock().clone()
        }

        async fn wait_for_gate(&self) {
            let gate = self.gate.lock().clone();
            if let Some(gate) = gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        async fn fetch_market(&self, ids: &[String]) -> Result<Vec<Coin>, ProviderError> {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().push(ids.to_vec());
            self.wait_for_gate().await;

            if let Some(failure) = *self.market_failure.lock() {
                return Err(failure.to_error());
            }
            Ok(self
                .market
                .lock()
                .iter()
                .filter(|coin| ids.contains(&coin.id))
                .cloned()
                .collect())
        }

        async fn search_coins(&self, query: &str) -> Result<Vec<Coin>, ProviderError> {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.wait_for_gate().await;

            if let Some(failure) = *self.search_failure.lock() {
                return Err(failure.to_error());
            }
            let query = query.to_lowercase();
            Ok(self
                .search_results
                .lock()
                .iter()
                .filter(|coin| {
                    coin.id.contains(&query) || coin.name.to_lowercase().contains(&query)
                })
                .cloned()
                .collect())
        }

        fn provider_name(&self) -> &'static str {
            "mock"
        }
    }

    /// A market record the way the API returns it
    pub fn priced(id: &str, price: f64) -> Coin {
        Coin::new(id, &id[..3.min(id.len())], id).with_market(price, Some(1.0), Some(0.5))
    }
}
