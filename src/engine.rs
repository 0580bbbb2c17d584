//! Watchlist sync engine
//!
//! Owns the observable [`SyncState`], drives the scheduler, and merges fetched
//! market data back into watchlist order.

use crate::{
    config::SyncConfig,
    constants::EVENT_CHANNEL_CAPACITY,
    error::{EngineError, StoreError, SyncError},
    metrics::{SyncMetrics, SyncMetricsSnapshot},
    provider::MarketDataProvider,
    providers::CoinGeckoProvider,
    scheduler::SyncScheduler,
    service::WatchlistService,
    store::{FileStore, WatchlistStore},
    types::{Coin, Preferences, RefreshOutcome, SyncEvent, SyncState, SyncStatus},
    watchlist::{Watchlist, WatchlistManager},
};
use chrono::Utc;
use parking_lot::Mutex;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, watch};

/// Watchlist sync engine
///
/// Build one with [`SyncEngine::from_config`] (CoinGecko plus a preferences
/// file) or [`SyncEngine::new`] (any provider and store), then call
/// [`SyncEngine::start`].
///
/// # Example
/// ```no_run
/// use ticker_sync::{SyncConfig, SyncEngine};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = SyncEngine::from_config(&SyncConfig::from_env())?;
/// engine.start();
///
/// let mut updates = engine.subscribe();
/// while updates.changed().await.is_ok() {
///     for coin in &updates.borrow().coins {
///         println!("{}: {:?}", coin.symbol, coin.current_price);
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct SyncEngine {
    provider: Arc<dyn MarketDataProvider>,
    watchlist: Arc<WatchlistManager>,
    service: WatchlistService,
    state: watch::Sender<SyncState>,
    events: broadcast::Sender<SyncEvent>,
    scheduler: Mutex<SyncScheduler>,
    /// Held for the duration of one refresh pass
    refresh_lock: tokio::sync::Mutex<()>,
    /// Set by every `refresh` call, cleared by the pass that serves it
    refresh_pending: AtomicBool,
    metrics: SyncMetrics,
}

impl SyncEngine {
    /// Creates an engine backed by CoinGecko and a preferences file
    pub fn from_config(config: &SyncConfig) -> Result<Arc<Self>, EngineError> {
        let provider = Arc::new(CoinGeckoProvider::from_config(config)?);
        let store = Arc::new(FileStore::new(&config.store_path));
        tracing::info!(
            api_base_url = %config.api_base_url,
            store_path = %store.path().display(),
            "Creating sync engine"
        );
        Ok(Self::new(provider, store, config.refresh_interval)?)
    }

    /// Creates an engine with a custom provider and store
    ///
    /// Loads the watchlist and preferences once; nothing is fetched until
    /// [`SyncEngine::start`] or [`SyncEngine::refresh`] is called.
    ///
    /// # Arguments
    /// * `provider` - Market-data source for refreshes and searches
    /// * `store` - Persistence for the watchlist and preferences
    /// * `refresh_interval` - Scheduler period; zero falls back to the default
    ///
    /// # Returns
    /// The shared engine, or the store's I/O error if loading failed
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn WatchlistStore>,
        refresh_interval: Duration,
    ) -> Result<Arc<Self>, StoreError> {
        let watchlist = Arc::new(WatchlistManager::load(store)?);
        let service = WatchlistService::new(provider.clone(), watchlist.clone());
        let (state, _) = watch::channel(SyncState::default());
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let metrics = SyncMetrics::new(provider.provider_name());

        Ok(Arc::new(Self {
            provider,
            watchlist,
            service,
            state,
            events,
            scheduler: Mutex::new(SyncScheduler::new(refresh_interval)),
            refresh_lock: tokio::sync::Mutex::new(()),
            refresh_pending: AtomicBool::new(false),
            metrics,
        }))
    }

    /// Begins syncing
    ///
    /// With auto-update on, starts the scheduler (which refreshes right away).
    /// With it off, performs a single refresh in the background. Must be
    /// called from within a Tokio runtime.
    pub fn start(self: &Arc<Self>) {
        if self.preferences().auto_update_enabled {
            self.scheduler.lock().start(self.tick_fn());
        } else {
            let engine = Arc::downgrade(self);
            tokio::spawn(async move {
                if let Some(engine) = engine.upgrade() {
                    engine.refresh().await;
                }
            });
        }
    }

    /// Stops the scheduler; an in-flight refresh still completes
    pub fn shutdown(&self) {
        self.scheduler.lock().stop();
    }

    fn tick_fn(
        self: &Arc<Self>,
    ) -> impl FnMut() -> futures::future::BoxFuture<'static, ControlFlow<()>> + Send + 'static
    {
        use futures::FutureExt;

        let engine = Arc::downgrade(self);
        move || {
            let engine = engine.clone();
            async move {
                match engine.upgrade() {
                    Some(engine) => {
                        engine.refresh().await;
                        ControlFlow::Continue(())
                    }
                    None => ControlFlow::Break(()),
                }
            }
            .boxed()
        }
    }

    /// Fetches market data for the watchlist and publishes the result
    ///
    /// At most one refresh pass runs at a time. A call made while a pass is in
    /// flight returns [`RefreshOutcome::Coalesced`] at once, and the running
    /// call performs exactly one more pass after the current one, so edits made
    /// in the meantime are picked up.
    ///
    /// The passes run on a task owned by the engine. Dropping the returned
    /// future (a timeout, a `select!` branch, an aborted task) only stops the
    /// wait; the pass in flight and any coalesced pass still complete.
    pub async fn refresh(self: &Arc<Self>) -> RefreshOutcome {
        self.refresh_pending.store(true, Ordering::SeqCst);

        let engine = Arc::clone(self);
        match tokio::spawn(async move { engine.drain_refreshes().await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "Refresh task ended abnormally");
                self.publish_failure(format!("Refresh task ended abnormally: {}", e))
            }
        }
    }

    /// Runs passes until no request is pending, or returns `Coalesced` at
    /// once if another task holds the refresh lock
    async fn drain_refreshes(&self) -> RefreshOutcome {
        let mut outcome = RefreshOutcome::Coalesced;

        loop {
            let Ok(guard) = self.refresh_lock.try_lock() else {
                tracing::debug!("Refresh already in flight, coalescing");
                return outcome;
            };

            if self.refresh_pending.swap(false, Ordering::SeqCst) {
                outcome = self.run_refresh().await;
                drop(guard);
                continue;
            }

            // A request may have landed between the swap and the unlock
            drop(guard);
            if !self.refresh_pending.load(Ordering::SeqCst) {
                return outcome;
            }
        }
    }

    async fn run_refresh(&self) -> RefreshOutcome {
        let watchlist = self.watchlist.watchlist();
        if watchlist.is_empty() {
            return self.fail(SyncError::EmptyWatchlist);
        }

        self.state
            .send_modify(|state| state.status = SyncStatus::Loading);

        let start = Instant::now();
        let result = self.provider.fetch_market(watchlist.ids()).await;
        self.metrics.record_fetch(start.elapsed(), result.is_ok());

        match result {
            Ok(coins) => {
                let returned = coins.len();
                let (ordered, missing) = watchlist.arrange(coins);
                let count = ordered.len();
                let now = Utc::now();

                self.state.send_modify(|state| {
                    state.coins = ordered;
                    state.status = SyncStatus::Succeeded(now);
                    state.last_updated = Some(now);
                });

                tracing::debug!(
                    requested = watchlist.len(),
                    returned,
                    provider = self.provider.provider_name(),
                    latency_ms = start.elapsed().as_millis() as u64,
                    "Successfully refreshed market data"
                );
                if !missing.is_empty() {
                    tracing::debug!(missing = ?missing, "Watchlist ids absent from response");
                }

                let _ = self.events.send(SyncEvent::refresh_succeeded(count, missing));
                RefreshOutcome::Updated { coins: count }
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    provider = self.provider.provider_name(),
                    "Failed to refresh market data"
                );
                self.fail(SyncError::from(e))
            }
        }
    }

    /// Publishes a failure; displayed coins are left as they were
    fn fail(&self, error: SyncError) -> RefreshOutcome {
        self.publish_failure(error.to_string())
    }

    fn publish_failure(&self, message: String) -> RefreshOutcome {
        self.state
            .send_modify(|state| state.status = SyncStatus::Failed(message.clone()));
        let _ = self.events.send(SyncEvent::refresh_failed(message.clone()));
        RefreshOutcome::Failed { message }
    }

    /// Flips auto-update, persists it, and starts or stops the scheduler
    ///
    /// Returns the new value.
    pub fn toggle_auto_update(self: &Arc<Self>) -> Result<bool, StoreError> {
        self.apply_auto_update(|enabled| !enabled)
    }

    /// Sets auto-update, persists it, and starts or stops the scheduler
    pub fn set_auto_update(self: &Arc<Self>, enabled: bool) -> Result<(), StoreError> {
        self.apply_auto_update(|_| enabled).map(|_| ())
    }

    fn apply_auto_update(
        self: &Arc<Self>,
        next: impl FnOnce(bool) -> bool,
    ) -> Result<bool, StoreError> {
        // scheduler before preferences, so concurrent toggles apply in order
        let mut scheduler = self.scheduler.lock();
        let preferences = self
            .watchlist
            .update_preferences(|p| p.auto_update_enabled = next(p.auto_update_enabled))?;
        let enabled = preferences.auto_update_enabled;

        if enabled {
            scheduler.start(self.tick_fn());
        } else {
            scheduler.stop();
        }
        drop(scheduler);

        tracing::info!(enabled, "Auto-update preference changed");
        let _ = self.events.send(SyncEvent::auto_update_changed(enabled));
        Ok(enabled)
    }

    /// True while the scheduler is running
    pub fn is_auto_updating(&self) -> bool {
        self.scheduler.lock().is_enabled()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> SyncState {
        self.state.borrow().clone()
    }

    /// Currently displayed coins, in watchlist order
    pub fn coins(&self) -> Vec<Coin> {
        self.state.borrow().coins.clone()
    }

    /// Receiver that observes every state transition
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    /// Stream of refresh and preference events
    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Current preferences, as last persisted
    pub fn preferences(&self) -> Preferences {
        self.watchlist.preferences()
    }

    /// Snapshot of the watchlist in user order
    ///
    /// Edits go through [`SyncEngine::service`]; the displayed coins follow
    /// this order after the next refresh.
    pub fn watchlist(&self) -> Watchlist {
        self.watchlist.watchlist()
    }

    /// Period between scheduled refreshes
    pub fn refresh_interval(&self) -> Duration {
        self.scheduler.lock().interval()
    }

    /// Search/add/remove/reorder surface sharing this engine's watchlist
    pub fn service(&self) -> &WatchlistService {
        &self.service
    }

    /// Returns the name of the current provider
    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Fetch latency and success-rate metrics
    pub fn metrics(&self) -> SyncMetricsSnapshot {
        self.metrics.snapshot()
    }
}
