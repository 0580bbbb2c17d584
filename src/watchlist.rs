//! The ordered watchlist and its persisted owner

use crate::{
    constants::DEFAULT_WATCHLIST,
    error::{StoreError, WatchlistError},
    store::WatchlistStore,
    types::{Coin, Preferences},
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Ordered list of tracked coin ids, never containing duplicates
///
/// Serialized as a plain JSON array. Deserializing goes through
/// [`Watchlist::from_ids`], so repeated ids collapse to their first occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Watchlist {
    ids: Vec<String>,
}

impl From<Vec<String>> for Watchlist {
    fn from(ids: Vec<String>) -> Self {
        Self::from_ids(ids)
    }
}

impl From<Watchlist> for Vec<String> {
    fn from(watchlist: Watchlist) -> Self {
        watchlist.ids
    }
}

impl Watchlist {
    /// Builds a watchlist, keeping the first occurrence of any repeated id
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut watchlist = Self::default();
        for id in ids {
            watchlist.push(id);
        }
        watchlist
    }

    /// `bitcoin`, `ethereum`, `solana`
    pub fn builtin() -> Self {
        Self::from_ids(DEFAULT_WATCHLIST.iter().copied())
    }

    /// Ids in user order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Number of tracked ids
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// True if `id` is tracked
    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|existing| existing == id)
    }

    /// Index of `id` in user order
    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|existing| existing == id)
    }

    /// Appends `id`; returns false (and changes nothing) if already present
    pub fn push(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    /// Removes `id`; returns false if it was not present
    pub fn remove(&mut self, id: &str) -> bool {
        match self.position(id) {
            Some(index) => {
                self.ids.remove(index);
                true
            }
            None => false,
        }
    }

    /// Moves the element at `from` so that it ends up at index `to`
    pub fn move_item(&mut self, from: usize, to: usize) -> Result<(), WatchlistError> {
        let len = self.ids.len();
        for index in [from, to] {
            if index >= len {
                return Err(WatchlistError::IndexOutOfRange { index, len });
            }
        }
        let id = self.ids.remove(from);
        self.ids.insert(to, id);
        Ok(())
    }

    /// Puts fetched coins into watchlist order
    ///
    /// Each watchlist id takes the first returned coin with that id. Coins the
    /// watchlist does not name follow, in the order they were returned; extra
    /// copies of an id that was already placed are dropped. Also returns the
    /// watchlist ids that had no coin in the response.
    pub fn arrange(&self, coins: Vec<Coin>) -> (Vec<Coin>, Vec<String>) {
        let mut slots: Vec<Option<Coin>> = vec![None; self.ids.len()];
        let mut unlisted = Vec::new();
        let mut seen_unlisted = HashSet::new();

        for coin in coins {
            match self.position(&coin.id) {
                Some(index) => {
                    if slots[index].is_none() {
                        slots[index] = Some(coin);
                    }
                }
                None => {
                    if seen_unlisted.insert(coin.id.clone()) {
                        unlisted.push(coin);
                    }
                }
            }
        }

        let missing = self
            .ids
            .iter()
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(id, _)| id.clone())
            .collect();

        let mut ordered: Vec<Coin> = slots.into_iter().flatten().collect();
        ordered.extend(unlisted);
        (ordered, missing)
    }
}

/// Single owner of the loaded watchlist and preferences
///
/// Every mutation edits a draft under the lock, persists the draft, and only
/// then commits it. A failed write leaves the in-memory value untouched, and
/// two callers can never both start from the same stale copy.
pub struct WatchlistManager {
    store: Arc<dyn WatchlistStore>,
    watchlist: Mutex<Watchlist>,
    preferences: Mutex<Preferences>,
}

impl WatchlistManager {
    /// Loads both values from `store`
    pub fn load(store: Arc<dyn WatchlistStore>) -> Result<Self, StoreError> {
        let watchlist = store.load()?;
        let preferences = store.load_preferences()?;
        tracing::info!(
            coins = watchlist.len(),
            auto_update_enabled = preferences.auto_update_enabled,
            "Loaded watchlist"
        );
        Ok(Self {
            store,
            watchlist: Mutex::new(watchlist),
            preferences: Mutex::new(preferences),
        })
    }

    /// Snapshot of the current watchlist
    pub fn watchlist(&self) -> Watchlist {
        self.watchlist.lock().clone()
    }

    /// Current preferences
    pub fn preferences(&self) -> Preferences {
        *self.preferences.lock()
    }

    /// Applies `edit` to the watchlist and persists the result
    ///
    /// If `edit` fails nothing is written. The store is written even when
    /// `edit` leaves the list unchanged.
    pub fn update<R, E>(&self, edit: impl FnOnce(&mut Watchlist) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut current = self.watchlist.lock();
        let mut draft = current.clone();
        let result = edit(&mut draft)?;
        self.store.save(&draft)?;
        *current = draft;
        Ok(result)
    }

    /// Applies `edit` to the preferences and persists the result
    pub fn update_preferences(
        &self,
        edit: impl FnOnce(&mut Preferences),
    ) -> Result<Preferences, StoreError> {
        let mut current = self.preferences.lock();
        let mut draft = *current;
        edit(&mut draft);
        self.store.save_preferences(&draft)?;
        *current = draft;
        Ok(draft)
    }
}
