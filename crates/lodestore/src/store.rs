//! The keyed cache store.
//!
//! `CacheStore<V>` memoizes an expensive asynchronous lookup per string
//! key. Concurrent `get` calls for one key coalesce into a single fetch,
//! completed fetches are served from memory until invalidated, and the
//! tracked-entry count is bounded by policy-driven eviction.
//!
//! Values are stored and returned as `Arc<V>`, so a cache hit clones a
//! pointer rather than the payload.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tracing::{debug, warn};

use crate::config::StoreConfig;
use crate::entry::{Entry, EntryState};
use crate::error::{CacheError, Result};
use crate::eviction::{Candidate, plan_evictions};
use crate::fetch::Fetcher;
use crate::flight::{FetchOutcome, FlightMap, Join};
use crate::stats::{CacheStats, StatCounters};

/// A keyed single-flight cache over an asynchronous lookup.
///
/// Cloning is cheap and every clone operates on the same underlying store,
/// which is how independently constructed modules share one cache (usually
/// via a [`StoreRegistry`](crate::StoreRegistry)).
pub struct CacheStore<V> {
    inner: Arc<StoreInner<V>>,
}

struct StoreInner<V> {
    config: StoreConfig,
    entries: DashMap<String, Entry<V>>,
    flights: FlightMap<V>,
    fetcher: Arc<dyn Fetcher<Value = V>>,
    stats: StatCounters,
    evicting: AtomicBool,
}

impl<V: Send + Sync + 'static> CacheStore<V> {
    /// Create a store with the given configuration and fetch function.
    ///
    /// Fails with [`CacheError::Configuration`] on out-of-range parameters.
    pub fn new(config: StoreConfig, fetcher: impl Fetcher<Value = V>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(StoreInner {
                config,
                entries: DashMap::new(),
                flights: FlightMap::new(),
                fetcher: Arc::new(fetcher),
                stats: StatCounters::default(),
                evicting: AtomicBool::new(false),
            }),
        })
    }

    /// Create a store named `name` with default capacity and eviction
    /// fraction.
    pub fn with_name(name: impl Into<String>, fetcher: impl Fetcher<Value = V>) -> Result<Self> {
        Self::new(StoreConfig::new(name), fetcher)
    }

    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Number of tracked entries, in every state including pending and
    /// errored.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Get the cached value for `key`, fetching it if necessary.
    ///
    /// A `Ready` entry resolves immediately. Otherwise (untracked, errored,
    /// or a fetch already in flight) the caller suspends until a fetch for
    /// the key completes and resolves with that fetch's outcome; all
    /// concurrent callers for one key observe the identical result. An
    /// errored entry is never served as a hit — it re-triggers a fetch.
    pub async fn get(&self, key: &str) -> Result<Arc<V>> {
        if let Some(entry) = self.inner.entries.get(key) {
            if let EntryState::Ready(value) = &entry.state {
                self.inner.stats.record_hit();
                debug!(store = %self.name(), key = %key, "cache hit");
                return Ok(Arc::clone(value));
            }
        }

        self.inner.stats.record_miss();

        let rx = match self.inner.flights.join(key, || self.install_pending(key)) {
            Join::Ready(value) => return Ok(value),
            Join::Waiter(rx) => {
                self.inner.stats.record_coalesced();
                debug!(store = %self.name(), key = %key, "joined in-flight lookup");
                rx
            }
            Join::Leader(rx) => {
                debug!(store = %self.name(), key = %key, "starting lookup");
                tokio::spawn(run_fetch(Arc::clone(&self.inner), key.to_string()));
                rx
            }
        };

        match rx.await {
            Ok(outcome) => outcome,
            // The completion never reported; the fetch task died.
            Err(_) => Err(CacheError::aborted(key)),
        }
    }

    /// Unconditionally install a `Ready` entry for `key`.
    ///
    /// This is how a write path pre-populates the cache without paying a
    /// fetch (e.g. right after creating or updating the underlying record).
    /// Immediately visible to any `get` issued after it returns. Returns
    /// the installed `Arc` for use by the caller.
    pub fn set(&self, key: impl Into<String>, value: V) -> Arc<V> {
        let key = key.into();
        let value = Arc::new(value);
        match self.inner.entries.entry(key.clone()) {
            MapEntry::Occupied(mut occupied) => {
                occupied
                    .get_mut()
                    .transition(EntryState::Ready(Arc::clone(&value)));
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::ready(Arc::clone(&value)));
            }
        }
        debug!(store = %self.name(), key = %key, "cache set");
        value
    }

    /// Remove the entry for `key` if present. No-op for absent keys.
    ///
    /// Returns whether an entry was actually removed.
    pub fn remove(&self, key: &str) -> bool {
        let removed = self.inner.entries.remove(key).is_some();
        if removed {
            debug!(store = %self.name(), key = %key, "cache invalidated");
        }
        removed
    }

    /// Remove every listed key that is present.
    ///
    /// Returns the number of entries actually removed.
    pub fn remove_many<I, S>(&self, keys: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        keys.into_iter()
            .filter(|key| self.remove(key.as_ref()))
            .count()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.inner.entries.clear();
    }

    /// Snapshot the store's statistics.
    pub fn stats(&self) -> CacheStats {
        self.inner
            .stats
            .snapshot(self.inner.entries.len(), self.inner.config.capacity)
    }

    /// Leader-side entry transition, run under the key's flight guard.
    ///
    /// Re-reads the entry (a completion may have landed since the caller's
    /// miss): returns the value if the key is `Ready` after all, otherwise
    /// installs or re-enters `Pending` and lets the caller start the fetch.
    fn install_pending(&self, key: &str) -> Option<Arc<V>> {
        match self.inner.entries.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                if let EntryState::Ready(value) = &occupied.get().state {
                    return Some(Arc::clone(value));
                }
                occupied.get_mut().transition(EntryState::Pending);
                None
            }
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::pending());
                None
            }
        }
    }
}

/// Run one fetch to completion and publish the outcome.
///
/// Spawned as its own task so a started fetch always completes even if
/// every waiting caller is cancelled. The fetcher itself runs in a nested
/// task so a panic inside it surfaces as an `Aborted` outcome instead of
/// leaving the flight's waiters hanging.
async fn run_fetch<V: Send + Sync + 'static>(inner: Arc<StoreInner<V>>, key: String) {
    let fetcher = Arc::clone(&inner.fetcher);
    let fetch_key = key.clone();
    let result = tokio::spawn(async move { fetcher.fetch(&fetch_key).await }).await;

    let outcome: FetchOutcome<V> = match result {
        Ok(Ok(value)) => Ok(Arc::new(value)),
        Ok(Err(error)) => Err(CacheError::fetch(key.as_str(), error)),
        Err(join_error) => {
            if join_error.is_panic() {
                warn!(store = %inner.config.name, key = %key, "fetch task panicked");
            }
            Err(CacheError::aborted(key.as_str()))
        }
    };

    let waiters = inner.flights.complete(&key, || {
        let state = match &outcome {
            Ok(value) => EntryState::Ready(Arc::clone(value)),
            Err(error) => EntryState::Errored(error.clone()),
        };
        match inner.entries.entry(key.clone()) {
            MapEntry::Occupied(mut occupied) => occupied.get_mut().transition(state),
            // The entry was invalidated while the fetch was in flight; the
            // completion still lands (best-effort invalidation contract).
            MapEntry::Vacant(vacant) => {
                vacant.insert(Entry::with_state(state));
            }
        }
    });

    match &outcome {
        Ok(_) => {
            debug!(store = %inner.config.name, key = %key, waiters = waiters.len(), "lookup completed")
        }
        Err(error) => {
            debug!(store = %inner.config.name, key = %key, error = %error, "lookup failed")
        }
    }

    for waiter in waiters {
        let _ = waiter.send(outcome.clone());
    }

    maybe_evict(&inner);
}

/// Reclaim entries if the store has grown to capacity.
///
/// No-op below capacity. At most one sweep runs at a time; a victim that
/// turned `Pending` after the snapshot is skipped.
fn maybe_evict<V>(inner: &StoreInner<V>) {
    if inner.entries.len() < inner.config.capacity {
        return;
    }
    if inner.evicting.swap(true, Ordering::AcqRel) {
        return;
    }

    let quota = inner.config.eviction_quota();
    let candidates: Vec<Candidate> = inner
        .entries
        .iter()
        .filter(|entry| !entry.is_pending())
        .map(|entry| Candidate {
            key: entry.key().clone(),
            errored: entry.is_errored(),
            updated_at: entry.updated_at,
        })
        .collect();

    let mut removed = 0u64;
    for key in plan_evictions(candidates, quota) {
        if inner
            .entries
            .remove_if(&key, |_, entry| !entry.is_pending())
            .is_some()
        {
            removed += 1;
        }
    }

    if removed > 0 {
        inner.stats.record_evictions(removed);
        debug!(
            store = %inner.config.name,
            removed,
            quota,
            size = inner.entries.len(),
            "evicted entries over capacity"
        );
    }

    inner.evicting.store(false, Ordering::Release);
}

impl<V> Clone for CacheStore<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> fmt::Debug for CacheStore<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("name", &self.inner.config.name)
            .field("size", &self.inner.entries.len())
            .field("capacity", &self.inner.config.capacity)
            .finish()
    }
}
