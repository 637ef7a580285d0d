//! External invalidation of cached keys.
//!
//! The cache performs no automatic invalidation: any collaborator that
//! mutates data embedded in a cached value must, after the mutation
//! commits, discard every affected key from every store that might hold a
//! stale copy. Three routes exist, from most to least coupled:
//!
//! 1. call `remove` on a store handle directly;
//! 2. hold a [`StoreInvalidator`] — a typed "invalidate these keys" handle
//!    that hides the value type — obtained from a
//!    [`StoreRegistry`](crate::StoreRegistry);
//! 3. publish an [`InvalidationEvent`] on an [`InvalidationBus`] that an
//!    [`InvalidationListener`] subscribed to at startup applies through the
//!    registry.
//!
//! The contract is best-effort, at-least-once: an invalidation racing a
//! concurrently completing fetch can lose, leaving the fetch's outcome in
//! place until the key is invalidated again or evicted.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::registry::StoreRegistry;
use crate::store::CacheStore;

/// Default buffer size for the invalidation broadcast channel.
const DEFAULT_BUS_CAPACITY: usize = 1024;

/// The "invalidate these keys" handle a mutating collaborator holds.
///
/// Object-safe so stores with different value types can be reached through
/// one registry.
pub trait StoreInvalidator: Send + Sync {
    /// The name of the store this handle invalidates.
    fn store_name(&self) -> &str;

    /// Discard one key. Returns whether an entry was removed.
    fn remove(&self, key: &str) -> bool;

    /// Discard every listed key. Returns the number of entries removed.
    fn remove_many(&self, keys: &[String]) -> usize;
}

impl<V: Send + Sync + 'static> StoreInvalidator for CacheStore<V> {
    fn store_name(&self) -> &str {
        self.name()
    }

    fn remove(&self, key: &str) -> bool {
        CacheStore::remove(self, key)
    }

    fn remove_many(&self, keys: &[String]) -> usize {
        CacheStore::remove_many(self, keys)
    }
}

/// A structured invalidation signal: discard `keys` from the store named
/// `store`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationEvent {
    pub store: String,
    pub keys: Vec<String>,
}

impl InvalidationEvent {
    pub fn new(store: impl Into<String>, keys: Vec<String>) -> Self {
        Self {
            store: store.into(),
            keys,
        }
    }

    /// An event discarding a single key.
    pub fn single(store: impl Into<String>, key: impl Into<String>) -> Self {
        Self::new(store, vec![key.into()])
    }
}

/// Broadcast channel for invalidation events.
///
/// Clonable and shareable; every subscriber receives every event published
/// after it subscribed.
#[derive(Clone)]
pub struct InvalidationBus {
    sender: broadcast::Sender<InvalidationEvent>,
}

impl InvalidationBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    ///
    /// Returns the number of subscribers that received it; 0 if none are
    /// active.
    pub fn publish(&self, event: InvalidationEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<InvalidationEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for InvalidationBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InvalidationBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InvalidationBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Applies published invalidation events to registered stores.
///
/// Subscribed explicitly at startup by the module that owns the registry;
/// events for unknown store names are skipped.
pub struct InvalidationListener {
    registry: Arc<StoreRegistry>,
}

impl InvalidationListener {
    pub fn new(registry: Arc<StoreRegistry>) -> Self {
        Self { registry }
    }

    /// Start applying events from `events` until the bus is closed.
    ///
    /// Runs as a background task. A lagged receiver drops the missed
    /// events and keeps going.
    pub fn start(self, mut events: broadcast::Receiver<InvalidationEvent>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => self.apply(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "invalidation listener lagged, events dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("invalidation bus closed, listener stopping");
                        break;
                    }
                }
            }
        })
    }

    fn apply(&self, event: &InvalidationEvent) {
        match self.registry.invalidator(&event.store) {
            Some(invalidator) => {
                let removed = invalidator.remove_many(&event.keys);
                debug!(
                    store = %event.store,
                    keys = event.keys.len(),
                    removed,
                    "applied invalidation"
                );
            }
            None => {
                debug!(store = %event.store, "invalidation for unknown store, skipping");
            }
        }
    }
}
