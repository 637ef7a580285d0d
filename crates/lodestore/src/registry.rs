//! Name-based store directory.
//!
//! A `StoreRegistry` lets independently constructed modules reach the same
//! cache without sharing a reference: stores register under their
//! configured name, and a module that only knows "role X changed" looks up
//! the store by name to invalidate the affected keys. The registry is an
//! explicitly constructed object passed (usually as `Arc<StoreRegistry>`)
//! to every module that needs cross-store invalidation; it is never
//! cleared automatically and lives as long as its owner keeps it.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::invalidation::StoreInvalidator;
use crate::store::CacheStore;

struct RegisteredStore {
    /// The concrete `CacheStore<V>`, recoverable via downcast.
    typed: Arc<dyn Any + Send + Sync>,
    /// The type-erased invalidation handle.
    invalidator: Arc<dyn StoreInvalidator>,
}

/// Directory from store name to store instance.
#[derive(Default)]
pub struct StoreRegistry {
    stores: DashMap<String, RegisteredStore>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self {
            stores: DashMap::new(),
        }
    }

    /// Create a registry wrapped in an `Arc` for sharing across modules.
    pub fn new_shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Bind `store` under its configured name.
    ///
    /// Rebinding an already-used name replaces the prior binding; the
    /// replacement is logged at WARN.
    pub fn register<V: Send + Sync + 'static>(&self, store: &CacheStore<V>) {
        let name = store.name().to_string();
        let registered = RegisteredStore {
            typed: Arc::new(store.clone()),
            invalidator: Arc::new(store.clone()),
        };
        if self.stores.insert(name.clone(), registered).is_some() {
            warn!(store = %name, "replaced existing store registration");
        } else {
            debug!(store = %name, "registered store");
        }
    }

    /// Look up the store bound to `name`.
    ///
    /// Returns `None` if the name is unbound or bound to a store with a
    /// different value type.
    pub fn lookup<V: Send + Sync + 'static>(&self, name: &str) -> Option<CacheStore<V>> {
        let registered = self.stores.get(name)?;
        let typed = Arc::clone(&registered.typed);
        typed
            .downcast::<CacheStore<V>>()
            .ok()
            .map(|store| (*store).clone())
    }

    /// Look up the invalidation handle for `name`, for modules that only
    /// discard keys and never read values.
    pub fn invalidator(&self, name: &str) -> Option<Arc<dyn StoreInvalidator>> {
        self.stores
            .get(name)
            .map(|registered| Arc::clone(&registered.invalidator))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stores.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.stores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.is_empty()
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.stores.len())
            .finish()
    }
}
