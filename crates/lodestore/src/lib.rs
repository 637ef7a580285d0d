//! Keyed single-flight cache for memoizing expensive asynchronous lookups.
//!
//! `lodestore` sits between a hot read path and a slow source of truth
//! (the motivating consumer hydrates a principal's identity from an opaque
//! token id on every request). It guarantees:
//!
//! - **Single-flight**: concurrent `get` calls for one key coalesce into a
//!   single underlying fetch; every caller observes the identical outcome.
//! - **Bounded footprint**: once the tracked-entry count reaches the
//!   configured capacity, a completed fetch triggers an eviction sweep that
//!   reclaims errored entries first, then the oldest ready entries.
//! - **External invalidation**: collaborators that mutate the source of
//!   truth discard affected keys through a store handle, a name-based
//!   [`StoreRegistry`], or an [`InvalidationBus`] the cache subscribes to.
//!
//! ## Architecture
//!
//! ```text
//! get(key) ──► CacheStore ──► FlightMap (one fetch per key, waiter lists)
//!                  │                │
//!                  │                ▼
//!                  │           Fetcher::fetch (supplied by the caller)
//!                  │                │
//!                  ▼                ▼
//!              entries map ◄── completion (resolve waiters, evict)
//!                  ▲
//!                  │ remove(keys)
//!  InvalidationBus ─► InvalidationListener ─► StoreRegistry
//! ```
//!
//! Failed fetches are surfaced to every waiting caller and are never
//! sticky: the next `get` for the key fetches again. Entries have no
//! time-based expiry; staleness is handled by explicit invalidation.
//!
//! ## Example
//!
//! ```
//! use lodestore::{CacheStore, StoreConfig, fetch_fn};
//!
//! # async fn demo() -> lodestore::Result<()> {
//! let users = CacheStore::new(
//!     StoreConfig::new("user-store").with_capacity(500),
//!     fetch_fn(|id: String| async move {
//!         // load from the source of truth
//!         Ok::<_, anyhow::Error>(format!("user:{id}"))
//!     }),
//! )?;
//!
//! // First call fetches; concurrent calls for "42" would share it.
//! let value = users.get("42").await?;
//! assert_eq!(*value, "user:42");
//!
//! // A write path pre-populates without paying a fetch.
//! users.set("7", "user:7".to_string());
//! # Ok(())
//! # }
//! # tokio_test::block_on(demo()).unwrap();
//! ```

pub mod config;
pub mod entry;
pub mod error;
pub mod fetch;
pub mod invalidation;
pub mod registry;
pub mod stats;
pub mod store;

mod eviction;
mod flight;

pub use config::{DEFAULT_CAPACITY, DEFAULT_EVICTION_FRACTION, StoreConfig};
pub use entry::{Entry, EntryState};
pub use error::{CacheError, Result};
pub use fetch::{Fetcher, FnFetcher, fetch_fn};
pub use invalidation::{
    InvalidationBus, InvalidationEvent, InvalidationListener, StoreInvalidator,
};
pub use registry::StoreRegistry;
pub use stats::CacheStats;
pub use store::CacheStore;
