//! The externally supplied lookup a store memoizes.

use std::future::Future;

use async_trait::async_trait;
use futures_util::future::BoxFuture;

/// The asynchronous lookup a [`CacheStore`](crate::CacheStore) memoizes.
///
/// Implementations must be safe to call repeatedly for the same key: a key
/// is re-fetched after eviction, after invalidation, and after a failed
/// fetch. The fetcher must not call back into the store it feeds — a
/// re-entrant `get` or `set` on the same store races the in-progress
/// pending transition.
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    type Value: Send + Sync + 'static;

    /// Load the value for `key` from the source of truth.
    ///
    /// The store captures the error verbatim and surfaces it to every
    /// caller waiting on the key; it never retries on its own.
    async fn fetch(&self, key: &str) -> anyhow::Result<Self::Value>;
}

/// A [`Fetcher`] built from an async closure.
///
/// See [`fetch_fn`].
pub struct FnFetcher<V> {
    f: Box<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<V>> + Send + Sync>,
}

/// Adapt an async closure into a [`Fetcher`].
///
/// ```
/// use lodestore::fetch_fn;
///
/// let fetcher = fetch_fn(|key: String| async move {
///     Ok::<_, anyhow::Error>(format!("value for {key}"))
/// });
/// # let _ = fetcher;
/// ```
pub fn fetch_fn<V, F, Fut>(f: F) -> FnFetcher<V>
where
    V: Send + Sync + 'static,
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
{
    FnFetcher {
        f: Box::new(move |key| Box::pin(f(key))),
    }
}

#[async_trait]
impl<V: Send + Sync + 'static> Fetcher for FnFetcher<V> {
    type Value = V;

    async fn fetch(&self, key: &str) -> anyhow::Result<V> {
        (self.f)(key.to_string()).await
    }
}
