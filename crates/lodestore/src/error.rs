use std::sync::Arc;

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by a [`CacheStore`](crate::CacheStore).
///
/// The enum is `Clone` because a single fetch outcome resolves every caller
/// waiting on the same key; the underlying fetch error is shared behind an
/// `Arc` rather than duplicated per waiter.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The externally supplied fetch function failed. The error is captured
    /// verbatim and delivered to every caller waiting on the key. It is not
    /// retried automatically; the next `get` for the key starts a new fetch.
    #[error("lookup for key `{key}` failed: {cause}")]
    Fetch {
        key: String,
        cause: Arc<anyhow::Error>,
    },

    /// The fetch task terminated without producing an outcome (the fetch
    /// function panicked). Waiters receive this instead of hanging; the key
    /// is fetchable again on the next `get`.
    #[error("lookup for key `{key}` was aborted before completing")]
    Aborted { key: String },

    /// Invalid store construction parameters.
    #[error("invalid store configuration: {0}")]
    Configuration(String),
}

impl CacheError {
    /// Create a new Fetch error wrapping the supplied cause.
    pub fn fetch(key: impl Into<String>, cause: anyhow::Error) -> Self {
        Self::Fetch {
            key: key.into(),
            cause: Arc::new(cause),
        }
    }

    /// Create a new Aborted error.
    pub fn aborted(key: impl Into<String>) -> Self {
        Self::Aborted { key: key.into() }
    }

    /// Create a new Configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// The key the failed lookup was for, if the error is tied to one.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Fetch { key, .. } | Self::Aborted { key } => Some(key),
            Self::Configuration(_) => None,
        }
    }
}
