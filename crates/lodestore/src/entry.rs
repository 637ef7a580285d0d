//! Per-key cached state.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use crate::error::CacheError;

/// Lifecycle state of a cached key.
///
/// A key cycles `Pending → Ready | Errored` on every fetch; `remove` returns
/// it to untracked. There is no terminal state.
pub enum EntryState<V> {
    /// A fetch is outstanding for this key.
    Pending,
    /// The last fetch (or an explicit `set`) produced this value.
    Ready(Arc<V>),
    /// The last fetch failed. Never served as a hit; the next `get`
    /// starts a fresh fetch.
    Errored(CacheError),
}

impl<V> EntryState<V> {
    /// Returns the string representation of the state, for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Pending => "pending",
            EntryState::Ready(_) => "ready",
            EntryState::Errored(_) => "errored",
        }
    }
}

impl<V> Clone for EntryState<V> {
    fn clone(&self) -> Self {
        match self {
            EntryState::Pending => EntryState::Pending,
            EntryState::Ready(value) => EntryState::Ready(Arc::clone(value)),
            EntryState::Errored(error) => EntryState::Errored(error.clone()),
        }
    }
}

impl<V> fmt::Debug for EntryState<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of cached state for one key.
pub struct Entry<V> {
    pub state: EntryState<V>,
    /// Set at the first observation of the key and preserved across
    /// state transitions.
    pub created_at: Instant,
    /// Bumped on every state transition; drives eviction ordering.
    pub updated_at: Instant,
}

impl<V> Entry<V> {
    /// A freshly observed key with an outstanding fetch.
    pub fn pending() -> Self {
        Self::with_state(EntryState::Pending)
    }

    /// A `Ready` entry holding `value`.
    pub fn ready(value: Arc<V>) -> Self {
        Self::with_state(EntryState::Ready(value))
    }

    /// A new entry in the given state, created and updated now.
    pub fn with_state(state: EntryState<V>) -> Self {
        let now = Instant::now();
        Self {
            state,
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the entry to a new state, keeping `created_at`.
    pub fn transition(&mut self, state: EntryState<V>) {
        self.state = state;
        self.updated_at = Instant::now();
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, EntryState::Pending)
    }

    pub fn is_errored(&self) -> bool {
        matches!(self.state, EntryState::Errored(_))
    }

    /// The cached value, if the entry is `Ready`.
    pub fn value(&self) -> Option<Arc<V>> {
        match &self.state {
            EntryState::Ready(value) => Some(Arc::clone(value)),
            _ => None,
        }
    }
}

impl<V> Clone for Entry<V> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl<V> fmt::Debug for Entry<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("state", &self.state)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_preserves_created_at() {
        let mut entry: Entry<String> = Entry::pending();
        let created = entry.created_at;

        entry.transition(EntryState::Ready(Arc::new("v".to_string())));

        assert_eq!(entry.created_at, created);
        assert!(entry.updated_at >= created);
        assert_eq!(entry.value().as_deref(), Some(&"v".to_string()));
    }

    #[test]
    fn errored_entry_has_no_value() {
        let entry: Entry<String> =
            Entry::with_state(EntryState::Errored(CacheError::aborted("k")));
        assert!(entry.is_errored());
        assert!(entry.value().is_none());
    }

    #[test]
    fn state_names() {
        assert_eq!(EntryState::<()>::Pending.as_str(), "pending");
        assert_eq!(EntryState::Ready(Arc::new(())).as_str(), "ready");
    }
}
