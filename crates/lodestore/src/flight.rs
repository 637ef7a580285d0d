//! Per-key fetch coalescing.
//!
//! Guarantees at most one outstanding fetch per key: the first caller to
//! find no flight for a key becomes the leader and starts the fetch; later
//! callers push a resolver into the flight's waiter list. Completion drains
//! the list and resolves every waiter with the same outcome, so the list is
//! bounded by the number of concurrent callers and cleared as soon as the
//! fetch lands.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry as MapEntry;
use tokio::sync::oneshot;

use crate::error::CacheError;

/// What a completed fetch delivers to every waiter.
pub(crate) type FetchOutcome<V> = Result<Arc<V>, CacheError>;

struct Flight<V> {
    waiters: Vec<oneshot::Sender<FetchOutcome<V>>>,
}

/// Result of joining a key's flight.
pub(crate) enum Join<V> {
    /// The key turned `Ready` between the caller's miss and the join;
    /// no fetch is needed.
    Ready(Arc<V>),
    /// A fetch was already outstanding; resolved by its completion.
    Waiter(oneshot::Receiver<FetchOutcome<V>>),
    /// No fetch was outstanding; the caller must start one. The leader's
    /// own resolver is already in the new flight's waiter list.
    Leader(oneshot::Receiver<FetchOutcome<V>>),
}

/// Map from key to its in-flight fetch's waiter list.
pub(crate) struct FlightMap<V> {
    flights: DashMap<String, Flight<V>>,
}

impl<V> FlightMap<V> {
    pub fn new() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }

    /// Join the flight for `key`, electing a leader if none is outstanding.
    ///
    /// `on_lead` runs under the key's shard guard when no flight exists: it
    /// must re-read the entry state (a completion may have landed since the
    /// caller's miss) and install the `Pending` entry if a fetch is needed,
    /// returning the value instead if the key is `Ready` after all.
    pub fn join(&self, key: &str, on_lead: impl FnOnce() -> Option<Arc<V>>) -> Join<V> {
        match self.flights.entry(key.to_string()) {
            MapEntry::Occupied(mut occupied) => {
                let (tx, rx) = oneshot::channel();
                occupied.get_mut().waiters.push(tx);
                Join::Waiter(rx)
            }
            MapEntry::Vacant(vacant) => {
                if let Some(value) = on_lead() {
                    return Join::Ready(value);
                }
                let (tx, rx) = oneshot::channel();
                vacant.insert(Flight { waiters: vec![tx] });
                Join::Leader(rx)
            }
        }
    }

    /// End the flight for `key`, returning its drained waiter list.
    ///
    /// `install` runs under the key's shard guard before the flight is
    /// removed, so a caller electing itself leader right after observes the
    /// installed outcome rather than starting a redundant fetch.
    pub fn complete(
        &self,
        key: &str,
        install: impl FnOnce(),
    ) -> Vec<oneshot::Sender<FetchOutcome<V>>> {
        match self.flights.entry(key.to_string()) {
            MapEntry::Occupied(occupied) => {
                install();
                occupied.remove().waiters
            }
            MapEntry::Vacant(_) => {
                install();
                Vec::new()
            }
        }
    }

    /// Whether a fetch is outstanding for `key`.
    pub fn in_flight(&self, key: &str) -> bool {
        self.flights.contains_key(key)
    }

    #[cfg(test)]
    pub fn waiter_count(&self, key: &str) -> usize {
        self.flights
            .get(key)
            .map(|flight| flight.waiters.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_join_leads_later_joins_wait() {
        let flights: FlightMap<String> = FlightMap::new();

        assert!(matches!(flights.join("k", || None), Join::Leader(_)));
        assert!(matches!(flights.join("k", || None), Join::Waiter(_)));
        assert!(matches!(flights.join("k", || None), Join::Waiter(_)));

        assert!(flights.in_flight("k"));
        assert_eq!(flights.waiter_count("k"), 3);
    }

    #[tokio::test]
    async fn completion_resolves_every_waiter_and_clears_the_list() {
        let flights: FlightMap<String> = FlightMap::new();

        let Join::Leader(leader_rx) = flights.join("k", || None) else {
            panic!("expected leader");
        };
        let Join::Waiter(waiter_rx) = flights.join("k", || None) else {
            panic!("expected waiter");
        };

        let value = Arc::new("v".to_string());
        let waiters = flights.complete("k", || {});
        assert_eq!(waiters.len(), 2);
        for tx in waiters {
            let _ = tx.send(Ok(Arc::clone(&value)));
        }

        assert_eq!(*leader_rx.await.unwrap().unwrap(), "v");
        assert_eq!(*waiter_rx.await.unwrap().unwrap(), "v");
        assert!(!flights.in_flight("k"));
        assert_eq!(flights.waiter_count("k"), 0);
    }

    #[tokio::test]
    async fn join_short_circuits_when_the_key_turned_ready() {
        let flights: FlightMap<String> = FlightMap::new();
        let value = Arc::new("already here".to_string());

        let join = flights.join("k", || Some(Arc::clone(&value)));
        let Join::Ready(found) = join else {
            panic!("expected ready");
        };
        assert_eq!(*found, "already here");
        assert!(!flights.in_flight("k"));
    }

    #[tokio::test]
    async fn flights_are_independent_per_key() {
        let flights: FlightMap<u32> = FlightMap::new();

        assert!(matches!(flights.join("a", || None), Join::Leader(_)));
        assert!(matches!(flights.join("b", || None), Join::Leader(_)));

        for tx in flights.complete("a", || {}) {
            let _ = tx.send(Ok(Arc::new(1)));
        }
        assert!(!flights.in_flight("a"));
        assert!(flights.in_flight("b"));
    }
}
