//! Store counters for monitoring.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Live counters maintained by a store. Snapshot via
/// [`CacheStore::stats`](crate::CacheStore::stats).
#[derive(Debug, Default)]
pub(crate) struct StatCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    evictions: AtomicU64,
}

impl StatCounters {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_coalesced(&self) {
        self.coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_evictions(&self, count: u64) {
        self.evictions.fetch_add(count, Ordering::Relaxed);
    }

    pub fn snapshot(&self, size: usize, capacity: usize) -> CacheStats {
        CacheStats {
            size,
            capacity,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of tracked entries, in every state.
    pub size: usize,
    /// Configured capacity.
    pub capacity: usize,
    /// `get` calls answered from a `Ready` entry.
    pub hits: u64,
    /// `get` calls that had to wait for a fetch.
    pub misses: u64,
    /// Misses that attached to an already in-flight fetch instead of
    /// starting their own.
    pub coalesced: u64,
    /// Entries removed by eviction sweeps.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate hit rate as a percentage.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_rate_calculation() {
        let stats = CacheStats {
            size: 10,
            capacity: 100,
            hits: 75,
            misses: 25,
            coalesced: 5,
            evictions: 0,
        };
        assert!((stats.hit_rate() - 75.0).abs() < 0.001);

        let empty = CacheStats::default();
        assert!((empty.hit_rate() - 0.0).abs() < 0.001);
    }

    #[test]
    fn snapshot_reflects_counters() {
        let counters = StatCounters::default();
        counters.record_hit();
        counters.record_hit();
        counters.record_miss();
        counters.record_coalesced();
        counters.record_evictions(3);

        let stats = counters.snapshot(4, 100);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.coalesced, 1);
        assert_eq!(stats.evictions, 3);
        assert_eq!(stats.size, 4);
        assert_eq!(stats.capacity, 100);
    }
}
