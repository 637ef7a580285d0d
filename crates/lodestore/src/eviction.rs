//! Victim selection for capacity eviction.
//!
//! Failed lookups are the least useful entries to retain (a fresh attempt
//! is cheap and more likely correct), so errored entries are reclaimed
//! before any entry still serving a value. Pending entries are never
//! eligible.

use std::time::Instant;

/// A non-pending entry eligible for eviction, snapshotted from the store.
pub(crate) struct Candidate {
    pub key: String,
    pub errored: bool,
    pub updated_at: Instant,
}

/// Pick the keys one eviction sweep removes.
///
/// Order of preference:
/// 1. if errored candidates alone exceed the quota, the quota-many oldest
///    of them (by `updated_at`) and nothing else;
/// 2. otherwise every errored candidate, then the oldest ready candidates
///    until the quota is filled;
/// 3. if fewer candidates exist than the quota, all of them.
pub(crate) fn plan_evictions(candidates: Vec<Candidate>, quota: usize) -> Vec<String> {
    if quota == 0 {
        return Vec::new();
    }

    let (mut errored, mut ready): (Vec<_>, Vec<_>) =
        candidates.into_iter().partition(|c| c.errored);

    errored.sort_by_key(|c| c.updated_at);
    if errored.len() > quota {
        errored.truncate(quota);
        return errored.into_iter().map(|c| c.key).collect();
    }

    ready.sort_by_key(|c| c.updated_at);
    ready.truncate(quota - errored.len());

    errored
        .into_iter()
        .chain(ready)
        .map(|c| c.key)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn candidate(key: &str, errored: bool, age_ms: u64, base: Instant) -> Candidate {
        Candidate {
            key: key.to_string(),
            errored,
            updated_at: base + Duration::from_millis(age_ms),
        }
    }

    #[test]
    fn oldest_ready_entries_go_first() {
        let base = Instant::now();
        let candidates = vec![
            candidate("new", false, 30, base),
            candidate("oldest", false, 0, base),
            candidate("older", false, 10, base),
            candidate("mid", false, 20, base),
        ];

        let victims = plan_evictions(candidates, 2);
        assert_eq!(victims, vec!["oldest", "older"]);
    }

    #[test]
    fn errored_entries_are_preferred_regardless_of_age() {
        let base = Instant::now();
        let candidates = vec![
            candidate("ready-old", false, 0, base),
            candidate("errored-new", true, 50, base),
            candidate("ready-new", false, 40, base),
        ];

        // The errored entry is newer than every ready entry but goes first.
        let victims = plan_evictions(candidates, 2);
        assert_eq!(victims, vec!["errored-new", "ready-old"]);
    }

    #[test]
    fn quota_of_errored_entries_stops_the_sweep() {
        let base = Instant::now();
        let candidates = vec![
            candidate("e1", true, 10, base),
            candidate("e2", true, 0, base),
            candidate("e3", true, 20, base),
            candidate("ready", false, 5, base),
        ];

        // More errored entries than the quota: only the oldest two go,
        // no ready entry is touched.
        let victims = plan_evictions(candidates, 2);
        assert_eq!(victims, vec!["e2", "e1"]);
    }

    #[test]
    fn short_candidate_list_is_drained_without_blocking() {
        let base = Instant::now();
        let candidates = vec![
            candidate("a", false, 0, base),
            candidate("b", true, 1, base),
        ];

        let victims = plan_evictions(candidates, 5);
        assert_eq!(victims.len(), 2);
    }

    #[test]
    fn zero_quota_removes_nothing() {
        let base = Instant::now();
        let candidates = vec![candidate("a", false, 0, base)];
        assert!(plan_evictions(candidates, 0).is_empty());
    }
}
