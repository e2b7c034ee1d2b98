//! Per-Shard Operation Counters
//!
//! Every shard owns one [`StatsCounters`] instance; the router aggregates
//! them by summing [`StatsSnapshot`]s. All counters are monotonically
//! non-decreasing since shard creation (modulo explicit `reset`) and are
//! updated with relaxed atomic increments, so reading them is always safe
//! and never blocks an operation.
//!
//! Counter semantics:
//!
//! - `gets` is incremented on every `get` call and always equals
//!   `hits + misses` once the call has completed.
//! - `sets`, `deletes`, `expires` count calls, not successes.
//! - `evictions` counts LRU capacity evictions only.
//! - `expirations` counts TTL removals from any path: lazy expiry on
//!   access, the background sweep, snapshot capture, and entries dropped
//!   because they were already stale when a snapshot was loaded.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic operation counters for a single shard.
#[derive(Debug, Default)]
pub struct StatsCounters {
    gets: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    expires: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

impl StatsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one `get` call together with its outcome.
    pub fn record_get(&self, hit: bool) {
        self.gets.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_expire(&self) {
        self.expires.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    /// Records `count` TTL removals at once (sweeps remove in batches).
    pub fn record_expirations(&self, count: u64) {
        if count > 0 {
            self.expirations.fetch_add(count, Ordering::Relaxed);
        }
    }

    /// Returns an immutable point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            expires: self.expires.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            expirations: self.expirations.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter.
    pub fn reset(&self) {
        self.gets.store(0, Ordering::Relaxed);
        self.sets.store(0, Ordering::Relaxed);
        self.deletes.store(0, Ordering::Relaxed);
        self.expires.store(0, Ordering::Relaxed);
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.evictions.store(0, Ordering::Relaxed);
        self.expirations.store(0, Ordering::Relaxed);
    }
}

/// Immutable snapshot of a [`StatsCounters`], also used as the aggregation
/// unit when summing across shards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub gets: u64,
    pub sets: u64,
    pub deletes: u64,
    pub expires: u64,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl StatsSnapshot {
    /// Element-wise sum, used by the router to aggregate shard stats.
    pub fn merge(&self, other: &StatsSnapshot) -> StatsSnapshot {
        StatsSnapshot {
            gets: self.gets + other.gets,
            sets: self.sets + other.sets,
            deletes: self.deletes + other.deletes,
            expires: self.expires + other.expires,
            hits: self.hits + other.hits,
            misses: self.misses + other.misses,
            evictions: self.evictions + other.evictions,
            expirations: self.expirations + other.expirations,
        }
    }

    /// Total number of store operations observed.
    pub fn total_operations(&self) -> u64 {
        self.gets + self.sets + self.deletes + self.expires
    }

    /// Fraction of gets that were hits, 0.0 when no gets were recorded.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_identity() {
        let stats = StatsCounters::new();
        stats.record_get(true);
        stats.record_get(false);
        stats.record_get(false);

        let snap = stats.snapshot();
        assert_eq!(snap.gets, 3);
        assert_eq!(snap.hits, 1);
        assert_eq!(snap.misses, 2);
        assert_eq!(snap.gets, snap.hits + snap.misses);
    }

    #[test]
    fn test_merge_sums_all_fields() {
        let a = StatsCounters::new();
        let b = StatsCounters::new();
        a.record_set();
        a.record_get(true);
        a.record_eviction();
        b.record_set();
        b.record_delete();
        b.record_expirations(3);

        let merged = a.snapshot().merge(&b.snapshot());
        assert_eq!(merged.sets, 2);
        assert_eq!(merged.gets, 1);
        assert_eq!(merged.hits, 1);
        assert_eq!(merged.deletes, 1);
        assert_eq!(merged.evictions, 1);
        assert_eq!(merged.expirations, 3);
        assert_eq!(merged.total_operations(), 4);
    }

    #[test]
    fn test_reset() {
        let stats = StatsCounters::new();
        stats.record_set();
        stats.record_get(false);
        stats.record_expire();
        stats.reset();
        assert_eq!(stats.snapshot(), StatsSnapshot::default());
    }

    #[test]
    fn test_hit_rate() {
        let stats = StatsCounters::new();
        assert_eq!(stats.snapshot().hit_rate(), 0.0);
        stats.record_get(true);
        stats.record_get(true);
        stats.record_get(false);
        stats.record_get(false);
        assert!((stats.snapshot().hit_rate() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_expirations_zero_is_noop() {
        let stats = StatsCounters::new();
        stats.record_expirations(0);
        assert_eq!(stats.snapshot().expirations, 0);
    }
}
