//! Cumulative service counters.
//!
//! Monotonic process-lifetime totals, separate from the live index. The
//! snapshot is what `getStats` hands to an external persistence
//! collaborator; nothing here is written to disk by the core.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Cumulative counters, shared via `Arc` between registry and readers.
#[derive(Debug, Default)]
pub struct ServiceStats {
    updates_received: AtomicU64,
    updates_applied: AtomicU64,
    games_seen: AtomicU64,
    parse_failures: AtomicU64,
    resyncs: AtomicU64,
    evictions: AtomicU64,
    games_finished: AtomicU64,
}

impl ServiceStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_update_received(&self) {
        self.updates_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_update_applied(&self) {
        self.updates_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_game_seen(&self) {
        self.games_seen.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resync(&self) {
        self.resyncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_game_finished(&self) {
        self.games_finished.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            updates_received: self.updates_received.load(Ordering::Relaxed),
            updates_applied: self.updates_applied.load(Ordering::Relaxed),
            games_seen: self.games_seen.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            games_finished: self.games_finished.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub updates_received: u64,
    pub updates_applied: u64,
    pub games_seen: u64,
    pub parse_failures: u64,
    pub resyncs: u64,
    pub evictions: u64,
    pub games_finished: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = ServiceStats::new();
        stats.record_update_received();
        stats.record_update_received();
        stats.record_game_seen();
        stats.record_resync();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.updates_received, 2);
        assert_eq!(snapshot.games_seen, 1);
        assert_eq!(snapshot.resyncs, 1);
        assert_eq!(snapshot.evictions, 0);
    }
}
