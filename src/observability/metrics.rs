//! Engine counters
//!
//! - Counters only, monotonic
//! - Relaxed atomics; exact totals once the counted calls have returned

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Operational counters for one engine.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    queries_executed: AtomicU64,
    queries_rejected: AtomicU64,
    transactions_begun: AtomicU64,
    commits: AtomicU64,
    commits_cancelled: AtomicU64,
    commit_item_failures: AtomicU64,
    rollbacks: AtomicU64,
    nearest_iterations: AtomicU64,
    virtual_column_fetches: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_queries_executed(&self) {
        self.queries_executed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_transactions_begun(&self) {
        self.transactions_begun.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits(&self) {
        self.commits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_commits_cancelled(&self) {
        self.commits_cancelled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_commit_item_failures(&self, n: u64) {
        self.commit_item_failures.fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment_rollbacks(&self) {
        self.rollbacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_nearest_iterations(&self, n: u64) {
        self.nearest_iterations.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_virtual_column_fetches(&self, n: u64) {
        self.virtual_column_fetches.fetch_add(n, Ordering::Relaxed);
    }

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_executed: self.queries_executed.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            transactions_begun: self.transactions_begun.load(Ordering::Relaxed),
            commits: self.commits.load(Ordering::Relaxed),
            commits_cancelled: self.commits_cancelled.load(Ordering::Relaxed),
            commit_item_failures: self.commit_item_failures.load(Ordering::Relaxed),
            rollbacks: self.rollbacks.load(Ordering::Relaxed),
            nearest_iterations: self.nearest_iterations.load(Ordering::Relaxed),
            virtual_column_fetches: self.virtual_column_fetches.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub queries_executed: u64,
    pub queries_rejected: u64,
    pub transactions_begun: u64,
    pub commits: u64,
    pub commits_cancelled: u64,
    pub commit_item_failures: u64,
    pub rollbacks: u64,
    pub nearest_iterations: u64,
    pub virtual_column_fetches: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_registry_has_zero_values() {
        assert_eq!(MetricsRegistry::new().snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_snapshot_serializes() {
        let registry = MetricsRegistry::new();
        registry.increment_commits();
        registry.add_commit_item_failures(2);
        let json = serde_json::to_value(registry.snapshot()).unwrap();
        assert_eq!(json["commits"], 1);
        assert_eq!(json["commit_item_failures"], 2);
    }

    #[test]
    fn test_thread_safety() {
        let registry = Arc::new(MetricsRegistry::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&registry);
                thread::spawn(move || {
                    for _ in 0..100 {
                        reg.increment_queries_executed();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(registry.snapshot().queries_executed, 800);
    }
}
