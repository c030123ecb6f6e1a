//! Counters for context operations

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle owned by one `CryptContext`
#[derive(Debug, Default)]
pub struct Metrics {
    hashes: AtomicU64,
    verifies: AtomicU64,
    verify_failures: AtomicU64,
    identifies: AtomicU64,
    update_checks: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hashed(&self) {
        self.hashes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "hashes", "Metric incremented");
    }

    pub fn verified(&self, matched: bool) {
        self.verifies.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "verifies", "Metric incremented");
        if !matched {
            self.verify_failures.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(counter = "verify_failures", "Metric incremented");
        }
    }

    pub fn identified(&self) {
        self.identifies.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "identifies", "Metric incremented");
    }

    pub fn update_checked(&self) {
        self.update_checks.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "update_checks", "Metric incremented");
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "cache_misses", "Metric incremented");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hashes: self.hashes.load(Ordering::Relaxed),
            verifies: self.verifies.load(Ordering::Relaxed),
            verify_failures: self.verify_failures.load(Ordering::Relaxed),
            identifies: self.identifies.load(Ordering::Relaxed),
            update_checks: self.update_checks.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub hashes: u64,
    pub verifies: u64,
    pub verify_failures: u64,
    pub identifies: u64,
    pub update_checks: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_counts() {
        let metrics = Metrics::new();
        metrics.hashed();
        metrics.verified(true);
        metrics.verified(false);
        metrics.cache_miss();
        metrics.cache_hit();
        metrics.cache_hit();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hashes, 1);
        assert_eq!(snapshot.verifies, 2);
        assert_eq!(snapshot.verify_failures, 1);
        assert_eq!((snapshot.cache_hits, snapshot.cache_misses), (2, 1));
        assert_eq!(snapshot.identifies, 0);
    }
}
