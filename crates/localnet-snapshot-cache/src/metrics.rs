//! Metrics and reporting for cache operations.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Cache operation metrics (thread-safe counters).
#[derive(Debug, Clone, Default)]
pub struct CacheMetrics {
    /// Lookups served from memory
    pub memory_hits: Arc<AtomicU64>,
    /// Lookups served from the persisted store
    pub disk_hits: Arc<AtomicU64>,
    /// Lookups that fell through to the network
    pub misses: Arc<AtomicU64>,
    /// New entries written
    pub inserts: Arc<AtomicU64>,
}

impl CacheMetrics {
    pub fn record_memory_hit(&self) {
        self.memory_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_hit(&self) {
        self.disk_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_insert(&self) {
        self.inserts.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            memory_hits: self.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.disk_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.memory_hits.store(0, Ordering::Relaxed);
        self.disk_hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.inserts.store(0, Ordering::Relaxed);
    }
}

/// Snapshot of metrics (for reporting).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    pub inserts: u64,
}

impl MetricsSnapshot {
    pub fn total_lookups(&self) -> u64 {
        self.memory_hits + self.disk_hits + self.misses
    }

    /// Fraction of lookups served without a network fetch (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.total_lookups();
        if total == 0 {
            return 0.0;
        }
        (self.memory_hits + self.disk_hits) as f64 / total as f64
    }

    /// Format a human-readable report.
    pub fn format_report(&self) -> String {
        let mut lines = Vec::new();
        lines.push("Snapshot Cache".to_string());
        lines.push("=".repeat(40));
        lines.push(format!("  Memory hits:     {}", self.memory_hits));
        lines.push(format!("  Disk hits:       {}", self.disk_hits));
        lines.push(format!("  Misses:          {}", self.misses));
        lines.push(format!("  Inserts:         {}", self.inserts));
        lines.push(format!("  Hit rate:        {:.1}%", self.hit_rate() * 100.0));
        lines.join("\n")
    }
}
