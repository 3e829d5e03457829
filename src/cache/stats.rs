//! Cache statistics types

use std::sync::atomic::{AtomicU64, Ordering};

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of lookups that returned a usable entry
    pub hits: u64,
    /// Number of lookups that found nothing usable
    pub misses: u64,
    /// Entries dropped because they were stale, too old, or over capacity
    pub evictions: u64,
    /// Number of full resets
    pub resets: u64,
    /// Current number of stored responses
    pub current_item_count: u64,
}

impl CacheStats {
    /// Calculate hit rate (hits / total lookups)
    /// Returns 0.0 if there were no lookups
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Statistics tracker using atomics for thread safety
#[derive(Debug, Default)]
pub(crate) struct CacheStatsTracker {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    resets: AtomicU64,
}

impl CacheStatsTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_hits(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_misses(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_evictions(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_resets(&self) {
        self.resets.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of current statistics
    pub fn snapshot(&self, current_item_count: u64) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            resets: self.resets.load(Ordering::Relaxed),
            current_item_count,
        }
    }
}
