//! Response cache
//!
//! Process-wide table from composite URL to the response built for it:
//! - `ResponseCache`: moka-backed store with fingerprint validation and resets
//! - `CacheEntry` / `CachedResponse`: stored values
//! - `CachePolicy`: which responses may be stored
//! - `CacheStats`: hit/miss/eviction counters

pub mod config;
pub mod entry;
pub mod policy;
pub mod stats;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

pub use config::CacheConfig;
pub use entry::{CacheEntry, CachedResponse};
pub use policy::CachePolicy;
pub use stats::CacheStats;

use crate::resource::AggregateFingerprint;
use stats::CacheStatsTracker;

/// Current wall-clock time in milliseconds since the epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Shared response cache
///
/// The table and the last-reset timestamp are the only mutable shared state.
/// Racing misses may both compute and store; the last writer wins.
pub struct ResponseCache {
    cache: moka::sync::Cache<String, CacheEntry>,
    last_reset_ms: AtomicI64,
    policy: CachePolicy,
    stats: Arc<CacheStatsTracker>,
}

impl ResponseCache {
    /// Create a new ResponseCache from configuration
    pub fn new(config: &CacheConfig) -> Self {
        let stats = Arc::new(CacheStatsTracker::new());
        let stats_clone = stats.clone();

        let cache = moka::sync::Cache::builder()
            .max_capacity(config.max_entries)
            .eviction_listener(move |_key, _value, cause| {
                // Explicit invalidations are counted where they happen
                if cause == moka::notification::RemovalCause::Size {
                    stats_clone.increment_evictions();
                }
            })
            .build();

        Self {
            cache,
            last_reset_ms: AtomicI64::new(now_millis()),
            policy: CachePolicy::new(config.never_cache_mime.clone()),
            stats,
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Look up an entry without validating it
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.cache.get(key) {
            Some(entry) => {
                self.stats.increment_hits();
                Some(entry)
            }
            None => {
                self.stats.increment_misses();
                None
            }
        }
    }

    /// Look up an entry and drop it when its fingerprint no longer matches
    pub fn get_fresh(&self, key: &str, current: Option<&AggregateFingerprint>) -> Option<CacheEntry> {
        let Some(entry) = self.cache.get(key) else {
            self.stats.increment_misses();
            return None;
        };

        if entry.is_fresh_for(current) {
            self.stats.increment_hits();
            Some(entry)
        } else {
            tracing::debug!(key = %key, "Evicting stale cache entry");
            self.cache.invalidate(key);
            self.stats.increment_evictions();
            self.stats.increment_misses();
            None
        }
    }

    /// Drop the entry for `key` if its fingerprint no longer matches
    ///
    /// Unlike [`get_fresh`](Self::get_fresh) this is not a lookup and leaves
    /// the hit and miss counters alone. Returns whether an entry was dropped.
    pub fn evict_if_stale(&self, key: &str, current: Option<&AggregateFingerprint>) -> bool {
        match self.cache.get(key) {
            Some(entry) if !entry.is_fresh_for(current) => {
                tracing::debug!(key = %key, "Evicting stale cache entry");
                self.cache.invalidate(key);
                self.stats.increment_evictions();
                true
            }
            _ => false,
        }
    }

    /// Store a response, replacing any previous entry for the key
    pub fn put(&self, key: &str, fingerprint: Option<AggregateFingerprint>, payload: CachedResponse) {
        self.put_at(key, fingerprint, payload, now_millis());
    }

    pub(crate) fn put_at(
        &self,
        key: &str,
        fingerprint: Option<AggregateFingerprint>,
        payload: CachedResponse,
        stored_at_ms: i64,
    ) {
        tracing::debug!(key = %key, size = payload.size_bytes(), "Caching response");
        let entry = CacheEntry::new(key.to_string(), stored_at_ms, fingerprint, payload);
        self.cache.insert(key.to_string(), entry);
    }

    pub fn invalidate(&self, key: &str) {
        self.cache.invalidate(key);
    }

    /// Remove an entry that was found unusable, counting it as an eviction
    pub fn evict(&self, key: &str) {
        if self.cache.remove(key).is_some() {
            self.stats.increment_evictions();
        }
    }

    /// Drop every entry
    pub fn reset_all(&self) {
        self.cache.invalidate_all();
        self.last_reset_ms.store(now_millis(), Ordering::Release);
        self.stats.increment_resets();
        tracing::info!("Response cache reset");
    }

    /// Reset when more than `reset_time_ms` has elapsed since the last reset
    ///
    /// Only the thread that wins the timestamp update clears the table.
    /// Returns whether this call performed the reset.
    pub fn reset_if_due(&self, reset_time_ms: i64, now_ms: i64) -> bool {
        let last = self.last_reset_ms.load(Ordering::Acquire);
        if now_ms.saturating_sub(last) <= reset_time_ms {
            return false;
        }
        if self
            .last_reset_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        self.cache.invalidate_all();
        self.stats.increment_resets();
        tracing::info!(reset_time_ms, "Response cache reset after reset interval");
        true
    }

    pub fn last_reset_ms(&self) -> i64 {
        self.last_reset_ms.load(Ordering::Acquire)
    }

    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    /// Get a snapshot of current statistics
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.entry_count())
    }
}

impl std::fmt::Debug for ResponseCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseCache")
            .field("last_reset_ms", &self.last_reset_ms())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}
