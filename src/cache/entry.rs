//! Cache entry types
//!
//! - `CachedResponse`: status, headers and body captured from a committed response
//! - `CacheEntry`: cached response plus the fingerprint it was built from

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::resource::AggregateFingerprint;

/// Snapshot of a response suitable for replay
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl CachedResponse {
    pub fn size_bytes(&self) -> usize {
        self.body.len()
    }
}

/// Stored response keyed by composite URL
///
/// Entries are replaced wholesale, never mutated.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Composite URL with any URL fingerprint removed
    pub key: String,
    /// Store time, milliseconds since the epoch
    pub stored_at_ms: i64,
    /// Aggregate fingerprint of the resources when stored
    pub fingerprint: Option<AggregateFingerprint>,
    pub payload: Arc<CachedResponse>,
}

impl CacheEntry {
    pub fn new(
        key: String,
        stored_at_ms: i64,
        fingerprint: Option<AggregateFingerprint>,
        payload: CachedResponse,
    ) -> Self {
        Self {
            key,
            stored_at_ms,
            fingerprint,
            payload: Arc::new(payload),
        }
    }

    /// Age in milliseconds relative to `now_ms`
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.stored_at_ms)
    }

    /// Whether the entry was stored more than `max_age_ms` before `now_ms`
    pub fn is_older_than(&self, max_age_ms: i64, now_ms: i64) -> bool {
        self.age_ms(now_ms) > max_age_ms
    }

    /// Whether the stored fingerprint still describes the resources
    pub fn is_fresh_for(&self, current: Option<&AggregateFingerprint>) -> bool {
        self.fingerprint.as_ref() == current
    }
}
