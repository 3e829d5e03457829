//! Cache configuration types
//!
//! Process-wide settings for the response cache. Time based policies
//! (`resetTime`, `reloadTime`) are per rule and live in the rule file.

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_MAX_CACHE_ENTRIES, DEFAULT_NEVER_CACHE_MIME};

fn default_max_entries() -> u64 {
    DEFAULT_MAX_CACHE_ENTRIES
}

fn default_never_cache_mime() -> Vec<String> {
    DEFAULT_NEVER_CACHE_MIME
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on stored responses (default: 10000)
    #[serde(default = "default_max_entries")]
    pub max_entries: u64,
    /// MIME types or families (`image/*`) that are never stored
    #[serde(default = "default_never_cache_mime")]
    pub never_cache_mime: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: default_max_entries(),
            never_cache_mime: default_never_cache_mime(),
        }
    }
}

impl CacheConfig {
    /// Validate cache configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("cache.max_entries must be greater than 0".to_string());
        }
        for pattern in &self.never_cache_mime {
            if !pattern.contains('/') {
                return Err(format!(
                    "cache.never_cache_mime entry '{}' is not a MIME type",
                    pattern
                ));
            }
        }
        Ok(())
    }
}
