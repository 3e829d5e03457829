//! Cacheability rules

use http::header::{CONTENT_ENCODING, CONTENT_TYPE};
use http::{HeaderMap, StatusCode};

use crate::resource::mime;

/// Decides whether a finished response may be stored
#[derive(Debug, Clone, Default)]
pub struct CachePolicy {
    never_cache_mime: Vec<String>,
}

impl CachePolicy {
    pub fn new(never_cache_mime: Vec<String>) -> Self {
        Self { never_cache_mime }
    }

    /// A response is cacheable when it is a 2xx other than 304, the request
    /// was not aborted, the body is not content-encoded and its type is not
    /// on the never-cache list.
    pub fn is_cacheable(&self, status: StatusCode, headers: &HeaderMap, aborted: bool) -> bool {
        if aborted || !status.is_success() || status == StatusCode::NOT_MODIFIED {
            return false;
        }
        if headers.contains_key(CONTENT_ENCODING) {
            return false;
        }
        match headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) {
            Some(content_type) => !self.is_never_cached(content_type),
            None => true,
        }
    }

    pub fn is_never_cached(&self, content_type: &str) -> bool {
        self.never_cache_mime
            .iter()
            .any(|pattern| mime::matches_pattern(content_type, pattern))
    }
}
