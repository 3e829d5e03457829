// Constants module - centralized default values for configuration
//
// This module defines all default values used throughout the codebase.
// Using constants instead of magic numbers improves maintainability
// and makes it easier to understand and modify defaults.

// =============================================================================
// Server defaults
// =============================================================================

/// Default listen address
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8080;

/// Default request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default maximum request body size (1 MB)
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

// =============================================================================
// Resource defaults
// =============================================================================

/// Recognized composite resource extensions, longest first
pub const EXT_JS: &str = ".js";
pub const EXT_JSON: &str = ".json";
pub const EXT_CSS: &str = ".css";

pub const MIME_JS: &str = "text/javascript";
pub const MIME_JSON: &str = "application/json";
pub const MIME_CSS: &str = "text/css";

/// Separator between member tokens of an aggregate ETag
pub const ETAG_SEPARATOR: &str = "|";

/// Marker placed before the extension of a fingerprinted URL
pub const URL_FINGERPRINT_MARKER: &str = "_wu_";

/// Number of hex characters in a URL fingerprint
pub const URL_FINGERPRINT_LEN: usize = 16;

// =============================================================================
// Merge defaults
// =============================================================================

/// Default Expires offset: 7 days
pub const DEFAULT_EXPIRES_MINUTES: i64 = 7 * 24 * 60;

/// Default Cache-Control header value
pub const DEFAULT_CACHE_CONTROL: &str = "public";

/// Header naming the component that produced a response (lowercase, as sent)
pub const HEADER_OPTIMIZED_BY: &str = "x-optimized-by";

/// Value of the `X-Optimized-By` header
pub const OPTIMIZED_BY: &str = "webmerge";

// =============================================================================
// Cache defaults
// =============================================================================

/// Default maximum number of cached responses
pub const DEFAULT_MAX_CACHE_ENTRIES: u64 = 10_000;

/// MIME types and families that are never stored in the response cache
pub const DEFAULT_NEVER_CACHE_MIME: &[&str] = &[
    "image/*",
    "video/*",
    "audio/*",
    "application/zip",
    "application/gzip",
    "application/x-gzip",
    "font/woff2",
];

/// Query parameters recognized by the response cache, with their legacy spellings
pub const PARAM_EXPIRE_CACHE: [&str; 2] = ["expireCache", "_expirecache_"];
pub const PARAM_RESET_CACHE: [&str; 2] = ["resetCache", "_resetcache_"];
pub const PARAM_SKIP_CACHE: [&str; 2] = ["skipCache", "_skipcache_"];
pub const PARAM_DEBUG: [&str; 2] = ["debug", "_dbg_"];

// =============================================================================
// Compression defaults
// =============================================================================

/// Minimum body size before compression is applied (128 KB)
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 128 * 1024;

/// Default compression level
pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;

// =============================================================================
// Charset defaults
// =============================================================================

pub const DEFAULT_CHARSET: &str = "UTF-8";
