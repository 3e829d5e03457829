// Freshness module - conditional request evaluation
//
// Decides from If-Modified-Since / If-None-Match whether the client already
// holds the current representation of a resource set.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use http::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH};
use http::HeaderMap;

use crate::resource::AggregateFingerprint;

/// Suffixes appended to an ETag by the compression step
const ENCODING_SUFFIXES: [&str; 3] = ["-gzip", "-deflate", "-br"];

/// IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Result of a conditional check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Client copy is current; answer 304 with an empty body
    NotModified,
    /// Client copy is stale or absent
    Modified,
}

/// Conditional request headers relevant to freshness
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionalHeaders {
    pub if_modified_since: Option<String>,
    pub if_none_match: Option<String>,
}

impl ConditionalHeaders {
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        Self {
            if_modified_since: text(IF_MODIFIED_SINCE),
            if_none_match: text(IF_NONE_MATCH),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.if_modified_since.is_none() && self.if_none_match.is_none()
    }
}

/// Evaluate conditional headers against the current aggregate fingerprint
///
/// 1. A parseable If-Modified-Since wins when no member is newer than it.
/// 2. Otherwise a matching If-None-Match entity tag means not modified.
/// 3. Otherwise the content is modified.
///
/// `current` is `None` when none of the resources exist, which is never fresh.
pub fn evaluate(
    conditional: &ConditionalHeaders,
    current: Option<&AggregateFingerprint>,
) -> Freshness {
    let Some(current) = current else {
        return Freshness::Modified;
    };

    if let Some(since_ms) = conditional
        .if_modified_since
        .as_deref()
        .and_then(parse_http_date)
    {
        if current.last_modified_ms <= since_ms {
            tracing::trace!(since_ms, last_modified_ms = current.last_modified_ms, "Not modified since");
            return Freshness::NotModified;
        }
    }

    if let Some(if_none_match) = conditional.if_none_match.as_deref() {
        if etag_matches(if_none_match, &current.etag) {
            tracing::trace!(etag = %current.etag, "Entity tag matches");
            return Freshness::NotModified;
        }
    }

    Freshness::Modified
}

/// Whether an If-None-Match value names the current entity tag
///
/// Handles comma separated lists, weak validators, quotes, `*`, and the
/// content-encoding suffixes added by compression.
pub fn etag_matches(if_none_match: &str, current_etag: &str) -> bool {
    if_none_match
        .split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .any(|tag| tag == "*" || strip_etag(tag) == current_etag)
}

/// Reduce a client-supplied entity tag to the bare aggregate ETag
pub fn strip_etag(tag: &str) -> &str {
    let tag = tag.trim();
    let tag = tag.strip_prefix("W/").unwrap_or(tag);
    let tag = tag.trim_matches('"');
    ENCODING_SUFFIXES
        .iter()
        .find_map(|suffix| tag.strip_suffix(suffix))
        .unwrap_or(tag)
}

/// Parse an HTTP date into milliseconds since the epoch
///
/// Accepts IMF-fixdate and anything RFC 2822 compatible.
pub fn parse_http_date(value: &str) -> Option<i64> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, HTTP_DATE_FORMAT) {
        return Some(Utc.from_utc_datetime(&naive).timestamp_millis());
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Format milliseconds since the epoch as an IMF-fixdate
pub fn format_http_date(ms: i64) -> String {
    match Utc.timestamp_millis_opt(ms).single() {
        Some(dt) => dt.format(HTTP_DATE_FORMAT).to_string(),
        None => Utc::now().format(HTTP_DATE_FORMAT).to_string(),
    }
}
