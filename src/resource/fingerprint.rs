//! Resource fingerprints
//!
//! A resource's fingerprint is its modification time (milliseconds) and size.
//! The aggregate over a resource set yields the ETag and Last-Modified values
//! of the composite response. URL fingerprints embed a short digest of that
//! ETag into a URL so clients can cache it forever.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use super::root::DocumentRoot;
use super::{ResourcePath, ResourceSet};
use crate::constants::{ETAG_SEPARATOR, URL_FINGERPRINT_LEN, URL_FINGERPRINT_MARKER};

/// Identity of a single resource on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    /// Modification time, milliseconds since the Unix epoch
    pub mod_time_ms: i64,
    /// Size in bytes
    pub size: u64,
}

impl Fingerprint {
    /// `modTime#size`
    pub fn token(&self) -> String {
        format!("{}#{}", self.mod_time_ms, self.size)
    }
}

/// Freshness token of a whole resource set
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AggregateFingerprint {
    /// Unquoted entity tag
    pub etag: String,
    /// Latest modification time among present members
    pub last_modified_ms: i64,
}

impl AggregateFingerprint {
    /// ETag header value (quoted)
    pub fn etag_header(&self) -> String {
        format!("\"{}\"", self.etag)
    }
}

/// Fingerprint of one resource; `None` when missing or not a regular file
pub fn fingerprint_of(root: &DocumentRoot, resource: &ResourcePath) -> Option<Fingerprint> {
    let meta = root.metadata(resource).ok()?;
    if !meta.is_file() {
        return None;
    }
    let modified = meta.modified().ok()?;
    Some(Fingerprint {
        mod_time_ms: DateTime::<Utc>::from(modified).timestamp_millis(),
        size: meta.len(),
    })
}

/// Aggregate fingerprint of a set
///
/// Missing members are skipped. Returns `None` when the set is empty or no
/// member exists, meaning no ETag should be sent.
pub fn aggregate(root: &DocumentRoot, set: &ResourceSet) -> Option<AggregateFingerprint> {
    aggregate_from(set.iter().map(|p| fingerprint_of(root, p)))
}

/// Aggregate already computed member fingerprints, in set order
pub fn aggregate_from<I>(members: I) -> Option<AggregateFingerprint>
where
    I: IntoIterator<Item = Option<Fingerprint>>,
{
    let mut tokens = Vec::new();
    let mut last_modified_ms = i64::MIN;

    for fp in members.into_iter().flatten() {
        tokens.push(fp.token());
        last_modified_ms = last_modified_ms.max(fp.mod_time_ms);
    }

    if tokens.is_empty() {
        return None;
    }

    Some(AggregateFingerprint {
        etag: tokens.join(ETAG_SEPARATOR),
        last_modified_ms,
    })
}

/// Insert a URL fingerprint derived from `etag` before the extension of `url`
///
/// `/js/a,b.js` becomes `/js/a,b_wu_0123456789abcdef.js`. A URL without an
/// extension gets the marker appended.
pub fn add_fingerprint(url: &str, etag: &str) -> String {
    let digest = hex::encode(Sha256::digest(etag.as_bytes()));
    let marker = format!(
        "{}{}",
        URL_FINGERPRINT_MARKER,
        &digest[..URL_FINGERPRINT_LEN]
    );
    match extension_start(url) {
        Some(idx) => format!("{}{}{}", &url[..idx], marker, &url[idx..]),
        None => format!("{}{}", url, marker),
    }
}

/// Remove a URL fingerprint inserted by [`add_fingerprint`], if present
pub fn remove_fingerprint(url: &str) -> String {
    let end = extension_start(url).unwrap_or(url.len());
    let marker_len = URL_FINGERPRINT_MARKER.len() + URL_FINGERPRINT_LEN;
    if end < marker_len {
        return url.to_string();
    }
    let start = end - marker_len;
    let Some(candidate) = url.get(start..end) else {
        return url.to_string();
    };
    let is_fingerprint = candidate.starts_with(URL_FINGERPRINT_MARKER)
        && candidate[URL_FINGERPRINT_MARKER.len()..]
            .bytes()
            .all(|b| b.is_ascii_hexdigit());
    if is_fingerprint {
        format!("{}{}", &url[..start], &url[end..])
    } else {
        url.to_string()
    }
}

/// Byte offset of the extension dot in the last path component
fn extension_start(url: &str) -> Option<usize> {
    let file_start = url.rfind('/').map_or(0, |i| i + 1);
    url[file_start..].rfind('.').map(|i| file_start + i)
}
