//! Resource addressing
//!
//! This module turns composite request paths into resource sets and derives
//! freshness tokens for them:
//! - `path`: composite URL to ordered, de-duplicated `ResourceSet`
//! - `fingerprint`: per-resource and aggregate fingerprints, URL fingerprints
//! - `root`: filesystem document root the resources are read from
//! - `mime`: content type lookup by file extension

pub mod fingerprint;
pub mod mime;
pub mod path;
pub mod root;

use std::fmt;

use crate::constants::{EXT_CSS, EXT_JS, EXT_JSON, MIME_CSS, MIME_JS, MIME_JSON};

pub use fingerprint::{
    add_fingerprint, aggregate, aggregate_from, fingerprint_of, remove_fingerprint,
};
pub use fingerprint::{AggregateFingerprint, Fingerprint};
pub use path::resolve;
pub use root::DocumentRoot;

/// Extensions that can be combined into one composite response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Extension {
    Js,
    Json,
    Css,
}

impl Extension {
    /// Detect the recognized extension at the end of a path
    pub fn detect(path: &str) -> Option<Self> {
        if path.ends_with(EXT_JSON) {
            Some(Extension::Json)
        } else if path.ends_with(EXT_JS) {
            Some(Extension::Js)
        } else if path.ends_with(EXT_CSS) {
            Some(Extension::Css)
        } else {
            None
        }
    }

    /// The suffix including the leading dot
    pub fn as_str(&self) -> &'static str {
        match self {
            Extension::Js => EXT_JS,
            Extension::Json => EXT_JSON,
            Extension::Css => EXT_CSS,
        }
    }

    /// Content-Type sent for a merged response of this extension
    pub fn content_type(&self) -> &'static str {
        match self {
            Extension::Js => MIME_JS,
            Extension::Json => MIME_JSON,
            Extension::Css => MIME_CSS,
        }
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized absolute server-relative path, e.g. `/css/a.css`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourcePath(String);

impl ResourcePath {
    pub(crate) fn new(path: String) -> Self {
        Self(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parent directory, `/` for top-level resources
    pub fn parent(&self) -> &str {
        parent_of(&self.0)
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResourcePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Parent directory of a normalized absolute path
pub(crate) fn parent_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(idx) => &path[..idx],
    }
}

/// Ordered resources addressed by one composite request
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResourceSet {
    paths: Vec<ResourcePath>,
    extension: Option<Extension>,
}

impl ResourceSet {
    pub(crate) fn new(paths: Vec<ResourcePath>, extension: Option<Extension>) -> Self {
        Self { paths, extension }
    }

    /// Set for a request with no recognized extension
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn paths(&self) -> &[ResourcePath] {
        &self.paths
    }

    pub fn extension(&self) -> Option<Extension> {
        self.extension
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ResourcePath> {
        self.paths.iter()
    }

    /// Composite URL addressing exactly this set, with absolute members
    ///
    /// Resolving the returned path yields an equal set.
    pub fn to_composite_path(&self) -> String {
        let Some(ext) = self.extension else {
            return String::new();
        };
        let members: Vec<&str> = self
            .paths
            .iter()
            .map(|p| p.as_str().strip_suffix(ext.as_str()).unwrap_or(p.as_str()))
            .collect();
        format!("{}{}", members.join(","), ext.as_str())
    }
}

impl<'a> IntoIterator for &'a ResourceSet {
    type Item = &'a ResourcePath;
    type IntoIter = std::slice::Iter<'a, ResourcePath>;

    fn into_iter(self) -> Self::IntoIter {
        self.paths.iter()
    }
}
