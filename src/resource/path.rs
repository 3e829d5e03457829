//! Composite path resolution
//!
//! `/ctx/css/a,b,../lib/c.css` expands to `/css/a.css`, `/css/b.css`,
//! `/lib/c.css`. Every segment after the first is resolved against the
//! directory of the previously resolved resource; a segment starting with
//! `/` resets the base.

use std::collections::HashSet;

use super::{parent_of, Extension, ResourcePath, ResourceSet};
use crate::error::{Result, WebError};

/// Expand a composite request path into an ordered resource set
///
/// # Arguments
/// * `context_path` - Application prefix stripped from the request path (may be empty)
/// * `request_path` - Request path, already stripped of any URL fingerprint
///
/// # Returns
/// * `Ok(ResourceSet)` - Resolved set; empty when the path has no recognized extension
/// * `Err(WebError::MalformedRequest)` - A segment normalizes to the root itself
pub fn resolve(context_path: &str, request_path: &str) -> Result<ResourceSet> {
    let Some(extension) = Extension::detect(request_path) else {
        return Ok(ResourceSet::empty());
    };

    let without_context = strip_context(context_path, request_path);
    let Some(body) = without_context.strip_suffix(extension.as_str()) else {
        return Ok(ResourceSet::empty());
    };

    let mut base = String::from("/");
    let mut seen = HashSet::new();
    let mut paths = Vec::new();

    for segment in body.split(',') {
        if segment.is_empty() {
            continue;
        }

        let joined = if segment.starts_with('/') {
            segment.to_string()
        } else {
            format!("{}/{}", base, segment)
        };

        let normalized = normalize(&joined).ok_or_else(|| {
            WebError::MalformedRequest(format!(
                "segment '{}' of '{}' does not name a resource",
                segment, request_path
            ))
        })?;

        base = parent_of(&normalized).to_string();
        let full = format!("{}{}", normalized, extension.as_str());

        if seen.insert(full.clone()) {
            paths.push(ResourcePath::new(full));
        } else {
            tracing::trace!(path = %full, "Skipping duplicate resource");
        }
    }

    tracing::debug!(
        request_path = %request_path,
        resources = paths.len(),
        "Resolved composite path"
    );

    Ok(ResourceSet::new(paths, Some(extension)))
}

/// Request path below the context path; unchanged when it is not under it
pub(crate) fn strip_context<'a>(context_path: &str, request_path: &'a str) -> &'a str {
    let context = context_path.trim_end_matches('/');
    if context.is_empty() {
        return request_path;
    }
    match request_path.strip_prefix(context) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => request_path,
    }
}

/// Normalize a slash-separated path: drop `.` and empty components, pop on
/// `..` (clamped at the root). Returns `None` when nothing is left.
pub(crate) fn normalize(path: &str) -> Option<String> {
    let mut stack: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                stack.pop();
            }
            other => stack.push(other),
        }
    }
    if stack.is_empty() {
        None
    } else {
        Some(format!("/{}", stack.join("/")))
    }
}
