//! JSCSSMerge: serve a composite URL as one concatenated resource
//!
//! `/css/reset,grid,theme.css` answers with the three stylesheets in order,
//! or 304 when the client's validators are still current. Relative `url()`
//! references inside merged stylesheets are rewritten so they keep pointing
//! at the same files, with a URL fingerprint when the target exists.

use http::header::{CACHE_CONTROL, CONTENT_TYPE, ETAG, EXPIRES, LAST_MODIFIED};
use http::{HeaderName, StatusCode};
use regex::bytes::{Captures, Regex};

use super::{current_fingerprint, not_modified, ModuleArgs};
use crate::cache::now_millis;
use crate::constants::{
    DEFAULT_CACHE_CONTROL, DEFAULT_EXPIRES_MINUTES, HEADER_OPTIMIZED_BY, OPTIMIZED_BY,
};
use crate::freshness::{evaluate, format_http_date, ConditionalHeaders, Freshness};
use crate::pipeline::{DirectiveOutcome, DirectivePair, PreDirective, RequestContext};
use crate::resource::path::normalize;
use crate::resource::{add_fingerprint, fingerprint_of, DocumentRoot, Extension, ResourcePath};

const CSS_URL_PATTERN: &str = r#"[uU][rR][lL]\s*\(\s*['"]?([^'")]*)['"]?\s*\)"#;

/// Options of a `JSCSSMerge` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOptions {
    pub auto_correct_urls: bool,
    pub expires_minutes: i64,
    pub cache_control: String,
    pub turn_off_etag: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            auto_correct_urls: true,
            expires_minutes: DEFAULT_EXPIRES_MINUTES,
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            turn_off_etag: false,
        }
    }
}

impl MergeOptions {
    pub fn from_args(args: &ModuleArgs) -> Result<Self, String> {
        args.expect_keys(&[
            "autoCorrectUrlsInCss",
            "expiresMinutes",
            "cacheControl",
            "turnOffETag",
        ])?;
        let defaults = Self::default();
        Ok(Self {
            auto_correct_urls: args.bool_value("autoCorrectUrlsInCss", defaults.auto_correct_urls)?,
            expires_minutes: args.parsed_value("expiresMinutes", defaults.expires_minutes)?,
            cache_control: args
                .value("cacheControl")
                .map(str::to_string)
                .unwrap_or(defaults.cache_control),
            turn_off_etag: args.bool_value("turnOffETag", defaults.turn_off_etag)?,
        })
    }
}

pub fn build(args: &ModuleArgs) -> Result<DirectivePair, String> {
    let directive = MergeDirective::new(MergeOptions::from_args(args)?)?;
    Ok(DirectivePair::new(args.id(), Some(Box::new(directive)), None))
}

#[derive(Debug)]
pub struct MergeDirective {
    options: MergeOptions,
    css_url: Regex,
}

impl MergeDirective {
    pub fn new(options: MergeOptions) -> Result<Self, String> {
        let css_url = Regex::new(CSS_URL_PATTERN).map_err(|e| e.to_string())?;
        Ok(Self { options, css_url })
    }

    fn set_headers(&self, ctx: &mut RequestContext, extension: Extension, last_modified_ms: i64, etag: Option<String>) {
        let expires_ms = now_millis().saturating_add(self.options.expires_minutes.saturating_mul(60_000));
        let response = ctx.response_mut();
        response.set_header(CONTENT_TYPE, extension.content_type());
        if let (false, Some(etag)) = (self.options.turn_off_etag, etag) {
            response.set_header(ETAG, &etag);
        }
        response.set_header(LAST_MODIFIED, &format_http_date(last_modified_ms));
        response.set_header(EXPIRES, &format_http_date(expires_ms));
        response.set_header(CACHE_CONTROL, &self.options.cache_control);
        response.set_header(HeaderName::from_static(HEADER_OPTIMIZED_BY), OPTIMIZED_BY);
    }

    /// Rewrite `url(...)` references of one stylesheet
    fn correct_css_urls(&self, css: &[u8], stylesheet: &ResourcePath, context_path: &str, root: &DocumentRoot) -> Vec<u8> {
        let rewritten = self.css_url.replace_all(css, |caps: &Captures<'_>| {
            let (Some(whole), Some(target)) = (caps.get(0), caps.get(1)) else {
                return Vec::new();
            };
            let replacement = std::str::from_utf8(target.as_bytes())
                .ok()
                .and_then(|t| rewrite_url(t, stylesheet, context_path, root));
            match replacement {
                Some(url) => {
                    let start = target.start() - whole.start();
                    let end = target.end() - whole.start();
                    let mut out = Vec::with_capacity(whole.len() + url.len());
                    out.extend_from_slice(&whole.as_bytes()[..start]);
                    out.extend_from_slice(url.as_bytes());
                    out.extend_from_slice(&whole.as_bytes()[end..]);
                    out
                }
                None => whole.as_bytes().to_vec(),
            }
        });
        rewritten.into_owned()
    }
}

impl PreDirective for MergeDirective {
    fn execute(&self, ctx: &mut RequestContext) -> DirectiveOutcome {
        let services = ctx.shared();
        let (set, current) = match current_fingerprint(&services, ctx.request()) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(path = %ctx.request().path(), error = %e, "Rejecting composite request");
                ctx.response_mut().send_error(e.to_http_status(), &e.to_string());
                return DirectiveOutcome::Abort;
            }
        };

        let Some(extension) = set.extension() else {
            return DirectiveOutcome::Continue;
        };

        let conditional = ConditionalHeaders::from_headers(ctx.request().headers());
        if evaluate(&conditional, current.as_ref()) == Freshness::NotModified {
            tracing::debug!(path = %ctx.request().path(), "Composite resource not modified");
            not_modified(ctx.response_mut(), current.as_ref(), !self.options.turn_off_etag);
            return DirectiveOutcome::StopAndCommit;
        }

        let context_path = ctx.request().context_path().to_string();
        let rewrite_css = extension == Extension::Css && self.options.auto_correct_urls;
        let mut body = Vec::new();
        let mut found = 0usize;

        for resource in &set {
            let contents = match services.root.read(resource) {
                Ok(Some(contents)) => contents,
                Ok(None) => {
                    tracing::debug!(resource = %resource, "Skipping missing resource");
                    continue;
                }
                Err(e) => {
                    tracing::warn!(resource = %resource, error = %e, "Failed to read resource");
                    continue;
                }
            };
            found += 1;

            let contents = if rewrite_css {
                self.correct_css_urls(&contents, resource, &context_path, &services.root)
            } else {
                contents
            };
            if !body.is_empty() && !body.ends_with(b"\n") {
                body.push(b'\n');
            }
            body.extend_from_slice(&contents);
        }

        if found == 0 {
            let path = ctx.request().path().to_string();
            tracing::debug!(path = %path, "No member of the composite resource exists");
            ctx.response_mut()
                .send_error(StatusCode::NOT_FOUND, &format!("resource not found: {}", path));
            return DirectiveOutcome::Abort;
        }

        tracing::debug!(
            path = %ctx.request().path(),
            resources = found,
            bytes = body.len(),
            "Merged composite resource"
        );

        let last_modified_ms = current.as_ref().map_or_else(now_millis, |c| c.last_modified_ms);
        let etag = current.as_ref().map(|c| c.etag_header());
        self.set_headers(ctx, extension, last_modified_ms, etag);

        let response = ctx.response_mut();
        response.set_status(StatusCode::OK);
        response.set_body(body);
        DirectiveOutcome::StopAndCommit
    }
}

/// New value for one `url()` target, `None` to leave it untouched
fn rewrite_url(target: &str, stylesheet: &ResourcePath, context_path: &str, root: &DocumentRoot) -> Option<String> {
    let target = target.trim();
    if target.is_empty() || is_absolute_url(target) {
        return None;
    }

    let split = target.find(['?', '#']).unwrap_or(target.len());
    let (path, suffix) = target.split_at(split);
    if path.is_empty() {
        return None;
    }

    let joined = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("{}/{}", stylesheet.parent(), path)
    };
    let resolved = normalize(&joined)?;

    let resource = ResourcePath::new(resolved.clone());
    let url = match fingerprint_of(root, &resource) {
        Some(fp) => add_fingerprint(&resolved, &fp.token()),
        None => resolved,
    };

    Some(format!("{}{}{}", context_path.trim_end_matches('/'), url, suffix))
}

/// `http:`, `//host`, `data:` and other scheme-qualified references
fn is_absolute_url(target: &str) -> bool {
    if target.starts_with("//") || target.starts_with('#') {
        return true;
    }
    match target.find(':') {
        Some(colon) => {
            let scheme = &target[..colon];
            !scheme.is_empty()
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        }
        None => false,
    }
}
