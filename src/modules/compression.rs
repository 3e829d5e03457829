//! Compression: encode response bodies for clients that accept it
//!
//! The pre-step negotiates a coding from `Accept-Encoding`; the post-step
//! encodes the finished body when it is compressible and large enough.

use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, ETAG, VARY};
use http::StatusCode;

use super::ModuleArgs;
use crate::compression::{
    compress, is_compressible_content_type, negotiate_compression, should_compress_by_size,
    suffix_etag, Compression,
};
use crate::constants::{DEFAULT_COMPRESSION_LEVEL, DEFAULT_COMPRESSION_THRESHOLD};
use crate::pipeline::{
    DirectiveOutcome, DirectivePair, ModuleResponse, PostDirective, PreDirective, RequestContext,
};
use crate::resource::mime;

/// Options of a `Compression` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionOptions {
    pub threshold: usize,
    pub level: u32,
    /// Codings offered, in server preference order
    pub algorithms: Vec<Compression>,
    /// Content types never compressed (`family/*` allowed)
    pub ignore_mime: Vec<String>,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_COMPRESSION_THRESHOLD,
            level: DEFAULT_COMPRESSION_LEVEL,
            algorithms: Compression::PREFERENCE.to_vec(),
            ignore_mime: Vec::new(),
        }
    }
}

impl CompressionOptions {
    pub fn from_args(args: &ModuleArgs) -> Result<Self, String> {
        args.expect_keys(&["threshold", "level", "algorithms", "ignoreMIME"])?;
        let defaults = Self::default();

        let level = args.parsed_value("level", defaults.level)?;
        if !(1..=11).contains(&level) {
            return Err(format!("level must be between 1 and 11, got {}", level));
        }

        let algorithms = match args.value("algorithms") {
            Some(list) => split_list(list)
                .map(|name| Compression::parse_algorithm(name).map_err(|e| e.to_string()))
                .collect::<Result<Vec<_>, _>>()?,
            None => defaults.algorithms,
        };
        if algorithms.is_empty() {
            return Err("algorithms must name at least one coding".to_string());
        }

        Ok(Self {
            threshold: args.parsed_value("threshold", defaults.threshold)?,
            level,
            algorithms,
            ignore_mime: args
                .value("ignoreMIME")
                .map(|list| split_list(list).map(str::to_string).collect())
                .unwrap_or_default(),
        })
    }

    fn is_ignored(&self, content_type: &str) -> bool {
        self.ignore_mime
            .iter()
            .any(|pattern| mime::matches_pattern(content_type, pattern))
    }
}

fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|s| !s.is_empty())
}

pub fn build(args: &ModuleArgs) -> Result<DirectivePair, String> {
    let options = CompressionOptions::from_args(args)?;
    Ok(DirectivePair::new(
        args.id(),
        Some(Box::new(NegotiateEncoding {
            algorithms: options.algorithms.clone(),
        })),
        Some(Box::new(CompressBody { options })),
    ))
}

/// Coding chosen for the current request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NegotiatedEncoding(Compression);

#[derive(Debug)]
pub struct NegotiateEncoding {
    algorithms: Vec<Compression>,
}

impl PreDirective for NegotiateEncoding {
    fn execute(&self, ctx: &mut RequestContext) -> DirectiveOutcome {
        let accept = ctx.request().header(ACCEPT_ENCODING);
        if let Some(algorithm) = negotiate_compression(accept, &self.algorithms) {
            tracing::trace!(%algorithm, "Negotiated content coding");
            ctx.attributes_mut().insert(NegotiatedEncoding(algorithm));
        }
        DirectiveOutcome::Continue
    }
}

#[derive(Debug)]
pub struct CompressBody {
    options: CompressionOptions,
}

impl CompressBody {
    fn should_compress(&self, response: &ModuleResponse) -> bool {
        let status = response.status();
        if !status.is_success() || status == StatusCode::NO_CONTENT {
            return false;
        }
        if response.headers().contains_key(CONTENT_ENCODING) {
            return false;
        }
        let content_type = response.content_type();
        if !is_compressible_content_type(content_type) {
            return false;
        }
        if content_type.is_some_and(|ct| self.options.is_ignored(ct)) {
            return false;
        }
        should_compress_by_size(response.body().len(), self.options.threshold)
    }
}

impl PostDirective for CompressBody {
    fn execute(&self, ctx: &mut RequestContext) {
        let Some(NegotiatedEncoding(algorithm)) = ctx.attributes().get::<NegotiatedEncoding>().copied()
        else {
            return;
        };
        if ctx.is_aborted() {
            return;
        }

        let response = ctx.response_mut();
        if !self.should_compress(response) {
            return;
        }

        let original = response.body().len();
        let encoded = match compress(response.body(), algorithm, self.options.level) {
            Ok(encoded) => encoded,
            Err(e) => {
                tracing::warn!(%algorithm, error = %e, "Compression failed, sending identity");
                return;
            }
        };

        tracing::debug!(%algorithm, original, compressed = encoded.len(), "Compressed response");
        response.set_body(encoded);
        response.set_header(CONTENT_ENCODING, algorithm.to_header_value());
        let vary = add_vary_accept_encoding(response.header(VARY));
        response.set_header(VARY, &vary);
        if let Some(etag) = response.header(ETAG).map(str::to_string) {
            response.set_header(ETAG, &suffix_etag(&etag, &algorithm.etag_suffix()));
        }
    }
}

/// Merge `Accept-Encoding` into an existing Vary value
fn add_vary_accept_encoding(existing: Option<&str>) -> String {
    match existing {
        None => "Accept-Encoding".to_string(),
        Some(v) if v.trim() == "*" => v.to_string(),
        Some(v)
            if v
                .split(',')
                .any(|name| name.trim().eq_ignore_ascii_case("accept-encoding")) =>
        {
            v.to_string()
        }
        Some(v) if v.trim().is_empty() => "Accept-Encoding".to_string(),
        Some(v) => format!("{}, Accept-Encoding", v),
    }
}
