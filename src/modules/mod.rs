// Directive modules - the building blocks named by rule-file lines
//
// Each module line (`JSCSSMerge expiresMinutes 60`) is turned into a
// `DirectivePair` by the factory registered under the module's name.

pub mod access;
pub mod charset;
pub mod compression;
pub mod header;
pub mod merge;
pub mod minify;
pub mod response_cache;

use std::collections::HashMap;
use std::str::FromStr;

use http::header::ETAG;
use http::StatusCode;

use crate::constants::PARAM_DEBUG;
use crate::error::Result;
use crate::pipeline::{DirectivePair, ModuleRequest, ModuleResponse, Services};
use crate::resource::path::{normalize, strip_context};
use crate::resource::{
    aggregate, aggregate_from, fingerprint_of, remove_fingerprint, resolve, AggregateFingerprint,
    ResourcePath, ResourceSet,
};
use crate::rules::RuleError;

/// Builds a directive pair from module arguments
pub type ModuleFactory = fn(&ModuleArgs) -> std::result::Result<DirectivePair, String>;

/// Name and arguments of one module line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleArgs {
    name: String,
    args: Vec<String>,
}

impl ModuleArgs {
    pub fn new(name: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            name: name.into(),
            args,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Identity of the configured module, used to run it once per request
    pub fn id(&self) -> String {
        if self.args.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.name, self.args.join(" "))
        }
    }

    /// Value following `key` in a `key value key value` argument list
    pub fn value(&self, key: &str) -> Option<&str> {
        self.args
            .iter()
            .position(|a| a.eq_ignore_ascii_case(key))
            .and_then(|i| self.args.get(i + 1))
            .map(String::as_str)
    }

    pub fn bool_value(&self, key: &str, default: bool) -> std::result::Result<bool, String> {
        match self.value(key) {
            None => Ok(default),
            Some(v) => parse_bool(v).ok_or_else(|| format!("{} expects true or false, got '{}'", key, v)),
        }
    }

    pub fn parsed_value<T: FromStr>(&self, key: &str, default: T) -> std::result::Result<T, String> {
        match self.value(key) {
            None => Ok(default),
            Some(v) => v
                .parse()
                .map_err(|_| format!("invalid value '{}' for {}", v, key)),
        }
    }

    /// Fail on keys outside `known`; values are skipped
    pub fn expect_keys(&self, known: &[&str]) -> std::result::Result<(), String> {
        let mut iter = self.args.iter();
        while let Some(key) = iter.next() {
            if !known.iter().any(|k| k.eq_ignore_ascii_case(key)) {
                return Err(format!("unknown argument '{}'", key));
            }
            if iter.next().is_none() {
                return Err(format!("missing value for '{}'", key));
            }
        }
        Ok(())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

/// Module name to factory table
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    factories: HashMap<String, (String, ModuleFactory)>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in module
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("JSCSSMerge", merge::build);
        registry.register("ResponseCache", response_cache::build);
        registry.register("Compression", compression::build);
        registry.register("Header", header::build);
        registry.register("Access", access::build);
        registry.register("Charset", charset::build);
        registry.register("YUICompress", minify::build);
        registry.register_alias("Minify", "YUICompress", minify::build);
        registry
    }

    pub fn register(&mut self, name: &str, factory: ModuleFactory) {
        self.register_alias(name, name, factory);
    }

    fn register_alias(&mut self, alias: &str, canonical: &str, factory: ModuleFactory) {
        self.factories
            .insert(alias.to_ascii_lowercase(), (canonical.to_string(), factory));
    }

    /// Build the directive pair for one module line
    ///
    /// Names match case-insensitively, with or without a `Module` suffix.
    pub fn create(&self, line: usize, args: &ModuleArgs) -> std::result::Result<DirectivePair, RuleError> {
        let lowered = args.name().to_ascii_lowercase();
        let key = lowered.strip_suffix("module").unwrap_or(&lowered);

        let (canonical, factory) = self
            .factories
            .get(key)
            .ok_or_else(|| RuleError::UnknownModule {
                line,
                name: args.name().to_string(),
            })?;

        let canonical_args = ModuleArgs::new(canonical.clone(), args.args().to_vec());
        factory(&canonical_args).map_err(|detail| RuleError::InvalidModule {
            line,
            name: canonical.clone(),
            detail,
        })
    }
}

/// Whether the request asked for unoptimized output
pub(crate) fn is_debug(request: &ModuleRequest) -> bool {
    request.has_any_param(&PARAM_DEBUG)
}

/// Resource set and current aggregate fingerprint of a request
///
/// For a URL that does not name a composite resource the set is empty and
/// the fingerprint covers the single file the URL points at.
pub(crate) fn current_fingerprint(
    services: &Services,
    request: &ModuleRequest,
) -> Result<(ResourceSet, Option<AggregateFingerprint>)> {
    let url = remove_fingerprint(request.path());
    let set = resolve(request.context_path(), &url)?;
    if !set.is_empty() {
        let current = aggregate(&services.root, &set);
        return Ok((set, current));
    }

    let relative = strip_context(request.context_path(), &url);
    let single = normalize(relative).map(|path| fingerprint_of(&services.root, &ResourcePath::new(path)));
    Ok((set, aggregate_from(single)))
}

/// Turn the response into an empty 304 carrying the current validator
pub(crate) fn not_modified(response: &mut ModuleResponse, current: Option<&AggregateFingerprint>, send_etag: bool) {
    response.set_status(StatusCode::NOT_MODIFIED);
    response.clear_body();
    if let (true, Some(current)) = (send_etag, current) {
        response.set_header(ETAG, &current.etag_header());
    }
}
