// Rules module - which directives apply to which requests
//
// A rule file is a sequence of `for` blocks. Each block carries up to six
// anchored regular expressions (accept/ignore for URL, MIME and User-Agent)
// followed by module lines that become directive pairs.

pub mod error;
pub mod parser;

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use http::header::{CONTENT_TYPE, USER_AGENT};
use regex::Regex;

pub use error::RuleError;
pub use parser::{parse_rules, tokenize};

use crate::modules::ModuleRegistry;
use crate::pipeline::{DirectivePair, ModuleRequest};
use crate::resource::{mime, remove_fingerprint};

/// Rule set used when no rule file is configured
pub const BUNDLED_RULES: &str = include_str!("default.conf");

/// Regular expression that must match the whole input
#[derive(Clone)]
pub struct Pattern {
    source: String,
    regex: Regex,
}

impl Pattern {
    pub fn new(source: &str) -> Result<Self, regex::Error> {
        let regex = Regex::new(&format!("^(?:{})$", source))?;
        Ok(Self {
            source: source.to_string(),
            regex,
        })
    }

    pub fn is_match(&self, value: &str) -> bool {
        self.regex.is_match(value)
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({:?})", self.source)
    }
}

/// Accept/ignore pair for one request attribute
#[derive(Debug, Clone, Default)]
pub struct Condition {
    pub accept: Option<Pattern>,
    pub ignore: Option<Pattern>,
}

impl Condition {
    /// An ignore match rejects. Without an accept pattern everything else is
    /// accepted; with one, the value must be present and match.
    pub fn accepts(&self, value: Option<&str>) -> bool {
        if let (Some(ignore), Some(v)) = (&self.ignore, value) {
            if ignore.is_match(v) {
                return false;
            }
        }
        match &self.accept {
            None => true,
            Some(accept) => value.map_or(false, |v| accept.is_match(v)),
        }
    }

    pub fn is_unconditional(&self) -> bool {
        self.accept.is_none() && self.ignore.is_none()
    }
}

/// One `for` block: conditions plus the directive pairs they enable
#[derive(Debug, Clone, Default)]
pub struct RulesMapping {
    pub url: Condition,
    pub mime: Condition,
    pub user_agent: Condition,
    pairs: Vec<Arc<DirectivePair>>,
}

impl RulesMapping {
    pub fn new(url: Condition, mime: Condition, user_agent: Condition) -> Self {
        Self {
            url,
            mime,
            user_agent,
            pairs: Vec::new(),
        }
    }

    /// Mapping that applies to every request
    pub fn accept_all(pairs: Vec<DirectivePair>) -> Self {
        Self {
            pairs: pairs.into_iter().map(Arc::new).collect(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, pair: DirectivePair) {
        self.pairs.push(Arc::new(pair));
    }

    pub fn pairs(&self) -> &[Arc<DirectivePair>] {
        &self.pairs
    }

    /// Whether this mapping applies
    ///
    /// * `url` - Request path without URL fingerprint
    /// * `content_type` - Request Content-Type, if any
    /// * `inferred_mime` - MIME type inferred from the URL extension, used
    ///   when there is no Content-Type
    /// * `user_agent` - User-Agent header, if any
    pub fn matches(
        &self,
        url: &str,
        content_type: Option<&str>,
        inferred_mime: Option<&str>,
        user_agent: Option<&str>,
    ) -> bool {
        // The extension only stands in when the request carries no Content-Type
        let mime_type = content_type.map(mime::essence).or(inferred_mime);
        self.url.accepts(Some(url))
            && self.mime.accepts(mime_type)
            && self.user_agent.accepts(user_agent)
    }
}

/// All mappings of a rule file, immutable once loaded
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    mappings: Vec<RulesMapping>,
}

impl RuleSet {
    pub fn new(mappings: Vec<RulesMapping>) -> Self {
        Self { mappings }
    }

    /// Load rules from `path`, or the bundled rules when no path is given
    ///
    /// A configured path that cannot be read is an error.
    pub fn load(path: Option<&Path>, registry: &ModuleRegistry) -> Result<Self, RuleError> {
        match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                let rules = parse_rules(&text, registry)?;
                tracing::info!(path = %path.display(), mappings = rules.len(), "Loaded rule file");
                Ok(rules)
            }
            None => Self::bundled(registry),
        }
    }

    pub fn bundled(registry: &ModuleRegistry) -> Result<Self, RuleError> {
        let rules = parse_rules(BUNDLED_RULES, registry)?;
        tracing::info!(mappings = rules.len(), "Loaded bundled rules");
        Ok(rules)
    }

    pub fn mappings(&self) -> &[RulesMapping] {
        &self.mappings
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }

    /// Directive pairs of all matching mappings, in configuration order
    ///
    /// A pair already contributed by an earlier mapping is not added again.
    pub fn eligible(&self, request: &ModuleRequest) -> Vec<Arc<DirectivePair>> {
        let url = remove_fingerprint(request.path());
        let content_type = request.header(CONTENT_TYPE);
        let inferred = mime::infer_from_path(&url);
        let user_agent = request.header(USER_AGENT);

        let mut seen = HashSet::new();
        let mut pairs = Vec::new();
        for mapping in &self.mappings {
            if !mapping.matches(&url, content_type, inferred, user_agent) {
                continue;
            }
            for pair in mapping.pairs() {
                if seen.insert(pair.id().to_string()) {
                    pairs.push(pair.clone());
                }
            }
        }
        pairs
    }
}
