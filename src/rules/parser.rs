//! Line-oriented rule file parser
//!
//! ```text
//! # comment
//! for acceptURL=".*\.css" ignoreUA=".*MSIE 6.*"
//! Compression threshold 1024
//! JSCSSMerge expiresMinutes 60
//! ```
//!
//! Module lines before the first `for` form a block that applies to every
//! request.

use super::error::RuleError;
use super::{Condition, Pattern, RuleSet, RulesMapping};
use crate::modules::{ModuleArgs, ModuleRegistry};

/// Parse rule file text
pub fn parse_rules(text: &str, registry: &ModuleRegistry) -> Result<RuleSet, RuleError> {
    let mut mappings = Vec::new();
    let mut current: Option<RulesMapping> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let tokens = tokenize(line);
        let Some((head, rest)) = tokens.split_first() else {
            continue;
        };

        if head.eq_ignore_ascii_case("for") {
            if let Some(done) = current.take() {
                mappings.push(done);
            }
            current = Some(parse_conditions(line_no, rest)?);
            continue;
        }

        let args = ModuleArgs::new(head.clone(), rest.to_vec());
        let pair = registry.create(line_no, &args)?;
        tracing::debug!(line = line_no, directive = %pair.id(), "Configured directive");
        current.get_or_insert_with(RulesMapping::default).push(pair);
    }

    if let Some(done) = current {
        mappings.push(done);
    }

    Ok(RuleSet::new(mappings))
}

fn parse_conditions(line: usize, tokens: &[String]) -> Result<RulesMapping, RuleError> {
    let mut url = Condition::default();
    let mut mime = Condition::default();
    let mut user_agent = Condition::default();

    for token in tokens {
        let (key, value) = token.split_once('=').ok_or_else(|| RuleError::InvalidCondition {
            line,
            detail: format!("expected key=value, found '{}'", token),
        })?;
        let pattern = Pattern::new(value).map_err(|source| RuleError::InvalidPattern {
            line,
            key: key.to_string(),
            source,
        })?;

        let slot = match key.to_ascii_lowercase().as_str() {
            "accepturl" => &mut url.accept,
            "ignoreurl" => &mut url.ignore,
            "acceptmime" => &mut mime.accept,
            "ignoremime" => &mut mime.ignore,
            "acceptua" => &mut user_agent.accept,
            "ignoreua" => &mut user_agent.ignore,
            _ => {
                return Err(RuleError::InvalidCondition {
                    line,
                    detail: format!("unknown condition '{}'", key),
                })
            }
        };
        *slot = Some(pattern);
    }

    Ok(RulesMapping::new(url, mime, user_agent))
}

/// Split on whitespace, keeping double-quoted runs together
///
/// Quotes are removed: `acceptUA="Mozilla 5"` yields `acceptUA=Mozilla 5`.
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}
