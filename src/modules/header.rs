//! Header: rewrite request or response headers
//!
//! ```text
//! Header Request set X-Forwarded-Proto https
//! Header Response onsuccess set Expires access plus 1 month 2 days
//! Header Response always echo X-Request-.*
//! ```
//!
//! Response rules default to `always`; `onsuccess` limits them to 2xx.

use chrono::{Duration, Months, TimeZone, Utc};
use http::header::EXPIRES;
use http::{HeaderMap, HeaderName, HeaderValue};

use super::{current_fingerprint, ModuleArgs};
use crate::cache::now_millis;
use crate::freshness::format_http_date;
use crate::pipeline::{DirectiveOutcome, DirectivePair, PostDirective, PreDirective, RequestContext};
use crate::rules::Pattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderAction {
    Set,
    Add,
    Append,
    Unset,
    Echo,
}

impl HeaderAction {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "set" => Some(Self::Set),
            "add" => Some(Self::Add),
            "append" => Some(Self::Append),
            "unset" => Some(Self::Unset),
            "echo" => Some(Self::Echo),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCondition {
    OnSuccess,
    Always,
}

/// One parsed header rule
#[derive(Debug, Clone)]
pub struct HeaderRule {
    action: HeaderAction,
    name: String,
    value: Option<String>,
}

impl HeaderRule {
    fn header_name(&self) -> Result<HeaderName, String> {
        HeaderName::from_bytes(self.name.as_bytes())
            .map_err(|_| format!("invalid header name '{}'", self.name))
    }

    /// Apply to `headers`; `value` overrides the configured value
    fn apply(&self, headers: &mut HeaderMap, value: Option<&str>) {
        let Ok(name) = self.header_name() else {
            return;
        };
        let value = value.or(self.value.as_deref()).unwrap_or_default();
        let Ok(header_value) = HeaderValue::from_str(value) else {
            tracing::warn!(header = %name, value = %value, "Skipping invalid header value");
            return;
        };

        match self.action {
            HeaderAction::Set => {
                headers.insert(name, header_value);
            }
            HeaderAction::Add => {
                headers.append(name, header_value);
            }
            HeaderAction::Append => {
                let merged = match headers.get(&name).and_then(|v| v.to_str().ok()) {
                    Some(existing) if !existing.is_empty() => format!("{}, {}", existing, value),
                    _ => value.to_string(),
                };
                if let Ok(merged) = HeaderValue::from_str(&merged) {
                    headers.insert(name, merged);
                }
            }
            HeaderAction::Unset => {
                headers.remove(name);
            }
            HeaderAction::Echo => {}
        }
    }
}

pub fn build(args: &ModuleArgs) -> Result<DirectivePair, String> {
    let mut tokens = args.args().iter().map(String::as_str).peekable();
    let target = tokens.next().ok_or("expected Request or Response")?;

    let is_response = match target.to_ascii_lowercase().as_str() {
        "request" => false,
        "response" => true,
        other => return Err(format!("expected Request or Response, got '{}'", other)),
    };

    let mut condition = ResponseCondition::Always;
    if is_response {
        match tokens.peek().map(|t| t.to_ascii_lowercase()) {
            Some(t) if t == "onsuccess" => {
                condition = ResponseCondition::OnSuccess;
                tokens.next();
            }
            Some(t) if t == "always" => {
                tokens.next();
            }
            _ => {}
        }
    }

    let action_token = tokens.next().ok_or("missing header action")?;
    let action = HeaderAction::parse(action_token)
        .ok_or_else(|| format!("unknown header action '{}'", action_token))?;
    let name = tokens.next().ok_or("missing header name")?.to_string();
    let rest: Vec<&str> = tokens.collect();
    let value = (!rest.is_empty()).then(|| rest.join(" "));

    let rule = HeaderRule { action, name, value };
    match (is_response, action) {
        (false, HeaderAction::Echo) => Err("echo applies to responses only".to_string()),
        (false, _) => {
            rule.header_name()?;
            Ok(DirectivePair::new(
                args.id(),
                Some(Box::new(RequestHeaderRule { rule })),
                None,
            ))
        }
        (true, HeaderAction::Echo) => {
            let pattern = Pattern::new(&rule.name).map_err(|e| e.to_string())?;
            Ok(DirectivePair::new(
                args.id(),
                None,
                Some(Box::new(ResponseHeaderRule {
                    rule,
                    condition,
                    echo: Some(pattern),
                    expires: None,
                })),
            ))
        }
        (true, _) => {
            let name = rule.header_name()?;
            let expires = if name == EXPIRES {
                rule.value.as_deref().and_then(ExpiresOffset::parse)
            } else {
                None
            };
            Ok(DirectivePair::new(
                args.id(),
                None,
                Some(Box::new(ResponseHeaderRule {
                    rule,
                    condition,
                    echo: None,
                    expires,
                })),
            ))
        }
    }
}

#[derive(Debug)]
pub struct RequestHeaderRule {
    rule: HeaderRule,
}

impl PreDirective for RequestHeaderRule {
    fn execute(&self, ctx: &mut RequestContext) -> DirectiveOutcome {
        self.rule.apply(ctx.request_mut().headers_mut(), None);
        DirectiveOutcome::Continue
    }
}

#[derive(Debug)]
pub struct ResponseHeaderRule {
    rule: HeaderRule,
    condition: ResponseCondition,
    echo: Option<Pattern>,
    expires: Option<ExpiresOffset>,
}

impl PostDirective for ResponseHeaderRule {
    fn execute(&self, ctx: &mut RequestContext) {
        if self.condition == ResponseCondition::OnSuccess && !ctx.response().status().is_success() {
            return;
        }

        if let Some(pattern) = &self.echo {
            let (request, response) = ctx.exchange_mut();
            for (name, value) in request.headers() {
                if pattern.is_match(name.as_str()) {
                    response.headers_mut().insert(name.clone(), value.clone());
                }
            }
            return;
        }

        let expires = self.expires.as_ref().and_then(|offset| {
            let modified_ms = match offset.base {
                ExpiresBase::Modified => {
                    let services = ctx.shared();
                    current_fingerprint(&services, ctx.request())
                        .ok()
                        .and_then(|(_, current)| current)
                        .map(|c| c.last_modified_ms)
                }
                ExpiresBase::Access => None,
            };
            offset.resolve(now_millis(), modified_ms)
        });

        let value = expires.map(format_http_date);
        self.rule.apply(ctx.response_mut().headers_mut(), value.as_deref());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiresBase {
    Access,
    Modified,
}

/// `access plus 1 month 2 days`, `modified plus 3 hours`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiresOffset {
    pub base: ExpiresBase,
    pub months: u32,
    pub seconds: i64,
}

impl ExpiresOffset {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim().trim_matches('"');
        let mut words = text.split_whitespace();

        let base = match words.next()?.to_ascii_lowercase().as_str() {
            "access" | "now" => ExpiresBase::Access,
            "modified" | "modification" => ExpiresBase::Modified,
            _ => return None,
        };
        if !words.next()?.eq_ignore_ascii_case("plus") {
            return None;
        }

        let mut offset = Self {
            base,
            months: 0,
            seconds: 0,
        };
        let mut any = false;
        while let Some(amount) = words.next() {
            let amount: u32 = amount.parse().ok()?;
            let unit = words.next()?.to_ascii_lowercase();
            let unit = unit.strip_suffix('s').unwrap_or(&unit);
            let seconds_per_unit: i64 = match unit {
                "year" => {
                    offset.months = offset.months.checked_add(amount.checked_mul(12)?)?;
                    0
                }
                "month" => {
                    offset.months = offset.months.checked_add(amount)?;
                    0
                }
                "week" => 7 * 86_400,
                "day" => 86_400,
                "hour" => 3_600,
                "minute" => 60,
                "second" => 1,
                _ => return None,
            };
            offset.seconds = offset
                .seconds
                .checked_add(i64::from(amount).checked_mul(seconds_per_unit)?)?;
            any = true;
        }
        any.then_some(offset)
    }

    /// Expiry instant in epoch milliseconds
    ///
    /// A `modified` base without a known modification time falls back to the
    /// access time.
    pub fn resolve(&self, access_ms: i64, modified_ms: Option<i64>) -> Option<i64> {
        let base_ms = match self.base {
            ExpiresBase::Access => access_ms,
            ExpiresBase::Modified => modified_ms.unwrap_or(access_ms),
        };
        let base = Utc.timestamp_millis_opt(base_ms).single()?;
        let shifted = base.checked_add_months(Months::new(self.months))?;
        let shifted = shifted.checked_add_signed(Duration::seconds(self.seconds))?;
        Some(shifted.timestamp_millis())
    }
}
