//! Charset: declare the character encoding of text responses
//!
//! `Charset UTF-8` adds `charset=UTF-8` to a textual Content-Type that does
//! not name one; `Charset UTF-8 force` replaces whatever charset is there.

use http::header::CONTENT_TYPE;

use super::ModuleArgs;
use crate::pipeline::{DirectivePair, PostDirective, RequestContext};
use crate::resource::mime;

pub fn build(args: &ModuleArgs) -> Result<DirectivePair, String> {
    let (encoding, force) = match args.args() {
        [encoding] => (encoding.clone(), false),
        [encoding, flag] if flag.eq_ignore_ascii_case("force") => (encoding.clone(), true),
        _ => return Err("expected '<encoding> [force]'".to_string()),
    };
    if !encoding
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | ':'))
    {
        return Err(format!("invalid encoding name '{}'", encoding));
    }

    Ok(DirectivePair::new(
        args.id(),
        None,
        Some(Box::new(ResponseCharset { encoding, force })),
    ))
}

#[derive(Debug)]
pub struct ResponseCharset {
    encoding: String,
    force: bool,
}

impl PostDirective for ResponseCharset {
    fn execute(&self, ctx: &mut RequestContext) {
        let response = ctx.response_mut();
        let Some(content_type) = response.content_type() else {
            return;
        };
        if !self.force && (has_charset(content_type) || !mime::is_textual(content_type)) {
            return;
        }
        let value = with_charset(content_type, &self.encoding);
        response.set_header(CONTENT_TYPE, &value);
    }
}

fn is_charset_param(param: &str) -> bool {
    param
        .split('=')
        .next()
        .is_some_and(|key| key.trim().eq_ignore_ascii_case("charset"))
}

fn has_charset(content_type: &str) -> bool {
    content_type.split(';').skip(1).any(is_charset_param)
}

/// Replace or add the charset parameter of a Content-Type value
fn with_charset(content_type: &str, encoding: &str) -> String {
    let params: Vec<&str> = content_type
        .split(';')
        .skip(1)
        .map(str::trim)
        .filter(|p| !p.is_empty() && !is_charset_param(p))
        .collect();

    let mut value = mime::essence(content_type).to_string();
    for param in params {
        value.push_str("; ");
        value.push_str(param);
    }
    value.push_str("; charset=");
    value.push_str(encoding);
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, ResponseCache};
    use crate::pipeline::{ModuleRequest, Services};
    use crate::resource::DocumentRoot;
    use http::Method;
    use std::sync::Arc;

    fn args(line: &str) -> ModuleArgs {
        ModuleArgs::new("Charset", line.split_whitespace().map(String::from).collect())
    }

    fn context() -> RequestContext {
        let services = Arc::new(Services::new(
            DocumentRoot::new("/nonexistent"),
            Arc::new(ResponseCache::new(&CacheConfig::default())),
        ));
        RequestContext::new(ModuleRequest::new(Method::GET, "/a.css"), services)
    }

    #[test]
    fn test_with_charset() {
        assert_eq!(with_charset("text/css", "UTF-8"), "text/css; charset=UTF-8");
        assert_eq!(
            with_charset("text/html; charset=ISO-8859-1; q=1", "UTF-8"),
            "text/html; q=1; charset=UTF-8"
        );
    }

    fn respond(line: &str, content_type: &str) -> Option<String> {
        let pair = build(&args(line)).unwrap();
        assert!(pair.pre().is_none());
        let mut ctx = context();
        ctx.response_mut().set_header(CONTENT_TYPE, content_type);
        pair.post().unwrap().execute(&mut ctx);
        ctx.response().content_type().map(str::to_string)
    }

    #[test]
    fn test_defaults_missing_charset() {
        assert_eq!(
            respond("UTF-8", "text/css").as_deref(),
            Some("text/css; charset=UTF-8")
        );
        assert_eq!(
            respond("UTF-8", "application/json").as_deref(),
            Some("application/json; charset=UTF-8")
        );
        // An existing charset wins without force
        assert_eq!(
            respond("UTF-8", "text/css; charset=ISO-8859-1").as_deref(),
            Some("text/css; charset=ISO-8859-1")
        );
        assert_eq!(respond("UTF-8", "image/png").as_deref(), Some("image/png"));
    }

    #[test]
    fn test_force_rewrites_response() {
        assert_eq!(
            respond("ISO-8859-1 force", "text/css; charset=UTF-8").as_deref(),
            Some("text/css; charset=ISO-8859-1")
        );
        assert_eq!(
            respond("ISO-8859-1 force", "text/css").as_deref(),
            Some("text/css; charset=ISO-8859-1")
        );
    }

    #[test]
    fn test_no_content_type_is_left_alone() {
        let pair = build(&args("UTF-8")).unwrap();
        let mut ctx = context();
        pair.post().unwrap().execute(&mut ctx);
        assert_eq!(ctx.response().content_type(), None);
    }

    #[test]
    fn test_invalid_lines() {
        assert!(build(&args("")).is_err());
        assert!(build(&args("UTF-8 please")).is_err());
        assert!(build(&args("UTF 8")).is_err());
    }
}
