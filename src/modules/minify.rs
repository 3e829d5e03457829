//! YUICompress: minify JavaScript and CSS responses
//!
//! The directive only decides when to minify; the work is done by the
//! [`Minifier`] held in the shared services.

use http::header::CONTENT_ENCODING;

use super::{is_debug, ModuleArgs};
use crate::constants::DEFAULT_CHARSET;
use crate::pipeline::{DirectivePair, PostDirective, RequestContext};
use crate::resource::mime;

/// Kind of source being minified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Css,
    JavaScript,
}

impl SourceKind {
    pub fn from_content_type(content_type: &str) -> Option<Self> {
        match mime::essence(content_type).to_ascii_lowercase().as_str() {
            "text/css" => Some(Self::Css),
            "text/javascript" | "application/javascript" | "application/x-javascript" => {
                Some(Self::JavaScript)
            }
            _ => None,
        }
    }
}

/// Encoding of the sources handed to the minifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourceCharset {
    #[default]
    Utf8,
    /// ISO-8859-1, one byte per character
    Latin1,
}

impl SourceCharset {
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "utf-8" | "utf8" | "us-ascii" | "ascii" => Some(Self::Utf8),
            "iso-8859-1" | "iso8859-1" | "latin1" => Some(Self::Latin1),
            _ => None,
        }
    }

    fn decode(self, source: &[u8]) -> Result<String, String> {
        match self {
            Self::Utf8 => std::str::from_utf8(source)
                .map(str::to_string)
                .map_err(|e| format!("source is not UTF-8: {}", e)),
            Self::Latin1 => Ok(source.iter().map(|&b| char::from(b)).collect()),
        }
    }

    fn encode(self, text: String) -> Vec<u8> {
        match self {
            Self::Utf8 => text.into_bytes(),
            // Only characters decoded from the source or ASCII punctuation reach here
            Self::Latin1 => text.chars().map(|c| u8::try_from(c).unwrap_or(b'?')).collect(),
        }
    }
}

/// Options of a `YUICompress` line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinifyOptions {
    /// Insert a line break once a line exceeds this many bytes
    pub line_break: Option<usize>,
    /// Keep the last `;` of a CSS declaration block
    pub preserve_semi: bool,
    /// Skip value rewrites such as `#aabbcc` to `#abc`
    pub disable_optimizations: bool,
    pub charset: SourceCharset,
}

impl MinifyOptions {
    pub fn from_args(args: &ModuleArgs) -> Result<Self, String> {
        args.expect_keys(&["lineBreak", "preserveSemi", "disableOptimizations", "charset"])?;
        // A negative line break disables breaking
        let line_break: i64 = args.parsed_value("lineBreak", -1)?;
        let charset = match args.value("charset") {
            None => SourceCharset::parse(DEFAULT_CHARSET).unwrap_or_default(),
            Some(name) => SourceCharset::parse(name)
                .ok_or_else(|| format!("unsupported charset '{}'", name))?,
        };
        Ok(Self {
            line_break: usize::try_from(line_break).ok().filter(|n| *n > 0),
            preserve_semi: args.bool_value("preserveSemi", false)?,
            disable_optimizations: args.bool_value("disableOptimizations", false)?,
            charset,
        })
    }
}

/// Source minifier
pub trait Minifier: Send + Sync {
    fn minify(&self, kind: SourceKind, source: &[u8], options: &MinifyOptions) -> Result<Vec<u8>, String>;
}

/// Conservative minifier
///
/// CSS: comments removed (except `/*! ... */`), whitespace collapsed and
/// dropped around punctuation, `;}` shortened to `}`, six digit colors with
/// repeated pairs shortened. Strings are kept as is.
/// JavaScript: lines are trimmed and blank lines dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceMinifier;

impl Minifier for WhitespaceMinifier {
    fn minify(&self, kind: SourceKind, source: &[u8], options: &MinifyOptions) -> Result<Vec<u8>, String> {
        let text = options.charset.decode(source)?;
        let minified = match kind {
            SourceKind::Css => minify_css(&text, options),
            SourceKind::JavaScript => minify_js(&text),
        };
        Ok(options.charset.encode(minified))
    }
}

fn minify_css(source: &str, options: &MinifyOptions) -> String {
    const TIGHT: &[char] = &['{', '}', ':', ';', ',', '>'];
    // At-rules whose blocks hold rules rather than declarations
    const GROUPING: &[&str] = &["@media", "@supports", "@document", "@layer", "@container"];

    let mut out = String::with_capacity(source.len());
    let mut line_start = 0usize;
    let mut pending_space = false;
    // One entry per open block, true when it holds declarations
    let mut blocks: Vec<bool> = Vec::new();
    let mut prelude_start = 0usize;
    let mut chars = source.chars().peekable();

    while let Some(c) = chars.next() {
        let in_declarations = blocks.last().copied().unwrap_or(false);
        match c {
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let keep = chars.peek() == Some(&'!');
                let mut comment = String::from("/*");
                let mut prev = '\0';
                for c in chars.by_ref() {
                    comment.push(c);
                    if prev == '*' && c == '/' {
                        break;
                    }
                    prev = c;
                }
                if keep {
                    out.push_str(&comment);
                    prelude_start = out.len();
                }
            }
            '"' | '\'' => {
                if pending_space && !out.is_empty() && !out.ends_with(TIGHT) {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);
                let mut escaped = false;
                for s in chars.by_ref() {
                    out.push(s);
                    if escaped {
                        escaped = false;
                    } else if s == '\\' {
                        escaped = true;
                    } else if s == c {
                        break;
                    }
                }
            }
            c if c.is_whitespace() => pending_space = true,
            c => {
                if c == '}' && out.ends_with(';') && !options.preserve_semi {
                    out.pop();
                }
                // In a selector `a :hover` and `a:hover` differ
                let tight = TIGHT.contains(&c) && (c != ':' || in_declarations);
                if pending_space && !out.is_empty() && !out.ends_with(TIGHT) && !tight {
                    out.push(' ');
                }
                pending_space = false;
                out.push(c);

                match c {
                    '#' if in_declarations && !options.disable_optimizations => {
                        let ahead: Vec<char> = chars.clone().take(7).collect();
                        if let Some(short) = short_hex_color(&ahead) {
                            out.push_str(&short);
                            for _ in 0..6 {
                                chars.next();
                            }
                        }
                    }
                    '{' => {
                        let prelude = out[prelude_start..out.len() - 1].trim_start();
                        blocks.push(!GROUPING.iter().any(|g| prelude.starts_with(g)));
                        prelude_start = out.len();
                    }
                    '}' => {
                        blocks.pop();
                        prelude_start = out.len();
                        if let Some(limit) = options.line_break {
                            if out.len() - line_start > limit {
                                out.push('\n');
                                line_start = out.len();
                                prelude_start = out.len();
                            }
                        }
                    }
                    ';' => prelude_start = out.len(),
                    _ => {}
                }
            }
        }
    }
    out
}

/// `aabbcc` (followed by a non-name character) to `abc`
fn short_hex_color(ahead: &[char]) -> Option<String> {
    let digits = ahead.get(..6)?;
    if !digits.iter().all(char::is_ascii_hexdigit) {
        return None;
    }
    if ahead
        .get(6)
        .map_or(false, |c| c.is_alphanumeric() || *c == '-' || *c == '_')
    {
        return None;
    }
    let pairs_repeat = digits
        .chunks(2)
        .all(|pair| pair[0].eq_ignore_ascii_case(&pair[1]));
    pairs_repeat.then(|| digits.iter().step_by(2).collect())
}

fn minify_js(source: &str) -> String {
    let mut out = source
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

pub fn build(args: &ModuleArgs) -> Result<DirectivePair, String> {
    let options = MinifyOptions::from_args(args)?;
    Ok(DirectivePair::new(
        args.id(),
        None,
        Some(Box::new(MinifyResponse { options })),
    ))
}

#[derive(Debug)]
pub struct MinifyResponse {
    options: MinifyOptions,
}

impl PostDirective for MinifyResponse {
    fn execute(&self, ctx: &mut RequestContext) {
        if ctx.is_aborted() || is_debug(ctx.request()) {
            return;
        }
        let services = ctx.shared();
        let response = ctx.response_mut();
        if !response.status().is_success() || response.headers().contains_key(CONTENT_ENCODING) {
            return;
        }
        let Some(kind) = response.content_type().and_then(SourceKind::from_content_type) else {
            return;
        };

        match services.minifier.minify(kind, response.body(), &self.options) {
            Ok(minified) => {
                tracing::debug!(?kind, original = response.body().len(), minified = minified.len(), "Minified response");
                response.set_body(minified);
            }
            Err(e) => tracing::warn!(?kind, error = %e, "Minification failed, sending original"),
        }
    }
}
