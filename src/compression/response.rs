/// Response compression helpers

use crate::resource::mime;

/// Whether a Content-Type is worth compressing
pub fn is_compressible_content_type(content_type: Option<&str>) -> bool {
    match content_type {
        None => false,
        Some(ct) => {
            let ct = mime::essence(ct).to_ascii_lowercase();
            ct.starts_with("text/")
                || ct.contains("json")
                || ct.contains("xml")
                || ct.contains("javascript")
                || ct.contains("svg")
        }
    }
}

/// Whether a body of `size` bytes reaches the compression threshold
pub fn should_compress_by_size(size: usize, threshold: usize) -> bool {
    size > 0 && size >= threshold
}

/// Append a coding suffix inside a quoted ETag: `"abc"` → `"abc-gzip"`
pub fn suffix_etag(etag: &str, suffix: &str) -> String {
    let (weak, tag) = match etag.strip_prefix("W/") {
        Some(rest) => ("W/", rest),
        None => ("", etag),
    };
    match tag.strip_suffix('"') {
        Some(open) => format!("{}{}{}\"", weak, open, suffix),
        None => format!("{}{}{}", weak, tag, suffix),
    }
}
