//! MIME type detection module
//!
//! Returns the corresponding Content-Type based on file extension.

/// Get MIME Content-Type based on file extension (without the dot)
pub fn content_type_for_extension(extension: Option<&str>) -> &'static str {
    match extension.map(str::to_ascii_lowercase).as_deref() {
        // Text
        Some("html" | "htm") => "text/html",
        Some("css") => "text/css",
        Some("txt" | "md") => "text/plain",
        Some("xml") => "application/xml",

        // Scripts
        Some("js" | "mjs") => "text/javascript",
        Some("json") => "application/json",
        Some("wasm") => "application/wasm",

        // Images
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        Some("webp") => "image/webp",

        // Video
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogg" | "ogv") => "video/ogg",

        // Audio
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",

        // Fonts
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("ttf") => "font/ttf",
        Some("otf") => "font/otf",
        Some("eot") => "application/vnd.ms-fontobject",

        // Archives and documents
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz" | "gzip") => "application/gzip",

        _ => "application/octet-stream",
    }
}

/// Whether a MIME type carries text that a charset parameter applies to
pub fn is_textual(content_type: &str) -> bool {
    let mime = essence(content_type).to_ascii_lowercase();
    mime.starts_with("text/")
        || mime.ends_with("+xml")
        || mime.ends_with("+json")
        || matches!(
            mime.as_str(),
            "application/javascript" | "application/json" | "application/xml"
        )
}

/// Infer the MIME type of a URL path from its extension
///
/// Returns `None` when the last path component has no extension.
pub fn infer_from_path(path: &str) -> Option<&'static str> {
    let file = path.rsplit('/').next().unwrap_or(path);
    let (_, ext) = file.rsplit_once('.')?;
    if ext.is_empty() {
        return None;
    }
    Some(content_type_for_extension(Some(ext)))
}

/// Strip parameters from a Content-Type value: `text/css; charset=UTF-8` → `text/css`
pub fn essence(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or(content_type).trim()
}

/// Whether a MIME type matches a pattern such as `image/*` or `text/css`
pub fn matches_pattern(mime: &str, pattern: &str) -> bool {
    let mime = essence(mime);
    match pattern.strip_suffix("/*") {
        Some(family) => mime
            .split_once('/')
            .map_or(false, |(f, _)| f.eq_ignore_ascii_case(family)),
        None => mime.eq_ignore_ascii_case(pattern),
    }
}
