// Content coding of merged responses

use std::io::Read;

use flate2::read::GzDecoder;
use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, ETAG, IF_NONE_MATCH, VARY};
use http::StatusCode;

use super::test_harness::{get, get_with, Site};

const RULES: &str = "\
for acceptURL=\".*\\.(js|css)\"
Compression threshold 64
JSCSSMerge
";

fn large_site() -> Site {
    let site = Site::new();
    site.write("css/a.css", &"a{color:red}\n".repeat(20))
        .write("css/b.css", &"b{color:blue}\n".repeat(20))
        .write("css/tiny.css", "t{}");
    site
}

fn gunzip(bytes: &[u8]) -> String {
    let mut out = String::new();
    GzDecoder::new(bytes).read_to_string(&mut out).unwrap();
    out
}

#[test]
fn test_gzip_round_trip() {
    let site = large_site();
    let pipeline = site.pipeline(RULES);
    let identity = pipeline.handle(get("/css/a,b.css"));

    let response = pipeline.handle(get_with("/css/a,b.css", &[(ACCEPT_ENCODING, "gzip, deflate")]));

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.header(CONTENT_ENCODING), Some("gzip"));
    assert_eq!(response.header(VARY), Some("Accept-Encoding"));
    assert!(response.body().len() < identity.body().len());
    assert_eq!(gunzip(response.body()).as_bytes(), identity.body());
}

#[test]
fn test_compressed_etag_still_validates() {
    let site = large_site();
    let pipeline = site.pipeline(RULES);
    let response = pipeline.handle(get_with("/css/a,b.css", &[(ACCEPT_ENCODING, "gzip")]));
    let etag = response.header(ETAG).unwrap().to_string();
    assert!(etag.contains("-gzip"), "unexpected etag {}", etag);

    let conditional = pipeline.handle(get_with(
        "/css/a,b.css",
        &[(ACCEPT_ENCODING, "gzip"), (IF_NONE_MATCH, etag.as_str())],
    ));

    assert_eq!(conditional.status(), StatusCode::NOT_MODIFIED);
    assert!(conditional.body().is_empty());
    assert!(conditional.header(CONTENT_ENCODING).is_none());
}

#[test]
fn test_small_body_sent_as_is() {
    let site = large_site();
    let pipeline = site.pipeline(RULES);

    let response = pipeline.handle(get_with("/css/tiny.css", &[(ACCEPT_ENCODING, "gzip")]));

    assert!(response.header(CONTENT_ENCODING).is_none());
    assert_eq!(response.body(), b"t{}");
}

#[test]
fn test_brotli_when_only_brotli_accepted() {
    let site = large_site();
    let pipeline = site.pipeline(RULES);

    let response = pipeline.handle(get_with("/css/a,b.css", &[(ACCEPT_ENCODING, "br")]));

    assert_eq!(response.header(CONTENT_ENCODING), Some("br"));
}

#[test]
fn test_errors_are_not_compressed() {
    let site = large_site();
    let pipeline = site.pipeline(RULES);

    let response = pipeline.handle(get_with("/css/x,y.css", &[(ACCEPT_ENCODING, "gzip")]));

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.header(CONTENT_ENCODING).is_none());
}
