// Conditional requests against real modification times

use http::header::{IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED};
use http::StatusCode;
use webmerge::freshness::{evaluate, format_http_date, ConditionalHeaders, Freshness};
use webmerge::resource::{aggregate, resolve, DocumentRoot};

use super::test_harness::{get, get_with, Site, EPOCH_SECS};

const MERGE_RULES: &str = "for acceptURL=\".*\\.js\"\nJSCSSMerge\n";

fn js_site() -> Site {
    let site = Site::new();
    site.write("js/a.js", "a();\n").write("js/b.js", "b();\n");
    site.touch("js/a.js", EPOCH_SECS, 0);
    site.touch("js/b.js", EPOCH_SECS - 60, 0);
    site
}

#[test]
fn test_last_modified_is_newest_member() {
    let site = js_site();
    let pipeline = site.pipeline(MERGE_RULES);

    let response = pipeline.handle(get("/js/a,b.js"));

    assert_eq!(
        response.header(LAST_MODIFIED),
        Some(format_http_date(EPOCH_SECS as i64 * 1000).as_str())
    );
}

#[test]
fn test_if_modified_since_round_trip() {
    let site = js_site();
    let pipeline = site.pipeline(MERGE_RULES);
    let first = pipeline.handle(get("/js/a,b.js"));
    let last_modified = first.header(LAST_MODIFIED).unwrap().to_string();

    let second = pipeline.handle(get_with(
        "/js/a,b.js",
        &[(IF_MODIFIED_SINCE, last_modified.as_str())],
    ));
    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    assert!(second.body().is_empty());

    // One millisecond newer is modified
    site.touch("js/b.js", EPOCH_SECS, 1);
    let third = pipeline.handle(get_with(
        "/js/a,b.js",
        &[(IF_MODIFIED_SINCE, last_modified.as_str())],
    ));
    assert_eq!(third.status(), StatusCode::OK);
    assert_eq!(third.body(), b"a();\nb();\n");
}

#[test]
fn test_symmetry_at_millisecond_resolution() {
    let site = js_site();
    let root = DocumentRoot::new(site.root());
    let set = resolve("", "/js/a,b.js").unwrap();

    let current = aggregate(&root, &set).unwrap();
    assert_eq!(current.last_modified_ms, EPOCH_SECS as i64 * 1000);

    let conditional = ConditionalHeaders {
        if_modified_since: Some(format_http_date(current.last_modified_ms)),
        if_none_match: Some(current.etag_header()),
    };
    assert_eq!(evaluate(&conditional, Some(&current)), Freshness::NotModified);

    site.touch("js/b.js", EPOCH_SECS, 1);
    let advanced = aggregate(&root, &set).unwrap();
    assert_eq!(advanced.last_modified_ms, EPOCH_SECS as i64 * 1000 + 1);
    assert_ne!(advanced.etag, current.etag);
    assert_eq!(evaluate(&conditional, Some(&advanced)), Freshness::Modified);
}

#[test]
fn test_stale_etag_is_modified() {
    let site = js_site();
    let pipeline = site.pipeline(MERGE_RULES);

    let response = pipeline.handle(get_with("/js/a,b.js", &[(IF_NONE_MATCH, "\"0#0|0#0\"")]));

    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_unparseable_date_is_ignored() {
    let site = js_site();
    let pipeline = site.pipeline(MERGE_RULES);

    let response = pipeline.handle(get_with("/js/a,b.js", &[(IF_MODIFIED_SINCE, "yesterday")]));

    assert_eq!(response.status(), StatusCode::OK);
}
