// Response cache behaviour behind the merge directive

use std::sync::Arc;

use http::header::{ACCEPT_ENCODING, CONTENT_ENCODING, ETAG, IF_NONE_MATCH};
use http::StatusCode;
use webmerge::cache::{CacheConfig, ResponseCache};

use super::test_harness::{body_text, get, get_with, Site, EPOCH_SECS};

const CACHED_MERGE: &str = "\
for acceptURL=\".*\\.(js|css)\"
ResponseCache
JSCSSMerge
";

fn setup(rules: &str) -> (Site, Arc<ResponseCache>, webmerge::pipeline::DirectivePipeline) {
    let site = Site::new();
    site.write("js/a.js", "a();\n").write("js/b.js", "b();\n");
    let cache = Arc::new(ResponseCache::new(&CacheConfig::default()));
    let pipeline = site.pipeline_with_cache(rules, cache.clone());
    (site, cache, pipeline)
}

#[test]
fn test_second_request_is_served_from_cache() {
    let (_site, cache, pipeline) = setup(CACHED_MERGE);

    let first = pipeline.handle(get("/js/a,b.js"));
    assert_eq!(cache.stats().hits, 0);

    let second = pipeline.handle(get("/js/a,b.js"));
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.body(), first.body());
    assert_eq!(second.header(ETAG), first.header(ETAG));
}

#[test]
fn test_modified_member_is_never_served_stale() {
    let (site, _cache, pipeline) = setup(CACHED_MERGE);
    pipeline.handle(get("/js/a,b.js"));

    site.write("js/b.js", "b(); b2();\n");
    let response = pipeline.handle(get("/js/a,b.js"));

    assert_eq!(body_text(&response), "a();\nb(); b2();\n");
}

#[test]
fn test_fingerprinted_and_plain_urls_share_an_entry() {
    let (_site, cache, pipeline) = setup(CACHED_MERGE);
    let first = pipeline.handle(get("/js/a,b.js"));
    let etag = first.header(ETAG).unwrap().trim_matches('"').to_string();

    let url = webmerge::resource::add_fingerprint("/js/a,b.js", &etag);
    let second = pipeline.handle(get(&url));

    assert_eq!(cache.stats().hits, 1);
    assert_eq!(second.body(), first.body());
}

#[test]
fn test_skip_and_debug_bypass_the_cache() {
    let (_site, cache, pipeline) = setup(CACHED_MERGE);
    pipeline.handle(get("/js/a,b.js"));

    pipeline.handle(get("/js/a,b.js").with_query("skipCache"));
    pipeline.handle(get("/js/a,b.js").with_query("_dbg_"));

    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn test_reset_param_clears_everything() {
    let (_site, cache, pipeline) = setup(CACHED_MERGE);
    pipeline.handle(get("/js/a,b.js"));
    pipeline.handle(get("/js/a.js"));

    let response = pipeline.handle(get("/js/b.js").with_query("resetCache"));
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(cache.stats().resets, 1);

    pipeline.handle(get("/js/a,b.js"));
    pipeline.handle(get("/js/a.js"));
    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn test_conditional_request_answered_by_cache() {
    let (_site, _cache, pipeline) = setup(CACHED_MERGE);
    let first = pipeline.handle(get("/js/a,b.js"));
    let etag = first.header(ETAG).unwrap().to_string();

    let response = pipeline.handle(get_with("/js/a,b.js", &[(IF_NONE_MATCH, etag.as_str())]));

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert!(response.body().is_empty());
}

#[test]
fn test_errors_are_not_cached() {
    let (site, cache, pipeline) = setup(CACHED_MERGE);
    let missing = pipeline.handle(get("/js/c,d.js"));
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);

    site.write("js/c.js", "c();\n");
    let present = pipeline.handle(get("/js/c,d.js"));

    assert_eq!(present.status(), StatusCode::OK);
    assert_eq!(body_text(&present), "c();\n");
    assert_eq!(cache.stats().hits, 0);
}

#[test]
fn test_cached_body_is_compressed_per_request() {
    let rules = "\
for acceptURL=\".*\\.js\"
Compression threshold 1
ResponseCache
JSCSSMerge
";
    let (_site, cache, pipeline) = setup(rules);

    let plain = pipeline.handle(get("/js/a,b.js"));
    assert!(plain.header(CONTENT_ENCODING).is_none());

    let gzipped = pipeline.handle(get_with("/js/a,b.js", &[(ACCEPT_ENCODING, "gzip")]));
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(gzipped.header(CONTENT_ENCODING), Some("gzip"));

    let again = pipeline.handle(get("/js/a,b.js"));
    assert_eq!(cache.stats().hits, 2);
    assert_eq!(again.body(), plain.body());
}

#[test]
fn test_not_modified_drops_outdated_entry() {
    let (site, cache, pipeline) = setup(CACHED_MERGE);
    site.touch("js/b.js", EPOCH_SECS, 0);
    pipeline.handle(get("/js/a,b.js"));
    assert_eq!(cache.entry_count(), 1);

    // The client already holds the new version
    site.touch("js/b.js", EPOCH_SECS + 60, 0);
    let current = site.pipeline("for\nJSCSSMerge\n").handle(get("/js/a,b.js"));
    let etag = current.header(ETAG).unwrap().to_string();

    let response = pipeline.handle(get_with("/js/a,b.js", &[(IF_NONE_MATCH, &etag)]));

    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
    assert_eq!(cache.entry_count(), 0);
    let stats = cache.stats();
    assert_eq!((stats.hits, stats.misses, stats.evictions), (0, 1, 1));
}
