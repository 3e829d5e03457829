// Composite requests served end to end through the directive pipeline

use http::header::{CONTENT_TYPE, ETAG, IF_NONE_MATCH, LAST_MODIFIED};
use http::StatusCode;
use webmerge::resource::add_fingerprint;

use super::test_harness::{body_text, get, get_with, Site};

const MERGE_RULES: &str = "for acceptURL=\".*\\.(js|css|json)\"\nJSCSSMerge\n";

fn css_site() -> Site {
    let site = Site::new();
    site.write("css/a.css", "a{color:red}")
        .write("css/b.css", "b{background:url(img/x.png)}\n")
        .write("css/c.css", "c{}\n")
        .write("css/img/x.png", "png");
    site
}

#[test]
fn test_merges_members_in_order() {
    let site = css_site();
    let pipeline = site.pipeline(MERGE_RULES);

    let response = pipeline.handle(get("/css/a,b,c.css"));

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.is_committed());
    assert_eq!(response.header(CONTENT_TYPE), Some("text/css"));
    assert!(response.header(ETAG).is_some());
    assert!(response.header(LAST_MODIFIED).is_some());

    let body = body_text(&response);
    let a = body.find("a{color:red}").unwrap();
    let b = body.find("b{background:").unwrap();
    let c = body.find("c{}").unwrap();
    assert!(a < b && b < c, "members out of order: {}", body);
}

#[test]
fn test_css_urls_point_at_fingerprinted_files() {
    let site = css_site();
    let pipeline = site.pipeline(MERGE_RULES);

    let body = body_text(&pipeline.handle(get("/css/b.css")));

    assert!(body.contains("url(/css/img/x_wu_"), "unexpected body: {}", body);
    assert!(body.contains(".png)"));
}

#[test]
fn test_relative_segments_follow_previous_member() {
    let site = Site::new();
    site.write("js/app/main.js", "main();\n")
        .write("js/app/util.js", "util();\n")
        .write("js/lib/jquery.js", "jq();\n");
    let pipeline = site.pipeline(MERGE_RULES);

    let response = pipeline.handle(get("/js/app/main,util,../lib/jquery.js"));

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(&response), "main();\nutil();\njq();\n");
}

#[test]
fn test_matching_etag_gives_empty_not_modified() {
    let site = css_site();
    let pipeline = site.pipeline(MERGE_RULES);

    let first = pipeline.handle(get("/css/a,b,c.css"));
    let etag = first.header(ETAG).unwrap().to_string();

    let second = pipeline.handle(get_with("/css/a,b,c.css", &[(IF_NONE_MATCH, etag.as_str())]));

    assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
    assert!(second.body().is_empty());
    assert_eq!(second.header(ETAG), Some(etag.as_str()));
}

#[test]
fn test_changed_member_changes_etag() {
    let site = css_site();
    let pipeline = site.pipeline(MERGE_RULES);
    let before = pipeline.handle(get("/css/a,b,c.css"));

    site.write("css/b.css", "b{background:none;padding:0}\n");
    let after = pipeline.handle(get("/css/a,b,c.css"));

    assert_ne!(before.header(ETAG), after.header(ETAG));
}

#[test]
fn test_all_members_missing_is_not_found() {
    let site = Site::new();
    site.write("js/present.js", "x();");
    let pipeline = site.pipeline(MERGE_RULES);

    let response = pipeline.handle(get("/js/missing1,missing2.js"));

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(response.header(ETAG).is_none());
}

#[test]
fn test_some_members_missing_are_skipped() {
    let site = css_site();
    let pipeline = site.pipeline(MERGE_RULES);

    let response = pipeline.handle(get("/css/a,nothere,c.css"));

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(&response).starts_with("a{color:red}"));
    assert!(body_text(&response).contains("c{}"));
}

#[test]
fn test_fingerprinted_url_serves_same_content() {
    let site = css_site();
    let pipeline = site.pipeline(MERGE_RULES);

    let plain = pipeline.handle(get("/css/a,c.css"));
    let etag = plain.header(ETAG).unwrap().trim_matches('"').to_string();
    let fingerprinted = pipeline.handle(get(&add_fingerprint("/css/a,c.css", &etag)));

    assert_eq!(fingerprinted.status(), StatusCode::OK);
    assert_eq!(fingerprinted.body(), plain.body());
}

#[test]
fn test_context_path_is_stripped() {
    let site = css_site();
    let pipeline = site.pipeline(MERGE_RULES);

    let response = pipeline.handle(get("/static/css/a,c.css").with_context_path("/static"));

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(&response).starts_with("a{color:red}"));
}

#[test]
fn test_plain_files_fall_through_to_static_handler() {
    let site = Site::new();
    site.write("index.html", "<html></html>");
    let pipeline = site.pipeline(MERGE_RULES);

    let response = pipeline.handle(get("/index.html"));

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.header(CONTENT_TYPE), Some("text/html"));
    assert_eq!(body_text(&response), "<html></html>");
}
