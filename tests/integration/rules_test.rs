// Rule files: loading, conditions and directive ordering

use std::io::Write;
use std::net::IpAddr;

use http::header::{CONTENT_TYPE, USER_AGENT};
use http::{HeaderName, StatusCode};
use tempfile::NamedTempFile;
use webmerge::modules::ModuleRegistry;
use webmerge::reload::ReloadManager;
use webmerge::rules::{parse_rules, RuleError, RuleSet};

use super::test_harness::{body_text, get, get_with, Site};

fn site() -> Site {
    let site = Site::new();
    site.write("css/a.css", "a  {\n  color : red ;\n}\n")
        .write("css/b.css", "b { margin: 0; }\n")
        .write("js/a.js", "a();\n");
    site
}

#[test]
fn test_load_rule_file_from_disk() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "# site rules").unwrap();
    writeln!(file, "for acceptURL=\".*\\.css\"").unwrap();
    writeln!(file, "Compression threshold 1024").unwrap();
    writeln!(file, "JSCSSMerge expiresMinutes 60").unwrap();
    writeln!(file).unwrap();
    writeln!(file, "for acceptURL=\".*\\.js\" ignoreUA=\".*MSIE 6.*\"").unwrap();
    writeln!(file, "JSCSSMerge").unwrap();
    file.flush().unwrap();

    let rules = RuleSet::load(Some(file.path()), &ModuleRegistry::builtin()).unwrap();

    assert_eq!(rules.len(), 2);
    assert_eq!(rules.eligible(&get("/css/a,b.css")).len(), 2);
    assert_eq!(rules.eligible(&get("/js/a.js")).len(), 1);
    assert!(rules
        .eligible(&get_with("/js/a.js", &[(USER_AGENT, "Mozilla/4.0 (compatible; MSIE 6.0)")]))
        .is_empty());
}

#[test]
fn test_errors_report_line_numbers() {
    let registry = ModuleRegistry::builtin();

    let err = parse_rules("for acceptURL=\".*\"\n\nFrobnicate\n", &registry).unwrap_err();
    assert!(matches!(err, RuleError::UnknownModule { line: 3, .. }), "{:?}", err);

    let err = parse_rules("for acceptURL=\"(\"\nJSCSSMerge\n", &registry).unwrap_err();
    assert!(matches!(err, RuleError::InvalidPattern { line: 1, .. }), "{:?}", err);

    let err = parse_rules("Compression level 99\n", &registry).unwrap_err();
    assert!(matches!(err, RuleError::InvalidModule { line: 1, .. }), "{:?}", err);
}

#[test]
fn test_mime_condition_uses_inferred_type() {
    let site = site();
    let pipeline = site.pipeline("for acceptMIME=\"text/css\"\nJSCSSMerge\n");

    let css = pipeline.handle(get("/css/a,b.css"));
    assert_eq!(css.status(), StatusCode::OK);
    assert_eq!(css.header(CONTENT_TYPE), Some("text/css"));

    // No mapping applies, so the static handler sees a composite path
    let js = pipeline.handle(get("/js/a,b.js"));
    assert_eq!(js.status(), StatusCode::NOT_FOUND);
}

#[test]
fn test_access_rules_refuse_before_merging() {
    let site = site();
    let pipeline = site.pipeline(
        "for acceptURL=\".*\"\nAccess Allow from 10.0.0.0/8\nJSCSSMerge\n",
    );
    let inside: IpAddr = "10.1.2.3".parse().unwrap();
    let outside: IpAddr = "192.168.0.1".parse().unwrap();

    let allowed = pipeline.handle(get("/css/a,b.css").with_remote_addr(inside));
    assert_eq!(allowed.status(), StatusCode::OK);

    let refused = pipeline.handle(get("/css/a,b.css").with_remote_addr(outside));
    assert_eq!(refused.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_text(&refused), "Forbidden");
}

#[test]
fn test_post_directives_run_before_merge_completes() {
    let site = site();
    let pipeline = site.pipeline(
        "\
for acceptURL=\".*\\.css\"
Header Response set X-Frame-Options DENY
Charset UTF-8 force
YUICompress
JSCSSMerge
",
    );

    let response = pipeline.handle(get("/css/a,b.css"));

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(&response), "a{color:red}b{margin:0}");
    assert_eq!(response.header(CONTENT_TYPE), Some("text/css; charset=UTF-8"));
    assert_eq!(
        response.header(HeaderName::from_static("x-frame-options")),
        Some("DENY")
    );
}

#[test]
fn test_debug_request_is_not_minified() {
    let site = site();
    let pipeline = site.pipeline("for acceptURL=\".*\\.css\"\nYUICompress\nJSCSSMerge\n");

    let response = pipeline.handle(get("/css/a.css").with_query("debug"));

    assert_eq!(body_text(&response), "a  {\n  color : red ;\n}\n");
}

#[test]
fn test_reload_swaps_rules_atomically() {
    let site = site();
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "for acceptURL=\".*\\.css\"\nJSCSSMerge\n").unwrap();
    file.flush().unwrap();

    let pipeline = site.pipeline("for acceptURL=\".*\\.js\"\nJSCSSMerge\n");
    assert_eq!(pipeline.handle(get("/css/a,b.css")).status(), StatusCode::NOT_FOUND);

    let manager = ReloadManager::new(Some(file.path().to_path_buf()));
    let rules = manager.reload_rules(&ModuleRegistry::builtin()).unwrap();
    pipeline.replace_rules(rules);

    assert_eq!(pipeline.handle(get("/css/a,b.css")).status(), StatusCode::OK);
}
