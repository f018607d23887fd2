//! Static markup audits through the auditor with the native engine.

use std::sync::Arc;
use std::time::Duration;

use wcag_audit::{AuditConfig, AuditRequest, Auditor, Impact, RuleEngine, RuleOptions};
use wcag_rules::NativeEngine;

fn auditor() -> Auditor {
    Auditor::new(
        AuditConfig::default(),
        RuleEngine::new().with_document_engine(Arc::new(NativeEngine::new())),
    )
    .unwrap()
}

fn markup(html: &str) -> AuditRequest {
    AuditRequest::for_html(html, None, RuleOptions::default()).unwrap()
}

#[tokio::test]
async fn test_image_without_alt() {
    let report = auditor()
        .execute(markup("<html><body><img></body></html>"))
        .await
        .unwrap();

    assert!(report.target.is_none());
    let image_alt = report
        .results
        .violations
        .iter()
        .find(|v| v.id == "image-alt")
        .expect("image-alt violation");
    assert_eq!(image_alt.impact, Some(Impact::Critical));
    assert_eq!(image_alt.nodes.len(), 1);
    assert!(image_alt.tags.iter().any(|t| t == "wcag2a"));
}

#[tokio::test]
async fn test_empty_document() {
    let report = auditor().execute(markup("<html></html>")).await.unwrap();

    let violated: Vec<_> = report
        .results
        .violations
        .iter()
        .map(|v| v.id.as_str())
        .collect();
    assert_eq!(violated, ["html-has-lang", "document-title"]);

    // The root is reported by tag alone.
    assert_eq!(report.results.violations[0].nodes[0].target, ["html"]);
    assert_eq!(report.results.violations[0].nodes[0].html, "<html>");
}

#[tokio::test]
async fn test_accessible_page_has_no_violations() {
    let page = r#"<!doctype html>
        <html lang="en">
        <head>
            <title>Accessible</title>
            <meta name="viewport" content="width=device-width, initial-scale=1">
        </head>
        <body>
            <h1>Welcome</h1>
            <img src="logo.png" alt="Company logo">
            <a href="/about">About us</a>
            <label for="q">Search</label><input id="q" type="search">
            <button type="submit">Go</button>
        </body>
        </html>"#;

    let report = auditor().execute(markup(page)).await.unwrap();
    assert!(report.results.violations.is_empty(), "{:?}", report.results.violations);
    assert!(report.results.passes.len() >= 6);
}

#[tokio::test]
async fn test_repeat_audits_are_identical() {
    let page = r#"<html><body>
        <img src="a.png" class="hero" data-x="1">
        <a href="/x"></a>
        <ul><li><a href="/1"></a></li><li><a href="/2">Two</a></li></ul>
        <video src="v.mp4"></video>
    </body></html>"#;

    let auditor = auditor();
    let first = auditor.execute(markup(page)).await.unwrap();
    let second = auditor.execute(markup(page)).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert!(first.results.incomplete.iter().any(|r| r.id == "video-caption"));
}

#[tokio::test]
async fn test_large_flat_document_finishes() {
    let links: String = (0..20_000).map(|i| format!("<a href='/{i}'></a>")).collect();
    let html = format!("<html lang='en'><head><title>t</title></head><body>{links}</body></html>");
    let config = AuditConfig {
        evaluation_timeout: Duration::from_secs(20),
        ..AuditConfig::default()
    };
    let auditor = Auditor::new(
        config,
        RuleEngine::new().with_document_engine(Arc::new(NativeEngine::new())),
    )
    .unwrap();

    let report = auditor.execute(markup(&html)).await.unwrap();

    let link_name = report
        .results
        .violations
        .iter()
        .find(|v| v.id == "link-name")
        .expect("link-name violation");
    assert_eq!(link_name.nodes.len(), 20_000);
    assert_eq!(
        link_name.nodes[19_999].target,
        ["html > body:nth-child(2) > a:nth-child(20000)"]
    );
}
