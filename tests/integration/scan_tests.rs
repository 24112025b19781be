//! Integration tests for the scanner
//!
//! These tests use wiremock to create mock HTTP servers and run full scans
//! end-to-end through the real HTTP transport.

use std::io::Write;
use tempfile::{tempdir, NamedTempFile};
use url::Url;
use wardscan::config::{load_config, load_config_with_hash};
use wardscan::output::generate_markdown_summary;
use wardscan::{ScanStatus, ScannerBuilder};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mounts an HTML page at `route`
async fn mount_html(server: &MockServer, route: &str, status: u16, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(
            ResponseTemplate::new(status)
                .set_body_string(body)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

fn target(server: &MockServer) -> Url {
    Url::parse(&format!("{}/", server.uri())).expect("Failed to parse mock server URI")
}

fn mapped_paths(report: &wardscan::output::ScanReport) -> Vec<(String, u16)> {
    report
        .sitemap
        .iter()
        .map(|(url, code)| (url.path().to_string(), code))
        .collect()
}

#[tokio::test]
async fn test_full_scan_single_host() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/",
        200,
        r#"<html><body>
        <a href="/page1">Page 1</a>
        <a href="/page2">Page 2</a>
        <a href="https://offsite.example/">Elsewhere</a>
        </body></html>"#,
    )
    .await;
    mount_html(&server, "/page1", 200, r#"<a href="/">Home</a>"#).await;
    mount_html(&server, "/page2", 200, r#"<a href="/page1">Again</a>"#).await;

    let mut scanner = ScannerBuilder::new(target(&server))
        .build()
        .expect("Failed to build scanner");
    let report = scanner.run().await.expect("Scan failed");

    assert_eq!(report.status, ScanStatus::Done);
    assert_eq!(report.audited_pages, 3);
    assert_eq!(
        mapped_paths(&report),
        vec![
            ("/".to_string(), 200),
            ("/page1".to_string(), 200),
            ("/page2".to_string(), 200),
        ]
    );
    assert!(report.failures.is_empty());
    assert_eq!(report.pending_urls, 0);
    assert_eq!(report.pending_pages, 0);
}

#[tokio::test]
async fn test_error_statuses_are_audited() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/",
        200,
        r#"<a href="/missing">m</a><a href="/broken">b</a>"#,
    )
    .await;
    mount_html(&server, "/missing", 404, "not found").await;
    mount_html(&server, "/broken", 500, "server error").await;

    let mut scanner = ScannerBuilder::new(target(&server))
        .build()
        .expect("Failed to build scanner");
    let report = scanner.run().await.expect("Scan failed");

    assert_eq!(report.audited_pages, 3);
    assert_eq!(report.sitemap.get(&format!("{}/missing", server.uri())), Some(404));
    assert_eq!(report.sitemap.get(&format!("{}/broken", server.uri())), Some(500));
}

#[tokio::test]
async fn test_redirects_go_through_frontier() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/landing"))
        .expect(1)
        .mount(&server)
        .await;
    mount_html(&server, "/landing", 200, "<p>welcome</p>").await;

    let mut scanner = ScannerBuilder::new(target(&server))
        .build()
        .expect("Failed to build scanner");
    let report = scanner.run().await.expect("Scan failed");

    assert_eq!(
        mapped_paths(&report),
        vec![("/".to_string(), 302), ("/landing".to_string(), 200)]
    );
}

#[tokio::test]
async fn test_unreachable_url_is_abandoned() {
    let server = MockServer::start().await;

    // Same host, closed port
    mount_html(&server, "/", 200, r#"<a href="http://127.0.0.1:1/down">down</a>"#).await;

    let mut scanner = ScannerBuilder::new(target(&server))
        .max_tries(2)
        .build()
        .expect("Failed to build scanner");
    let report = scanner.run().await.expect("Scan failed");

    assert_eq!(report.status, ScanStatus::Done);
    assert_eq!(report.audited_pages, 1);
    assert_eq!(
        report.failures,
        vec![Url::parse("http://127.0.0.1:1/down").unwrap()]
    );
}

#[tokio::test]
async fn test_page_limit_bounds_traffic() {
    let server = MockServer::start().await;

    let links: String = (1..=30)
        .map(|i| format!(r#"<a href="/p{i}">{i}</a>"#))
        .collect();
    mount_html(&server, "/", 200, &links).await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("leaf"))
        .mount(&server)
        .await;

    let mut scanner = ScannerBuilder::new(target(&server))
        .page_limit(Some(5))
        .build()
        .expect("Failed to build scanner");
    let report = scanner.run().await.expect("Scan failed");

    assert_eq!(report.audited_pages, 5);
    assert_eq!(report.sitemap.len(), 5);
}

#[tokio::test]
async fn test_scan_from_config_file() {
    let server = MockServer::start().await;

    mount_html(
        &server,
        "/",
        200,
        r#"<a href="/public">p</a><a href="/logout">l</a>"#,
    )
    .await;
    mount_html(&server, "/public", 200, "public").await;
    mount_html(&server, "/hidden", 200, "hidden").await;
    Mock::given(method("GET"))
        .and(path("/logout"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempdir().expect("Failed to create temp dir");
    let summary_path = dir.path().join("summary.md");

    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    write!(
        file,
        r#"
[scan]
url = "{}/"
max-tries = 2

[scope]
exclude = ["logout"]
extend-paths = ["/hidden"]

[output]
summary-path = "{}"
"#,
        server.uri(),
        summary_path.display()
    )
    .expect("Failed to write config");

    let (config, hash) = load_config_with_hash(file.path()).expect("Failed to load config");
    assert_eq!(
        load_config(file.path()).expect("Failed to reload config").scan.url,
        config.scan.url
    );

    let mut scanner = ScannerBuilder::from_config(&config)
        .expect("Failed to configure scanner")
        .config_hash(hash.clone())
        .build()
        .expect("Failed to build scanner");
    let report = scanner.run().await.expect("Scan failed");

    assert_eq!(report.audited_pages, 3);
    assert_eq!(report.config_hash.as_deref(), Some(hash.as_str()));

    let path = config.output.summary_path.as_deref().expect("summary path");
    generate_markdown_summary(&report, std::path::Path::new(path))
        .expect("Failed to write summary");

    let summary = std::fs::read_to_string(&summary_path).expect("Failed to read summary");
    assert!(summary.contains("# Wardscan Scan Summary"));
    assert!(summary.contains("/public"));
    assert!(!summary.contains("/logout"));
}

#[tokio::test]
async fn test_abort_before_run() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut scanner = ScannerBuilder::new(target(&server))
        .build()
        .expect("Failed to build scanner");
    scanner.control().abort();

    let report = scanner.run().await.expect("Scan failed");

    assert_eq!(report.status, ScanStatus::Aborted);
    assert_eq!(report.audited_pages, 0);
}
