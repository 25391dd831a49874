//! Integration tests for URL checks
//!
//! These tests use wiremock to create mock HTTP servers and run checks
//! end-to-end through the reqwest executor.

use flate2::write::GzEncoder;
use flate2::Compression;
use linkprobe::config::{Config, UserAgentConfig};
use linkprobe::{CheckTask, Checker, Classification, IssueKind, UrlCheck};
use std::io::Write;
use std::net::TcpListener;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const UA: &str = "TestProbe/1.0 (+https://example.com/about; admin@example.com)";

fn test_config() -> Config {
    Config {
        user_agent: UserAgentConfig {
            crawler_name: "TestProbe".to_string(),
            crawler_version: "1.0".to_string(),
            contact_url: "https://example.com/about".to_string(),
            contact_email: "admin@example.com".to_string(),
        },
        ..Config::default()
    }
}

async fn server_with_robots(robots: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(robots))
        .mount(&server)
        .await;
    server
}

/// `METHOD /path` of every request the server saw, robots.txt excluded
async fn page_requests(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() != "/robots.txt")
        .map(|r| format!("{} {}", r.method, r.url.path()))
        .collect()
}

#[tokio::test]
async fn test_valid_page_with_head() {
    let server = server_with_robots("User-agent: *\nAllow: /").await;
    Mock::given(method("HEAD"))
        .and(path("/page"))
        .and(header("user-agent", UA))
        .and(header_exists("accept-encoding"))
        .respond_with(ResponseTemplate::new(200).insert_header("content-type", "text/html"))
        .expect(1)
        .mount(&server)
        .await;

    let checker = Checker::new(test_config()).unwrap();
    let result = checker
        .check(CheckTask::new(format!("{}/page", server.uri())))
        .await
        .unwrap();

    assert_eq!(result.classification, Classification::Valid);
    assert_eq!(result.summary.as_deref(), Some("200 OK"));
    assert_eq!(page_requests(&server).await, vec!["HEAD /page"]);
}

#[tokio::test]
async fn test_robots_disallowed_page_is_not_requested() {
    let server = server_with_robots("User-agent: TestProbe\nDisallow: /private").await;

    let checker = Checker::new(test_config()).unwrap();
    let result = checker
        .check(CheckTask::new(format!("{}/private/data", server.uri())))
        .await
        .unwrap();

    assert_eq!(result.classification, Classification::Warning);
    assert_eq!(result.issue, Some(IssueKind::PolicyDenied));
    assert!(page_requests(&server).await.is_empty());
}

#[tokio::test]
async fn test_permanent_redirect_followed() {
    let server = server_with_robots("").await;
    Mock::given(method("HEAD"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/new/"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/new/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let checker = Checker::new(test_config()).unwrap();
    let mut session = checker
        .session(CheckTask::new(format!("{}/old", server.uri())))
        .unwrap();
    let result = session.check().await.unwrap();

    assert_eq!(result.classification, Classification::Valid);
    assert_eq!(result.url, format!("{}/new/", server.uri()));
    assert!(result
        .warnings
        .iter()
        .any(|w| w.starts_with("HTTP 301 (moved permanent)")));
    assert!(session
        .cache_keys()
        .contains(&format!("{}/new/", server.uri())));
}

#[tokio::test]
async fn test_not_found_checked_with_head_then_get() {
    let server = server_with_robots("").await;
    Mock::given(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let checker = Checker::new(test_config()).unwrap();
    let result = checker
        .check(CheckTask::new(format!("{}/missing", server.uri())))
        .await
        .unwrap();

    assert_eq!(result.classification, Classification::Error);
    assert_eq!(result.issue, Some(IssueKind::HttpStatus { code: 404 }));
    assert_eq!(result.summary.as_deref(), Some("404 Not Found"));
    assert_eq!(
        page_requests(&server).await,
        vec!["HEAD /missing", "GET /missing"]
    );
}

#[tokio::test]
async fn test_referer_sent_for_parent() {
    let server = server_with_robots("").await;
    Mock::given(method("HEAD"))
        .and(path("/linked"))
        .and(header("referer", "http://origin.example/index.html"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let checker = Checker::new(test_config()).unwrap();
    let result = checker
        .check(
            CheckTask::new(format!("{}/linked", server.uri()))
                .with_parent("http://origin.example/index.html"),
        )
        .await
        .unwrap();
    assert!(result.is_valid());
}

#[tokio::test]
async fn test_gzip_content_decoded() {
    let server = server_with_robots("").await;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"body { color: red }").unwrap();
    let gzipped = encoder.finish().unwrap();

    Mock::given(method("HEAD"))
        .and(path("/style.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/css")
                .insert_header("content-encoding", "gzip"),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/style.css"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/css")
                .insert_header("content-encoding", "gzip")
                .set_body_bytes(gzipped),
        )
        .expect(1)
        .mount(&server)
        .await;

    let checker = Checker::new(test_config()).unwrap();
    let mut session = checker
        .session(CheckTask::new(format!("{}/style.css", server.uri())))
        .unwrap();
    session.check().await.unwrap();
    assert!(session.is_parseable());

    let body = session.content().await.unwrap();
    assert_eq!(&body[..], b"body { color: red }");
    let again = session.content().await.unwrap();
    assert_eq!(body, again);
}

#[tokio::test]
async fn test_connection_refused_is_error() {
    // Mock servers are pooled and keep listening; free a port directly
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let checker = Checker::new(test_config()).unwrap();
    let outcome = checker
        .check(CheckTask::new(format!("http://127.0.0.1:{}/gone", port)))
        .await;
    assert!(matches!(
        outcome,
        Err(linkprobe::CheckError::Connection { .. })
    ));
}
