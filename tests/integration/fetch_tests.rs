//! Fetcher behavior against a mock server

use crate::common::{html, test_config, USER_AGENT};
use flate2::write::GzEncoder;
use flate2::Compression;
use seo_crawler::crawler::{Fetcher, MAX_BODY_BYTES};
use seo_crawler::CrawlError;
use std::io::Write;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Span;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher() -> Fetcher {
    Fetcher::new(&test_config(), Span::none()).expect("Failed to build fetcher")
}

#[tokio::test]
async fn test_fetch_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html><title>Hi</title></html>").insert_header("etag", "\"v1\""))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/", server.uri());
    let result = fetcher()
        .fetch(&CancellationToken::new(), &url)
        .await
        .expect("Fetch failed");

    assert_eq!(result.status_code, 200);
    assert!(result.is_html());
    assert_eq!(result.body, "<html><title>Hi</title></html>");
    assert_eq!(result.headers.get("etag").map(String::as_str), Some("\"v1\""));
    assert!(result.final_url.is_none());
    assert!(result.error.is_none());
}

#[tokio::test]
async fn test_fetch_sends_fixed_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("user-agent", USER_AGENT))
        .and(header("accept-encoding", "gzip"))
        .and(header("dnt", "1"))
        .and(header("upgrade-insecure-requests", "1"))
        .respond_with(html("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/", server.uri());
    let result = fetcher().fetch(&CancellationToken::new(), &url).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_server_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let url = format!("{}/flaky", server.uri());
    let failure = fetcher()
        .fetch(&CancellationToken::new(), &url)
        .await
        .expect_err("503 should fail");

    assert!(matches!(
        failure.source,
        CrawlError::HttpStatus { status: 503, .. }
    ));
    assert_eq!(failure.result.status_code, 503);
    assert!(failure.result.error.is_some());
}

#[tokio::test]
async fn test_recovers_after_transient_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("recovered"))
        .mount(&server)
        .await;

    let url = format!("{}/", server.uri());
    let result = fetcher()
        .fetch(&CancellationToken::new(), &url)
        .await
        .expect("Second attempt should succeed");
    assert_eq!(result.body, "recovered");
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_raw(b"gone".to_vec(), "text/plain"))
        .expect(1)
        .mount(&server)
        .await;

    let url = format!("{}/missing", server.uri());
    let failure = fetcher()
        .fetch(&CancellationToken::new(), &url)
        .await
        .expect_err("404 should fail");

    assert!(!failure.source.is_retryable());
    assert_eq!(failure.result.status_code, 404);
    assert_eq!(failure.result.body, "gone");
}

#[tokio::test]
async fn test_gzip_body_is_decompressed() {
    let server = MockServer::start().await;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"<html>zipped</html>").unwrap();
    let compressed = encoder.finish().unwrap();

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(compressed, "text/html")
                .insert_header("content-encoding", "gzip"),
        )
        .mount(&server)
        .await;

    let url = format!("{}/", server.uri());
    let result = fetcher().fetch(&CancellationToken::new(), &url).await.unwrap();
    assert_eq!(result.body, "<html>zipped</html>");
}

#[tokio::test]
async fn test_large_body_is_truncated() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            vec![b'a'; MAX_BODY_BYTES + 4096],
            "text/plain",
        ))
        .mount(&server)
        .await;

    let url = format!("{}/big", server.uri());
    let result = fetcher().fetch(&CancellationToken::new(), &url).await.unwrap();
    assert_eq!(result.body.len(), MAX_BODY_BYTES);
}

#[tokio::test]
async fn test_redirect_sets_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("location", format!("{}/new", server.uri()).as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(html("moved"))
        .mount(&server)
        .await;

    let url = format!("{}/old", server.uri());
    let result = fetcher().fetch(&CancellationToken::new(), &url).await.unwrap();
    assert_eq!(result.status_code, 200);
    assert_eq!(result.final_url, Some(format!("{}/new", server.uri())));
    assert_eq!(result.effective_url(), format!("{}/new", server.uri()));
}

#[tokio::test]
async fn test_redirect_loop_hits_limit() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/loop"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", format!("{}/loop", server.uri()).as_str()),
        )
        .mount(&server)
        .await;

    let mut config = test_config();
    config.retry.attempts = 1;
    let fetcher = Fetcher::new(&config, Span::none()).unwrap();

    let url = format!("{}/loop", server.uri());
    let failure = fetcher
        .fetch(&CancellationToken::new(), &url)
        .await
        .expect_err("redirect loop should fail");
    assert!(matches!(failure.source, CrawlError::RedirectLimit { .. }));
}

#[tokio::test]
async fn test_connection_refused_is_retryable() {
    let server = MockServer::start().await;
    let url = format!("{}/", server.uri());
    drop(server);

    let failure = fetcher()
        .fetch(&CancellationToken::new(), &url)
        .await
        .expect_err("closed port should fail");
    assert!(failure.source.is_retryable());
    assert_eq!(failure.result.status_code, 0);
}

#[tokio::test]
async fn test_cancel_interrupts_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.retry.delay_ms = 10_000;
    config.retry.max_delay_ms = 10_000;
    let fetcher = Fetcher::new(&config, Span::none()).unwrap();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
    }

    let started = Instant::now();
    let url = format!("{}/", server.uri());
    let failure = fetcher.fetch(&cancel, &url).await.expect_err("should be cancelled");

    assert!(failure.is_cancelled());
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_cancel_interrupts_slow_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html("slow").set_delay(Duration::from_secs(4)))
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
    }

    let started = Instant::now();
    let url = format!("{}/", server.uri());
    let failure = fetcher().fetch(&cancel, &url).await.expect_err("should be cancelled");

    assert!(matches!(failure.source, CrawlError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}
