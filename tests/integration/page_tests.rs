//! Single-page crawls: cache, robots policy, and HTML extraction

use crate::common::{html, mount_page, mount_robots, test_config};
use seo_crawler::{CrawlError, Crawler, LinkScope};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_robots_blocks_private_pages() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /private\n").await;
    mount_page(&server, "/public", "<html><title>Public</title></html>").await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(html("secret"))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config()).unwrap();
    let cancel = CancellationToken::new();

    let blocked = crawler
        .crawl_page(&cancel, &format!("{}/private/page", server.uri()))
        .await
        .unwrap();
    assert!(blocked.error.is_some());
    assert!(!blocked.is_success());
    assert_eq!(crawler.stats().robots_blocked, 1);

    let allowed = crawler
        .crawl_page(&cancel, &format!("{}/public", server.uri()))
        .await
        .unwrap();
    assert!(allowed.error.is_none());
    assert_eq!(allowed.title.as_deref(), Some("Public"));

    let stats = crawler.stats();
    assert_eq!(stats.robots_blocked, 1);
    assert_eq!(stats.total_pages, 2);
    assert_eq!(stats.successful_pages, 1);
    assert_eq!(stats.failed_pages, 1);
}

#[tokio::test]
async fn test_robots_txt_fetched_once_per_origin() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"User-agent: *\nAllow: /\n".to_vec(), "text/plain"))
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, "/a", "a").await;
    mount_page(&server, "/b", "b").await;

    let crawler = Crawler::new(test_config()).unwrap();
    let cancel = CancellationToken::new();
    for route in ["/a", "/b"] {
        let result = crawler
            .crawl_page(&cancel, &format!("{}{}", server.uri(), route))
            .await
            .unwrap();
        assert!(result.is_success());
    }
}

#[tokio::test]
async fn test_repeated_page_hits_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html><title>Cached</title></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config()).unwrap();
    let cancel = CancellationToken::new();
    let url = format!("{}/", server.uri());

    let first = crawler.crawl_page(&cancel, &url).await.unwrap();
    let second = crawler.crawl_page(&cancel, &url).await.unwrap();

    assert_eq!(first.title, second.title);
    let stats = crawler.stats();
    assert_eq!(stats.cache_hits, 1);
    assert_eq!(stats.cache_misses, 1);
}

#[tokio::test]
async fn test_cache_disabled_fetches_every_time() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html></html>"))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.cache.enabled = false;
    let crawler = Crawler::new(config).unwrap();
    let cancel = CancellationToken::new();
    let url = format!("{}/", server.uri());

    crawler.crawl_page(&cancel, &url).await.unwrap();
    crawler.crawl_page(&cancel, &url).await.unwrap();

    assert_eq!(crawler.stats().cache_hits, 0);
}

#[tokio::test]
async fn test_failed_pages_are_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config()).unwrap();
    let cancel = CancellationToken::new();
    let url = format!("{}/missing", server.uri());

    for _ in 0..2 {
        let result = crawler.crawl_page(&cancel, &url).await.unwrap();
        assert_eq!(result.status_code, 404);
        assert!(result.error.is_some());
    }
    assert_eq!(crawler.stats().failed_pages, 2);
}

#[tokio::test]
async fn test_page_metadata_is_extracted() {
    let server = MockServer::start().await;
    let body = format!(
        r#"<html>
        <head>
            <title>Products</title>
            <meta name="description" content="All our products">
        </head>
        <body>
            <a href="/item/1">Item 1</a>
            <a href="{}/item/2" rel="nofollow">Item 2</a>
            <a href="https://partner.example.org/">Partner</a>
            <img src="/img/1.png" alt="One" width="64" height="64">
        </body>
        </html>"#,
        server.uri()
    );
    mount_page(&server, "/products", body).await;

    let crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl_page(&CancellationToken::new(), &format!("{}/products", server.uri()))
        .await
        .unwrap();

    assert_eq!(result.title.as_deref(), Some("Products"));
    assert_eq!(result.description.as_deref(), Some("All our products"));
    assert_eq!(result.links.len(), 3);
    assert_eq!(result.links[0].url, format!("{}/item/1", server.uri()));
    assert_eq!(result.links[0].scope, LinkScope::Internal);
    assert!(!result.links[1].follow);
    assert_eq!(result.links[2].scope, LinkScope::External);
    assert_eq!(result.followable_links().count(), 1);

    assert_eq!(result.images.len(), 1);
    assert_eq!(result.images[0].url, format!("{}/img/1.png", server.uri()));
    assert_eq!(result.images[0].width, Some(64));
}

#[tokio::test]
async fn test_non_html_is_not_parsed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/data.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(br#"{"href": "<a href='/x'>x</a>"}"#.to_vec(), "application/json"),
        )
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl_page(&CancellationToken::new(), &format!("{}/data.json", server.uri()))
        .await
        .unwrap();

    assert!(result.is_success());
    assert!(result.links.is_empty());
    assert_eq!(result.content_type, "application/json");
}

#[tokio::test]
async fn test_invalid_url_is_an_error() {
    let crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl_page(&CancellationToken::new(), "mailto:someone@example.com")
        .await;
    assert!(matches!(result, Err(CrawlError::InvalidUrl { .. })));
    assert_eq!(crawler.stats().total_pages, 0);
}
