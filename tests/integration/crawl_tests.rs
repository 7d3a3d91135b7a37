//! Full site crawls against a mock server

use crate::common::{html, mount_page, mount_robots, mount_xml, test_config};
use seo_crawler::{CrawlError, Crawler};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn urlset(locs: &[String]) -> String {
    let entries: String = locs
        .iter()
        .map(|loc| format!("<url><loc>{}</loc><priority>0.7</priority></url>", loc))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{}</urlset>"#,
        entries
    )
}

#[tokio::test]
async fn test_full_crawl_single_domain() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_page(
        &server,
        "/",
        format!(
            r#"<html><head><title>Home</title></head><body>
            <a href="{base}/page1">Page 1</a>
            <a href="/page2">Page 2</a>
            <a href="https://external.example.org/">Elsewhere</a>
            </body></html>"#
        ),
    )
    .await;
    mount_page(&server, "/page1", "<html><title>Page 1</title></html>").await;
    mount_page(&server, "/page2", "<html><title>Page 2</title></html>").await;

    let crawler = Crawler::new(test_config()).unwrap();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .expect("Crawl failed");

    assert_eq!(report.pages.len(), 3);
    assert!(report.pages.contains_key(&format!("{base}/page1")));
    assert!(report.pages.contains_key(&format!("{base}/page2")));
    assert!(!report.pages.keys().any(|url| url.contains("external.example.org")));

    let home = &report.pages[&format!("{base}/")];
    assert_eq!(home.title.as_deref(), Some("Home"));
    assert_eq!(home.followable_links().count(), 2);

    assert_eq!(report.stats.total_pages, 3);
    assert_eq!(report.stats.successful_pages, 3);
    assert_eq!(report.stats.failed_pages, 0);
    assert!(report.end_time.is_some());
    assert_eq!(crawler.stats(), report.stats);
}

#[tokio::test]
async fn test_failed_pages_are_reported() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", r#"<a href="/gone">Gone</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config()).unwrap();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .unwrap();

    let gone = &report.pages[&format!("{base}/gone")];
    assert_eq!(gone.status_code, 404);
    assert!(gone.error.is_some());
    assert_eq!(report.stats.failed_pages, 1);
    assert_eq!(report.failed_pages().len(), 1);
}

#[tokio::test]
async fn test_crawl_respects_max_depth() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", r#"<a href="/a">A</a>"#).await;
    mount_page(&server, "/a", r#"<a href="/b">B</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html(r#"<a href="/c">C</a>"#))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.crawler.max_depth = 1;
    let crawler = Crawler::new(config).unwrap();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .unwrap();

    let mut urls: Vec<&String> = report.pages.keys().collect();
    urls.sort();
    assert_eq!(urls, vec![&format!("{base}/"), &format!("{base}/a")]);
}

#[tokio::test]
async fn test_crawl_respects_max_pages() {
    let server = MockServer::start().await;
    let base = server.uri();
    let links: String = (1..=8)
        .map(|i| format!(r#"<a href="/p{i}">P{i}</a>"#))
        .collect();
    mount_page(&server, "/", links).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p[0-9]+$"))
        .respond_with(html("<html></html>"))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.crawler.max_pages = 3;
    let crawler = Crawler::new(config).unwrap();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .unwrap();

    assert_eq!(report.pages.len(), 3);
    assert_eq!(report.stats.total_pages, 3);
}

#[tokio::test]
async fn test_duplicate_links_fetched_once() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(
        &server,
        "/",
        r#"<a href="/shared">1</a><a href="/other">2</a><a href="/shared?utm_source=x">3</a>"#,
    )
    .await;
    mount_page(&server, "/other", r#"<a href="/shared#top">back</a><a href="/">home</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/shared"))
        .respond_with(html("<html></html>"))
        .expect(1)
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config()).unwrap();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .unwrap();

    assert_eq!(report.pages.len(), 3);
}

#[tokio::test]
async fn test_nofollow_links_not_crawled() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", r#"<a href="/hidden" rel="nofollow">Hidden</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/hidden"))
        .respond_with(html("<html></html>"))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config()).unwrap();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .unwrap();
    assert_eq!(report.pages.len(), 1);
}

#[tokio::test]
async fn test_robots_blocks_pages_during_crawl() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, "User-agent: *\nDisallow: /private\n").await;
    mount_page(
        &server,
        "/",
        r#"<a href="/private/page">Private</a><a href="/public">Public</a>"#,
    )
    .await;
    mount_page(&server, "/public", "<html></html>").await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(html("secret"))
        .expect(0)
        .mount(&server)
        .await;

    let crawler = Crawler::new(test_config()).unwrap();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .unwrap();

    assert!(report.robots_txt.is_some());
    let private = &report.pages[&format!("{base}/private/page")];
    assert!(private.error.is_some());
    assert!(report.pages[&format!("{base}/public")].is_success());
    assert_eq!(report.stats.robots_blocked, 1);
}

#[tokio::test]
async fn test_sitemap_urls_seed_the_queue() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", "<html><title>No links</title></html>").await;
    mount_page(&server, "/orphan", "<html><title>Orphan</title></html>").await;
    mount_xml(
        &server,
        "/sitemap.xml",
        urlset(&[
            format!("{base}/"),
            format!("{base}/orphan"),
            "https://elsewhere.example.org/page".to_string(),
        ]),
    )
    .await;

    let mut config = test_config();
    config.crawler.follow_sitemaps = true;
    let crawler = Crawler::new(config).unwrap();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .unwrap();

    assert_eq!(report.sitemaps.len(), 1);
    assert_eq!(report.sitemaps[0].urls.len(), 3);
    assert_eq!(report.pages.len(), 2);
    assert_eq!(
        report.pages[&format!("{base}/orphan")].title.as_deref(),
        Some("Orphan")
    );
}

#[tokio::test]
async fn test_sitemap_index_from_robots_is_followed() {
    let server = MockServer::start().await;
    let base = server.uri();

    mount_robots(
        &server,
        &format!("User-agent: *\nAllow: /\nSitemap: {base}/sitemap_index.xml\n"),
    )
    .await;
    mount_xml(
        &server,
        "/sitemap_index.xml",
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
            <sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
              <sitemap><loc>{base}/sitemap-a.xml</loc></sitemap>
              <sitemap><loc>{base}/sitemap-b.xml</loc></sitemap>
            </sitemapindex>"#
        ),
    )
    .await;
    mount_xml(
        &server,
        "/sitemap-a.xml",
        urlset(&(1..=3).map(|i| format!("{base}/p{i}")).collect::<Vec<_>>()),
    )
    .await;
    mount_xml(
        &server,
        "/sitemap-b.xml",
        urlset(&(4..=6).map(|i| format!("{base}/p{i}")).collect::<Vec<_>>()),
    )
    .await;
    mount_page(&server, "/", "<html></html>").await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/p[0-9]$"))
        .respond_with(html("<html></html>"))
        .expect(6)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.crawler.follow_sitemaps = true;
    let crawler = Crawler::new(config).unwrap();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .unwrap();

    let index = report
        .sitemaps
        .iter()
        .find(|sitemap| sitemap.is_index)
        .expect("index should be recorded");
    assert_eq!(index.urls.len(), 2);
    assert_eq!(report.sitemaps.len(), 3);
    assert_eq!(report.pages.len(), 7);
}

#[tokio::test]
async fn test_crawl_with_everything_disabled() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"User-agent: *\nDisallow: /\n".to_vec(), "text/plain"))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/sitemap.xml"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, "/", r#"<a href="/next">Next</a>"#).await;
    mount_page(&server, "/next", "<html></html>").await;

    let mut config = test_config();
    config.crawler.rate_limit = String::new();
    config.crawler.respect_robots = false;
    config.crawler.follow_sitemaps = false;
    config.cache.enabled = false;
    let crawler = Crawler::new(config).unwrap();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .unwrap();

    assert_eq!(report.pages.len(), 2);
    assert!(report.robots_txt.is_none());
    assert!(report.sitemaps.is_empty());
    assert_eq!(report.stats.cache_hits + report.stats.cache_misses, 0);
}

#[tokio::test]
async fn test_stats_reset_between_crawls() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", r#"<a href="/a">A</a>"#).await;
    mount_page(&server, "/a", "<html></html>").await;

    let crawler = Crawler::new(test_config()).unwrap();
    let cancel = CancellationToken::new();
    let start = format!("{base}/");

    let first = crawler.crawl_site(&cancel, &start).await.unwrap();
    assert_eq!(first.stats.total_pages, 2);
    assert_eq!(first.stats.cache_hits, 0);

    let second = crawler.crawl_site(&cancel, &start).await.unwrap();
    assert_eq!(second.stats.total_pages, 2);
    assert_eq!(second.stats.cache_hits, 2);
    assert_eq!(second.pages.len(), 2);
}

#[tokio::test]
async fn test_rate_limit_spaces_requests() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_page(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#).await;
    mount_page(&server, "/a", "<html></html>").await;
    mount_page(&server, "/b", "<html></html>").await;

    let mut config = test_config();
    config.crawler.rate_limit = "10/s".to_string();
    config.crawler.respect_robots = false;
    let crawler = Crawler::new(config).unwrap();

    let started = std::time::Instant::now();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .unwrap();

    assert_eq!(report.pages.len(), 3);
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[tokio::test]
async fn test_robots_crawl_delay_spaces_requests() {
    let server = MockServer::start().await;
    let base = server.uri();
    mount_robots(&server, "User-agent: *\nCrawl-delay: 0.2\nDisallow: /private\n").await;
    mount_page(&server, "/", r#"<a href="/a">A</a><a href="/b">B</a>"#).await;
    mount_page(&server, "/a", "<html></html>").await;
    mount_page(&server, "/b", "<html></html>").await;

    let crawler = Crawler::new(test_config()).unwrap();
    assert!(crawler.config().crawler.rate_limit.is_empty());

    let started = std::time::Instant::now();
    let report = crawler
        .crawl_site(&CancellationToken::new(), &format!("{base}/"))
        .await
        .unwrap();

    assert_eq!(report.pages.len(), 3);
    let delay = report
        .robots_txt
        .as_ref()
        .and_then(|robots| robots.crawl_delay("TestBot"))
        .expect("crawl-delay should be parsed");
    assert!((delay.as_secs_f64() - 0.2).abs() < 1e-6);
    assert!(started.elapsed() >= Duration::from_millis(400));
}

#[tokio::test]
async fn test_cancelled_crawl_returns_error() {
    let server = MockServer::start().await;
    let base = server.uri();
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html("<html></html>").set_delay(Duration::from_secs(4)))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.crawler.respect_robots = false;
    let crawler = Crawler::new(config).unwrap();
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        });
    }

    let started = std::time::Instant::now();
    let result = crawler.crawl_site(&cancel, &format!("{base}/")).await;

    assert!(matches!(result, Err(CrawlError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_invalid_start_url_fails() {
    let crawler = Crawler::new(test_config()).unwrap();
    let result = crawler
        .crawl_site(&CancellationToken::new(), "ftp://example.com/")
        .await;
    assert!(matches!(result, Err(CrawlError::InvalidUrl { .. })));
}
