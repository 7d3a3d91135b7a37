//! Data model shared by the crawler components

use crate::robots::RobotsTxt;
use crate::sitemap::Sitemap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

/// Whether a link stays on the crawled site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkScope {
    Internal,
    External,
}

impl LinkScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
        }
    }
}

/// A hyperlink found on a page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    /// Absolute URL, fragment removed
    pub url: String,
    pub anchor_text: String,
    pub scope: LinkScope,
    /// False when the anchor or the page asks crawlers not to follow it
    pub follow: bool,
}

/// An image found on a page
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Image {
    /// Absolute URL
    pub url: String,
    pub alt: Option<String>,
    pub title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Outcome of fetching one URL
#[derive(Debug, Clone, Serialize)]
pub struct CrawlResult {
    /// The URL that was requested
    pub url: String,

    /// URL after redirects, when it differs from `url`
    pub final_url: Option<String>,

    /// HTTP status code; 0 when no response was received
    pub status_code: u16,

    /// Raw Content-Type header value
    pub content_type: String,

    /// Selected response headers, keyed by lowercase name
    pub headers: BTreeMap<String, String>,

    /// Response body, truncated at the body size cap
    pub body: String,

    pub links: Vec<Link>,
    pub images: Vec<Image>,
    pub title: Option<String>,
    pub description: Option<String>,

    pub crawled_at: DateTime<Utc>,
    pub response_time: Duration,

    /// Set when the fetch failed or the URL was not fetched by policy
    pub error: Option<String>,
}

impl CrawlResult {
    /// Creates an empty result for `url` stamped with the current time
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            final_url: None,
            status_code: 0,
            content_type: String::new(),
            headers: BTreeMap::new(),
            body: String::new(),
            links: Vec::new(),
            images: Vec::new(),
            title: None,
            description: None,
            crawled_at: Utc::now(),
            response_time: Duration::ZERO,
            error: None,
        }
    }

    /// Creates a result recording that `url` could not be crawled
    pub fn failed(url: impl Into<String>, error: impl ToString) -> Self {
        let mut result = Self::new(url);
        result.error = Some(error.to_string());
        result
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && (200..400).contains(&self.status_code)
    }

    pub fn is_html(&self) -> bool {
        let content_type = self.content_type.to_ascii_lowercase();
        content_type.contains("text/html") || content_type.contains("application/xhtml")
    }

    /// The URL links on this page are resolved against
    pub fn effective_url(&self) -> &str {
        self.final_url.as_deref().unwrap_or(&self.url)
    }

    /// Internal links that crawlers may follow
    pub fn followable_links(&self) -> impl Iterator<Item = &Link> {
        self.links
            .iter()
            .filter(|link| link.scope == LinkScope::Internal && link.follow)
    }
}

/// Running totals for a crawl
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CrawlStats {
    pub total_pages: u64,
    pub successful_pages: u64,
    pub failed_pages: u64,
    pub total_bytes: u64,
    pub average_response_time: Duration,
    pub robots_blocked: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    #[serde(skip)]
    total_response_time: Duration,
}

impl CrawlStats {
    /// Folds one page result into the totals
    pub fn record(&mut self, result: &CrawlResult) {
        self.total_pages += 1;
        if result.is_success() {
            self.successful_pages += 1;
        } else {
            self.failed_pages += 1;
        }
        self.total_bytes += result.body.len() as u64;
        self.total_response_time += result.response_time;
        self.average_response_time = Duration::from_secs_f64(
            self.total_response_time.as_secs_f64() / self.total_pages as f64,
        );
    }

    /// Share of pages that succeeded, in percent
    pub fn success_rate(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        self.successful_pages as f64 / self.total_pages as f64 * 100.0
    }
}

/// Everything one `crawl_site` run produced
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub start_url: String,
    pub domain: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration: Duration,
    /// One entry per URL taken off the queue
    pub pages: HashMap<String, CrawlResult>,
    pub robots_txt: Option<Arc<RobotsTxt>>,
    pub sitemaps: Vec<Sitemap>,
    pub stats: CrawlStats,
}

impl CrawlReport {
    /// Creates the report shell at the start of a crawl
    pub fn new(start_url: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            domain: domain.into(),
            start_time: Utc::now(),
            end_time: None,
            duration: Duration::ZERO,
            pages: HashMap::new(),
            robots_txt: None,
            sitemaps: Vec::new(),
            stats: CrawlStats::default(),
        }
    }

    /// Pages that ended with an error, sorted by URL
    pub fn failed_pages(&self) -> Vec<&CrawlResult> {
        let mut failed: Vec<&CrawlResult> = self
            .pages
            .values()
            .filter(|page| page.error.is_some())
            .collect();
        failed.sort_by(|a, b| a.url.cmp(&b.url));
        failed
    }

    /// Stamps the end time and duration
    pub fn finish(&mut self, stats: CrawlStats) {
        let end = Utc::now();
        self.duration = (end - self.start_time).to_std().unwrap_or_default();
        self.end_time = Some(end);
        self.stats = stats;
    }
}
