//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - HTML parsing and link extraction
//! - The crawl frontier queue and request rate limiting
//! - Page caching
//! - Overall crawl coordination

mod cache;
mod coordinator;
mod fetcher;
mod parser;
mod queue;
mod rate_limiter;
mod types;

pub use cache::PageCache;
pub use coordinator::{Crawler, MAX_SITEMAP_DOCUMENTS, MAX_SITEMAP_LEVELS};
pub use fetcher::{
    build_http_client, decode_body, FetchFailure, Fetcher, RetryPolicy, MAX_BODY_BYTES,
    MAX_REDIRECTS,
};
pub use parser::{parse_html, ParsedPage};
pub use queue::{CrawlQueue, QueueItem};
pub use rate_limiter::{parse_rate_limit, RateLimiter};
pub use types::{CrawlReport, CrawlResult, CrawlStats, Image, Link, LinkScope};
