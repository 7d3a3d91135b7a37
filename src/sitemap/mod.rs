//! Sitemap handling module
//!
//! Parses XML sitemaps and sitemap indexes into normalized URL lists and
//! offers filtering/grouping helpers over the result. Fetching (including the
//! recursive walk of sitemap indexes) is driven by the crawler.

mod parser;
mod query;

pub use parser::{
    normalize_priority, parse_sitemap, parse_sitemap_index, parse_urlset, ChangeFreq, Sitemap,
    SitemapUrl, DEFAULT_PRIORITY, MAX_SITEMAP_URLS,
};
pub use query::{SitemapStats, HIGH_PRIORITY, MEDIUM_PRIORITY};
