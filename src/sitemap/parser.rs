//! XML sitemap parser
//!
//! Handles both `<urlset>` documents and `<sitemapindex>` documents. An index
//! is returned as a [`Sitemap`] whose entries are the child sitemap
//! locations; callers fetch and parse each child themselves.

use crate::CrawlError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum number of entries in one sitemap, per the sitemaps.org protocol
pub const MAX_SITEMAP_URLS: usize = 50_000;

/// Priority used when an entry carries none
pub const DEFAULT_PRIORITY: f64 = 0.5;

/// How often a page is expected to change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeFreq {
    Always,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
    Never,
}

impl ChangeFreq {
    /// Every variant in protocol order
    pub const ALL: [ChangeFreq; 7] = [
        ChangeFreq::Always,
        ChangeFreq::Hourly,
        ChangeFreq::Daily,
        ChangeFreq::Weekly,
        ChangeFreq::Monthly,
        ChangeFreq::Yearly,
        ChangeFreq::Never,
    ];

    /// Normalizes a raw `<changefreq>` value
    ///
    /// Matching is case-insensitive and ignores surrounding whitespace.
    /// Unrecognized values map to `Weekly`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "always" => Self::Always,
            "hourly" => Self::Hourly,
            "daily" => Self::Daily,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "yearly" => Self::Yearly,
            "never" => Self::Never,
            _ => Self::Weekly,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Always => "always",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
            Self::Never => "never",
        }
    }
}

impl Default for ChangeFreq {
    fn default() -> Self {
        Self::Weekly
    }
}

impl fmt::Display for ChangeFreq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `<url>` (or `<sitemap>` for an index) entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SitemapUrl {
    pub loc: String,
    pub lastmod: Option<String>,
    pub changefreq: ChangeFreq,
    /// Always within `[0, 1]`
    pub priority: f64,
}

impl SitemapUrl {
    /// Parses `lastmod` into a UTC timestamp
    ///
    /// Formats tried in order: RFC 3339, minute-precision W3C datetime with
    /// offset, second-precision datetime without offset (taken as UTC), and a
    /// plain date (midnight UTC).
    pub fn last_modified(&self) -> Result<DateTime<Utc>, CrawlError> {
        let raw = self
            .lastmod
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CrawlError::Sitemap(format!("no lastmod for {}", self.loc)))?;

        parse_lastmod(raw)
            .ok_or_else(|| CrawlError::Sitemap(format!("unrecognized lastmod '{}'", raw)))
    }
}

fn parse_lastmod(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }
    None
}

/// A parsed sitemap document
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Sitemap {
    /// Where the document was fetched from, when known
    pub source: Option<String>,

    /// True if the document was a `<sitemapindex>`; `urls` then point at
    /// child sitemaps rather than pages
    pub is_index: bool,

    pub urls: Vec<SitemapUrl>,
}

#[derive(Debug, Deserialize)]
struct RawUrlSet {
    #[serde(rename = "url", default)]
    urls: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawSitemapIndex {
    #[serde(rename = "sitemap", default)]
    sitemaps: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    loc: String,
    lastmod: Option<String>,
    changefreq: Option<String>,
    priority: Option<String>,
}

impl RawEntry {
    fn normalize(self) -> Option<SitemapUrl> {
        let loc = self.loc.trim().to_string();
        if loc.is_empty() {
            return None;
        }
        Some(SitemapUrl {
            loc,
            lastmod: self
                .lastmod
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            changefreq: self
                .changefreq
                .as_deref()
                .map(ChangeFreq::normalize)
                .unwrap_or_default(),
            priority: normalize_priority(self.priority.as_deref()),
        })
    }
}

/// Normalizes a raw `<priority>` value
///
/// Missing, unparseable, or zero priorities become 0.5; anything else is
/// clamped into `[0, 1]`.
pub fn normalize_priority(raw: Option<&str>) -> f64 {
    match raw.and_then(|s| s.trim().parse::<f64>().ok()) {
        Some(p) if p.is_nan() || p == 0.0 => DEFAULT_PRIORITY,
        Some(p) => p.clamp(0.0, 1.0),
        None => DEFAULT_PRIORITY,
    }
}

/// Returns the local name of the document's root element
fn root_element(xml: &str) -> Result<String, CrawlError> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Ok(String::from_utf8_lossy(e.local_name().as_ref()).into_owned());
            }
            Ok(Event::Eof) => {
                return Err(CrawlError::Sitemap("document has no root element".to_string()))
            }
            Ok(_) => {}
            Err(e) => return Err(CrawlError::Sitemap(format!("malformed XML: {}", e))),
        }
    }
}

/// Parses a sitemap or sitemap index document
///
/// # Example
///
/// ```
/// use seo_crawler::sitemap::{parse_sitemap, ChangeFreq};
///
/// let xml = r#"<?xml version="1.0"?>
/// <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
///   <url><loc>https://example.com/</loc><priority>1.5</priority><changefreq>biweekly</changefreq></url>
/// </urlset>"#;
/// let sitemap = parse_sitemap(xml).unwrap();
/// assert_eq!(sitemap.urls[0].priority, 1.0);
/// assert_eq!(sitemap.urls[0].changefreq, ChangeFreq::Weekly);
/// ```
pub fn parse_sitemap(xml: &str) -> Result<Sitemap, CrawlError> {
    match root_element(xml)?.as_str() {
        "sitemapindex" => parse_sitemap_index(xml),
        "urlset" => parse_urlset(xml),
        other => Err(CrawlError::Sitemap(format!(
            "unexpected root element <{}>",
            other
        ))),
    }
}

/// Parses a `<urlset>` document
pub fn parse_urlset(xml: &str) -> Result<Sitemap, CrawlError> {
    let raw: RawUrlSet = quick_xml::de::from_str(xml)
        .map_err(|e| CrawlError::Sitemap(format!("invalid urlset: {}", e)))?;

    Ok(Sitemap {
        source: None,
        is_index: false,
        urls: collect_entries(raw.urls),
    })
}

/// Parses a `<sitemapindex>` document into the list of child sitemap locations
pub fn parse_sitemap_index(xml: &str) -> Result<Sitemap, CrawlError> {
    let raw: RawSitemapIndex = quick_xml::de::from_str(xml)
        .map_err(|e| CrawlError::Sitemap(format!("invalid sitemapindex: {}", e)))?;

    Ok(Sitemap {
        source: None,
        is_index: true,
        urls: collect_entries(raw.sitemaps),
    })
}

fn collect_entries(raw: Vec<RawEntry>) -> Vec<SitemapUrl> {
    let mut urls = Vec::with_capacity(raw.len().min(MAX_SITEMAP_URLS));
    for entry in raw {
        if urls.len() >= MAX_SITEMAP_URLS {
            break;
        }
        if let Some(url) = entry.normalize() {
            urls.push(url);
        }
    }
    urls
}
