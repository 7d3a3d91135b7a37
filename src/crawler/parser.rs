//! HTML parser for extracting links and metadata
//!
//! This module handles parsing HTML content to extract:
//! - Links (from `<a href>` tags), classified internal/external
//! - Images (from `<img src>` tags)
//! - Page title and meta description

use crate::crawler::{Image, Link, LinkScope};
use crate::url::is_same_site;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedPage {
    /// The page title (from the first `<title>` tag)
    pub title: Option<String>,

    /// Content of `<meta name="description">`
    pub description: Option<String>,

    /// Links in document order, first occurrence of each URL only
    pub links: Vec<Link>,

    /// Images in document order, deduplicated by URL
    pub images: Vec<Image>,
}

/// Parses HTML content and extracts links, images, and metadata
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags, resolved against `base_url`, fragment removed
///
/// **Exclude:**
/// - `<a href="..." download>`
/// - `javascript:`, `mailto:`, `tel:` links
/// - Data URIs
/// - Fragment-only links
///
/// A link is not followable when its `rel` contains `nofollow` or the page
/// carries `<meta name="robots" content="nofollow">`. Links whose host equals
/// `site_host` (ignoring a leading `www.`) are internal.
///
/// # Example
///
/// ```
/// use seo_crawler::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let parsed = parse_html(html, &base_url, "example.com");
/// assert_eq!(parsed.title, Some("Test".to_string()));
/// assert_eq!(parsed.links[0].url, "https://example.com/page");
/// ```
pub fn parse_html(html: &str, base_url: &Url, site_host: &str) -> ParsedPage {
    let document = Html::parse_document(html);
    let page_nofollow = meta_content(&document, "robots")
        .map(|content| has_token(&content, "nofollow"))
        .unwrap_or(false);

    ParsedPage {
        title: extract_title(&document),
        description: meta_content(&document, "description"),
        links: extract_links(&document, base_url, site_host, page_nofollow),
        images: extract_images(&document, base_url),
    }
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

/// Returns the trimmed `content` of the first `<meta name=...>` with `name`
fn meta_content(document: &Html, name: &str) -> Option<String> {
    let selector = Selector::parse("meta[name][content]").ok()?;

    document
        .select(&selector)
        .find(|element| {
            element
                .value()
                .attr("name")
                .map(|n| n.trim().eq_ignore_ascii_case(name))
                .unwrap_or(false)
        })
        .and_then(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_links(
    document: &Html,
    base_url: &Url,
    site_host: &str,
    page_nofollow: bool,
) -> Vec<Link> {
    let Ok(a_selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&a_selector) {
        if element.value().attr("download").is_some() {
            continue;
        }

        let Some(url) = element
            .value()
            .attr("href")
            .and_then(|href| resolve_link(href, base_url))
        else {
            continue;
        };

        if !seen.insert(url.to_string()) {
            continue;
        }

        let rel_nofollow = element
            .value()
            .attr("rel")
            .map(|rel| has_token(rel, "nofollow"))
            .unwrap_or(false);

        let scope = if is_same_site(&url, site_host) {
            LinkScope::Internal
        } else {
            LinkScope::External
        };

        links.push(Link {
            url: url.to_string(),
            anchor_text: anchor_text(&element),
            scope,
            follow: !(rel_nofollow || page_nofollow),
        });
    }

    links
}

fn extract_images(document: &Html, base_url: &Url) -> Vec<Image> {
    let Ok(img_selector) = Selector::parse("img[src]") else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut images = Vec::new();

    for element in document.select(&img_selector) {
        let attrs = element.value();
        let Some(url) = attrs.attr("src").and_then(|src| resolve_link(src, base_url)) else {
            continue;
        };
        if !seen.insert(url.to_string()) {
            continue;
        }

        images.push(Image {
            url: url.to_string(),
            alt: attrs.attr("alt").map(|alt| alt.trim().to_string()),
            title: attrs
                .attr("title")
                .map(|title| title.trim().to_string())
                .filter(|s| !s.is_empty()),
            width: attrs.attr("width").and_then(parse_dimension),
            height: attrs.attr("height").and_then(parse_dimension),
        });
    }

    images
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only references
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() != "http" && absolute_url.scheme() != "https" {
        return None;
    }
    absolute_url.set_fragment(None);
    Some(absolute_url)
}

fn anchor_text(element: &ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Checks a space/comma separated attribute value for `token`
fn has_token(value: &str, token: &str) -> bool {
    value
        .split(|c: char| c.is_whitespace() || c == ',')
        .any(|part| part.eq_ignore_ascii_case(token))
}

/// Parses `"640"` or `"640px"`; anything else is ignored
fn parse_dimension(value: &str) -> Option<u32> {
    let value = value.trim();
    let digits = value.strip_suffix("px").unwrap_or(value).trim();
    digits.parse().ok()
}
