//! URL handling module
//!
//! This module provides URL normalization, host extraction, and the
//! internal/external classification used when harvesting links.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{extract_domain, is_same_site, site_host};
pub use normalize::normalize_url;

use url::Url;

/// Returns the `scheme://host[:port]` origin of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_crawler::url::origin_of;
///
/// let url = Url::parse("https://example.com:8443/a/b?c=d").unwrap();
/// assert_eq!(origin_of(&url), Some("https://example.com:8443".to_string()));
/// ```
pub fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}

/// Builds the robots.txt location for the origin of `url`
pub fn robots_url(url: &Url) -> Option<String> {
    origin_of(url).map(|origin| format!("{}/robots.txt", origin))
}

/// Builds the conventional `/sitemap.xml` location for the origin of `url`
pub fn default_sitemap_url(url: &Url) -> Option<String> {
    origin_of(url).map(|origin| format!("{}/sitemap.xml", origin))
}
