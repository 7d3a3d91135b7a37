use crate::CrawlError;
use url::Url;

/// List of tracking query parameters to remove during normalization
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "msclkid"];

/// Normalizes a URL so the crawl queue can recognize duplicates
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Accept only http and https schemes with a host
/// 3. Lowercase the host (done by the parser) and drop default ports
/// 4. Collapse repeated slashes in the path; dot segments are resolved by the parser
/// 5. Remove fragment (everything after #)
/// 6. Remove tracking query parameters
/// 7. Sort remaining query parameters by key
/// 8. Remove empty query string (trailing ?)
///
/// Trailing slashes are kept: `/blog` and `/blog/` may be different resources.
///
/// # Examples
///
/// ```
/// use seo_crawler::url::normalize_url;
///
/// let url = normalize_url("https://EXAMPLE.COM//a/./b?utm_source=x&z=1&a=2#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/a/b?a=2&z=1");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, CrawlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| CrawlError::InvalidUrl {
        url: url_str.to_string(),
        reason: e.to_string(),
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(CrawlError::InvalidUrl {
            url: url_str.to_string(),
            reason: format!("unsupported scheme '{}'", url.scheme()),
        });
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(CrawlError::InvalidUrl {
            url: url_str.to_string(),
            reason: "missing host".to_string(),
        });
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(url)
}

/// Collapses empty path segments produced by repeated slashes
fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return "/".to_string();
    }

    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        return "/".to_string();
    }

    let mut result = format!("/{}", segments.join("/"));
    if path.ends_with('/') {
        result.push('/');
    }
    result
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    // Stable sort keeps repeated keys in their original relative order
    params.sort_by(|a, b| a.0.cmp(&b.0));

    params
}

/// Checks if a query parameter is a tracking parameter
fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
