use url::Url;

/// Extracts the domain from a URL
///
/// This function retrieves the host portion of a URL and converts it to lowercase.
/// If the URL has no host (which shouldn't happen for valid HTTP(S) URLs), it returns None.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use seo_crawler::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Strips a leading `www.` so `www.example.com` and `example.com` compare equal
pub fn site_host(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Returns true if `url` belongs to the site whose host is `host`
///
/// Hosts are compared case-insensitively and without a leading `www.`.
/// Subdomains other than `www` count as a different site.
pub fn is_same_site(url: &Url, host: &str) -> bool {
    match extract_domain(url) {
        Some(domain) => site_host(&domain) == site_host(&host.to_lowercase()),
        None => false,
    }
}
