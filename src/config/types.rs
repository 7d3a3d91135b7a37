use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for the crawler
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub retry: RetryConfig,
    pub cache: CacheConfig,
    pub output: Option<OutputConfig>,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// User-Agent header sent with every request and matched against robots.txt
    pub user_agent: String,

    /// Number of parallel fetch workers
    pub workers: u32,

    /// Request budget, e.g. "5/s" or "120/m". Empty disables throttling.
    pub rate_limit: String,

    /// Maximum link depth from the start URL
    pub max_depth: u32,

    /// Maximum number of pages admitted to the crawl queue
    pub max_pages: u32,

    /// Overall per-request timeout (seconds)
    pub timeout_secs: u64,

    /// Whether robots.txt is fetched and enforced
    pub respect_robots: bool,

    /// Whether sitemaps are discovered and used to seed the queue
    pub follow_sitemaps: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("SeoCrawler/{}", env!("CARGO_PKG_VERSION")),
            workers: 4,
            rate_limit: "5/s".to_string(),
            max_depth: 3,
            max_pages: 500,
            timeout_secs: 30,
            respect_robots: true,
            follow_sitemaps: true,
        }
    }
}

impl CrawlerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry and backoff configuration for page fetches
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total number of GET attempts per URL (including the first)
    pub attempts: u32,

    /// Delay before the first retry (milliseconds)
    pub delay_ms: u64,

    /// Factor applied to the delay after every retry
    pub multiplier: f64,

    /// Upper bound for any single retry delay (milliseconds)
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 1000,
            multiplier: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/// Page and robots.txt cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Whether fetched pages are cached
    pub enabled: bool,

    /// How long a cached page stays fresh (seconds)
    pub duration_secs: u64,

    /// How long a parsed robots.txt stays fresh (seconds)
    pub robots_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            duration_secs: 900,
            robots_ttl_secs: 24 * 60 * 60,
        }
    }
}

impl CacheConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    pub fn robots_ttl(&self) -> Duration {
        Duration::from_secs(self.robots_ttl_secs)
    }
}

/// Report output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database the report is written to
    pub database_path: Option<String>,

    /// Path to the markdown summary file
    pub summary_path: Option<String>,
}
