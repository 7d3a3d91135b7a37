//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the crawl state machine that coordinates all aspects
//! of a site crawl:
//! - Validating the start URL
//! - Fetching robots.txt and discovering sitemaps
//! - Seeding the frontier queue
//! - Driving the worker pool and collecting results
//! - Aggregating statistics into the final report

use crate::config::{validate, Config};
use crate::crawler::parser::parse_html;
use crate::crawler::{
    CrawlQueue, CrawlReport, CrawlResult, CrawlStats, Fetcher, PageCache, QueueItem, RateLimiter,
};
use crate::robots::{parse_robots_txt, RobotsCache, RobotsTxt, DEFAULT_SWEEP_INTERVAL};
use crate::sitemap::{parse_sitemap, Sitemap};
use crate::url::{
    default_sitemap_url, extract_domain, is_same_site, normalize_url, origin_of, robots_url,
};
use crate::CrawlError;
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use url::Url;

/// Nesting levels of sitemap indexes that are followed
pub const MAX_SITEMAP_LEVELS: u32 = 3;

/// Maximum number of sitemap documents fetched per crawl
pub const MAX_SITEMAP_DOCUMENTS: usize = 50;

/// Pages between two progress log lines
const PROGRESS_INTERVAL: usize = 10;

/// Per-crawl settings shared by the workers
#[derive(Debug)]
struct CrawlScope {
    /// Host that counts as internal
    host: String,
    limiter: Option<Arc<RateLimiter>>,
}

#[derive(Debug)]
struct Inner {
    config: Config,
    fetcher: Fetcher,
    limiter: Option<Arc<RateLimiter>>,
    page_cache: Option<PageCache>,
    robots_cache: Arc<RobotsCache>,
    stats: Mutex<CrawlStats>,
    span: Span,
    shutdown: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Site crawler
///
/// Cheap to clone; clones share caches, statistics, and the rate limiter.
#[derive(Debug, Clone)]
pub struct Crawler {
    inner: Arc<Inner>,
}

impl Crawler {
    /// Creates a crawler logging under a new `crawler` span
    ///
    /// # Returns
    ///
    /// * `Ok(Crawler)` - Configuration is valid
    /// * `Err(CrawlError::Config)` - Validation failed (e.g. bad rate limit)
    pub fn new(config: Config) -> Result<Self, CrawlError> {
        Self::with_span(config, tracing::info_span!("crawler"))
    }

    /// Creates a crawler whose events are emitted under `span`
    pub fn with_span(config: Config, span: Span) -> Result<Self, CrawlError> {
        validate(&config)?;

        let limiter = RateLimiter::parse(&config.crawler.rate_limit)?.map(Arc::new);
        let fetcher = Fetcher::new(&config, tracing::debug_span!(parent: &span, "fetcher"))?;
        let page_cache = config
            .cache
            .enabled
            .then(|| PageCache::new(config.cache.duration()));
        let robots_cache = Arc::new(RobotsCache::new(
            config.cache.robots_ttl(),
            tracing::debug_span!(parent: &span, "robots_cache"),
        ));

        let shutdown = CancellationToken::new();
        if tokio::runtime::Handle::try_current().is_ok() {
            robots_cache.spawn_sweeper(DEFAULT_SWEEP_INTERVAL, shutdown.clone());
        }

        tracing::debug!(
            parent: &span,
            user_agent = %config.crawler.user_agent,
            workers = config.crawler.workers,
            rate_limit = %config.crawler.rate_limit,
            cache = config.cache.enabled,
            "crawler initialized"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                fetcher,
                limiter,
                page_cache,
                robots_cache,
                stats: Mutex::new(CrawlStats::default()),
                span,
                shutdown,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Snapshot of the statistics of the current (or last) crawl
    pub fn stats(&self) -> CrawlStats {
        self.inner
            .stats
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Crawls a whole site starting at `start_url`
    ///
    /// # Stages
    ///
    /// 1. Validate the start URL, reset statistics, and evict expired cached pages
    /// 2. Fetch robots.txt (when respected); failures leave the crawl unrestricted
    /// 3. Discover sitemaps (when followed); failures are logged and skipped
    /// 4. Seed the queue with the start URL and internal sitemap URLs
    /// 5. Drain the queue with the worker pool
    /// 6. Stamp duration and statistics on the report
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The queue was exhausted or the page budget reached
    /// * `Err(CrawlError::Cancelled)` - `cancel` fired before the crawl finished
    /// * `Err(CrawlError::InvalidUrl)` - The start URL is not crawlable
    pub async fn crawl_site(
        &self,
        cancel: &CancellationToken,
        start_url: &str,
    ) -> Result<CrawlReport, CrawlError> {
        let span = &self.inner.span;
        let crawler_config = &self.inner.config.crawler;

        // Init
        let start = normalize_url(start_url)?;
        let domain = extract_domain(&start).ok_or_else(|| CrawlError::InvalidUrl {
            url: start_url.to_string(),
            reason: "URL has no host".to_string(),
        })?;
        self.reset_stats();
        self.purge_page_cache();
        let mut report = CrawlReport::new(start.as_str(), domain.as_str());
        tracing::info!(parent: span, start_url = %start, "starting crawl");

        if cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }

        // RobotsFetch
        let mut limiter = self.inner.limiter.clone();
        if crawler_config.respect_robots {
            let robots = self.robots_for(cancel, &start, limiter.as_deref()).await?;
            if let Some(delay) = robots.crawl_delay(&crawler_config.user_agent) {
                tracing::info!(parent: span, ?delay, "honoring robots.txt crawl-delay");
                let slowed = match &limiter {
                    Some(limiter) => limiter.with_min_interval(delay),
                    None => RateLimiter::from_interval(delay),
                };
                limiter = Some(Arc::new(slowed));
            }
            report.robots_txt = Some(robots);
        }

        let scope = Arc::new(CrawlScope {
            host: domain.clone(),
            limiter,
        });

        // SitemapDiscovery
        if crawler_config.follow_sitemaps {
            report.sitemaps = self
                .discover_sitemaps(cancel, &start, report.robots_txt.as_deref(), &scope)
                .await?;
        }

        // Seeding
        let queue = Arc::new(CrawlQueue::new(crawler_config.max_pages as usize));
        queue.add(start.as_str(), 0);
        let seeded = report
            .sitemaps
            .iter()
            .filter(|sitemap| !sitemap.is_index)
            .flat_map(|sitemap| sitemap.urls.iter())
            .filter_map(|entry| normalize_url(&entry.loc).ok())
            .filter(|url| is_same_site(url, &domain))
            .filter(|url| queue.add(url.as_str(), 0))
            .count();
        tracing::info!(parent: span, seeded, "queue seeded");

        // Draining
        let workers = crawler_config.workers.max(1) as usize;
        let (tx, mut rx) = mpsc::channel::<CrawlResult>(workers * 2);
        let mut pool = JoinSet::new();
        for worker_id in 0..workers {
            let crawler = self.clone();
            let queue = Arc::clone(&queue);
            let scope = Arc::clone(&scope);
            let tx = tx.clone();
            let cancel = cancel.clone();
            pool.spawn(async move { crawler.run_worker(worker_id, queue, scope, tx, cancel).await });
        }
        drop(tx);

        while let Some(result) = rx.recv().await {
            report.pages.entry(result.url.clone()).or_insert(result);
            if report.pages.len() % PROGRESS_INTERVAL == 0 {
                tracing::info!(
                    parent: span,
                    pages = report.pages.len(),
                    queued = queue.len(),
                    "crawl progress"
                );
            }
        }

        let mut failure = None;
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(e) => tracing::error!(parent: span, error = %e, "crawl worker panicked"),
            }
        }

        if cancel.is_cancelled() {
            tracing::info!(parent: span, pages = report.pages.len(), "crawl cancelled");
            return Err(CrawlError::Cancelled);
        }
        if let Some(e) = failure {
            return Err(e);
        }

        // Finalize
        report.finish(self.stats());
        tracing::info!(
            parent: span,
            pages = report.stats.total_pages,
            failed = report.stats.failed_pages,
            robots_blocked = report.stats.robots_blocked,
            duration_ms = report.duration.as_millis() as u64,
            "crawl complete"
        );

        Ok(report)
    }

    /// Crawls a single page through cache, robots policy, and rate limiter
    ///
    /// Fetch failures and robots blocks produce a result with `error` set;
    /// only an invalid URL or cancellation is returned as `Err`.
    pub async fn crawl_page(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<CrawlResult, CrawlError> {
        let target = normalize_url(url)?;
        let host = extract_domain(&target).unwrap_or_default();
        let scope = CrawlScope {
            host,
            limiter: self.inner.limiter.clone(),
        };
        self.crawl_in_scope(cancel, target, &scope).await
    }

    async fn crawl_in_scope(
        &self,
        cancel: &CancellationToken,
        target: Url,
        scope: &CrawlScope,
    ) -> Result<CrawlResult, CrawlError> {
        if cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }
        let span = &self.inner.span;
        let url = target.as_str();

        if let Some(cache) = &self.inner.page_cache {
            if let Some(hit) = cache.get(url) {
                tracing::debug!(parent: span, url, "page cache hit");
                self.update_stats(|stats| {
                    stats.cache_hits += 1;
                    stats.record(&hit);
                });
                return Ok(hit);
            }
            self.update_stats(|stats| stats.cache_misses += 1);
        }

        if self.inner.config.crawler.respect_robots {
            let robots = self
                .robots_for(cancel, &target, scope.limiter.as_deref())
                .await?;
            if !robots.is_allowed(&self.inner.config.crawler.user_agent, url) {
                tracing::debug!(parent: span, url, "blocked by robots.txt");
                let result = CrawlResult::failed(
                    url,
                    CrawlError::RobotsDenied {
                        url: url.to_string(),
                    },
                );
                self.update_stats(|stats| {
                    stats.robots_blocked += 1;
                    stats.record(&result);
                });
                return Ok(result);
            }
        }

        if let Some(limiter) = &scope.limiter {
            limiter.wait(cancel).await?;
        }

        let mut result = match self.inner.fetcher.fetch(cancel, url).await {
            Ok(result) => result,
            Err(failure) if failure.is_cancelled() => return Err(CrawlError::Cancelled),
            Err(failure) => {
                tracing::debug!(parent: span, url, error = %failure, "page fetch failed");
                failure.into_result()
            }
        };

        if result.is_success() && result.is_html() {
            let base = Url::parse(result.effective_url()).unwrap_or_else(|_| target.clone());
            let parsed = parse_html(&result.body, &base, &scope.host);
            result.title = parsed.title;
            result.description = parsed.description;
            result.links = parsed.links;
            result.images = parsed.images;
        }

        if result.is_success() {
            if let Some(cache) = &self.inner.page_cache {
                cache.insert(url, result.clone());
            }
        }

        self.update_stats(|stats| stats.record(&result));
        Ok(result)
    }

    async fn run_worker(
        self,
        worker_id: usize,
        queue: Arc<CrawlQueue>,
        scope: Arc<CrawlScope>,
        tx: mpsc::Sender<CrawlResult>,
        cancel: CancellationToken,
    ) -> Result<(), CrawlError> {
        let span = &self.inner.span;
        let max_depth = self.inner.config.crawler.max_depth;
        tracing::debug!(parent: span, worker_id, "worker started");

        while let Some(QueueItem { url, depth }) = queue.next(&cancel).await {
            let outcome = match Url::parse(&url) {
                Ok(target) => self.crawl_in_scope(&cancel, target, &scope).await,
                Err(e) => Err(CrawlError::from(e)),
            };

            let result = match outcome {
                Ok(result) => result,
                Err(e) if e.is_cancelled() => {
                    queue.complete();
                    break;
                }
                Err(e) => {
                    let result = CrawlResult::failed(&url, &e);
                    self.update_stats(|stats| stats.record(&result));
                    result
                }
            };

            if depth < max_depth {
                for link in result.followable_links() {
                    if let Ok(child) = normalize_url(&link.url) {
                        queue.add(child.as_str(), depth + 1);
                    }
                }
            }
            queue.complete();

            if tx.send(result).await.is_err() {
                break;
            }
        }

        tracing::debug!(parent: span, worker_id, "worker finished");
        Ok(())
    }

    /// Returns the robots.txt policy for the origin of `url`
    ///
    /// Fetch or parse failures are logged and cached as allow-all.
    async fn robots_for(
        &self,
        cancel: &CancellationToken,
        url: &Url,
        limiter: Option<&RateLimiter>,
    ) -> Result<Arc<RobotsTxt>, CrawlError> {
        let Some(origin) = origin_of(url) else {
            return Ok(Arc::new(RobotsTxt::allow_all()));
        };
        if let Some(cached) = self.inner.robots_cache.get(&origin) {
            return Ok(cached);
        }

        let robots = match self.fetch_robots(cancel, url, limiter).await {
            Ok(robots) => robots,
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => {
                tracing::warn!(
                    parent: &self.inner.span,
                    origin = %origin,
                    error = %e,
                    "robots.txt unavailable, crawling unrestricted"
                );
                RobotsTxt::allow_all()
            }
        };

        let robots = Arc::new(robots);
        self.inner.robots_cache.insert(&origin, Arc::clone(&robots));
        Ok(robots)
    }

    async fn fetch_robots(
        &self,
        cancel: &CancellationToken,
        url: &Url,
        limiter: Option<&RateLimiter>,
    ) -> Result<RobotsTxt, CrawlError> {
        let location = robots_url(url).ok_or_else(|| CrawlError::InvalidUrl {
            url: url.to_string(),
            reason: "URL has no host".to_string(),
        })?;

        if let Some(limiter) = limiter {
            limiter.wait(cancel).await?;
        }

        let result = match self.inner.fetcher.fetch(cancel, &location).await {
            Ok(result) => result,
            Err(failure) if failure.is_cancelled() => return Err(CrawlError::Cancelled),
            Err(failure) if (400..500).contains(&failure.result.status_code) => {
                tracing::debug!(
                    parent: &self.inner.span,
                    location = %location,
                    status = failure.result.status_code,
                    "no robots.txt"
                );
                return Ok(RobotsTxt::allow_all());
            }
            Err(failure) => return Err(CrawlError::Robots(failure.to_string())),
        };

        let robots = parse_robots_txt(&result.body)?;
        tracing::debug!(
            parent: &self.inner.span,
            location = %location,
            sections = robots.rules.len(),
            sitemaps = robots.sitemaps.len(),
            "robots.txt loaded"
        );
        Ok(robots)
    }

    /// Fetches the site's sitemaps, following indexes breadth-first
    async fn discover_sitemaps(
        &self,
        cancel: &CancellationToken,
        start: &Url,
        robots: Option<&RobotsTxt>,
        scope: &CrawlScope,
    ) -> Result<Vec<Sitemap>, CrawlError> {
        let span = &self.inner.span;
        let mut pending: VecDeque<(String, u32)> = match robots {
            Some(robots) if !robots.sitemaps.is_empty() => {
                robots.sitemaps.iter().map(|loc| (loc.clone(), 0)).collect()
            }
            _ => default_sitemap_url(start).into_iter().map(|loc| (loc, 0)).collect(),
        };

        let mut visited = HashSet::new();
        let mut sitemaps = Vec::new();

        while let Some((location, level)) = pending.pop_front() {
            if !visited.insert(location.clone()) {
                continue;
            }
            if visited.len() > MAX_SITEMAP_DOCUMENTS {
                tracing::warn!(parent: span, limit = MAX_SITEMAP_DOCUMENTS, "sitemap document limit reached");
                break;
            }

            let mut sitemap = match self.fetch_sitemap(cancel, &location, scope).await {
                Ok(sitemap) => sitemap,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    tracing::warn!(parent: span, location = %location, error = %e, "skipping sitemap");
                    continue;
                }
            };

            tracing::debug!(
                parent: span,
                location = %location,
                is_index = sitemap.is_index,
                entries = sitemap.urls.len(),
                "sitemap loaded"
            );

            if sitemap.is_index {
                if level + 1 < MAX_SITEMAP_LEVELS {
                    pending.extend(sitemap.urls.iter().map(|child| (child.loc.clone(), level + 1)));
                } else {
                    tracing::warn!(parent: span, location = %location, "sitemap index nested too deeply");
                }
            }

            sitemap.source = Some(location);
            sitemaps.push(sitemap);
        }

        Ok(sitemaps)
    }

    async fn fetch_sitemap(
        &self,
        cancel: &CancellationToken,
        location: &str,
        scope: &CrawlScope,
    ) -> Result<Sitemap, CrawlError> {
        if let Some(limiter) = &scope.limiter {
            limiter.wait(cancel).await?;
        }

        let result = match self.inner.fetcher.fetch(cancel, location).await {
            Ok(result) => result,
            Err(failure) if failure.is_cancelled() => return Err(CrawlError::Cancelled),
            Err(failure) => return Err(CrawlError::Sitemap(failure.to_string())),
        };

        parse_sitemap(&result.body)
    }

    fn purge_page_cache(&self) {
        if let Some(cache) = &self.inner.page_cache {
            let evicted = cache.purge_expired();
            if evicted > 0 {
                tracing::debug!(parent: &self.inner.span, evicted, "purged expired cached pages");
            }
        }
    }

    fn reset_stats(&self) {
        self.update_stats(|stats| *stats = CrawlStats::default());
    }

    fn update_stats(&self, update: impl FnOnce(&mut CrawlStats)) {
        let mut stats = self.inner.stats.lock().unwrap_or_else(|e| e.into_inner());
        update(&mut stats);
    }
}
