//! Robots.txt caching implementation
//!
//! Parsed robots.txt policies are memoized per host with a TTL. A background
//! task periodically sweeps expired entries so hosts visited once do not pin
//! memory for the life of the process.

use crate::robots::RobotsTxt;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Span;

/// Default interval between background sweeps
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Cached robots.txt data for a host
#[derive(Debug, Clone)]
pub struct CachedRobots {
    /// The parsed robots.txt content
    pub content: Arc<RobotsTxt>,

    /// When the robots.txt was fetched
    pub fetched_at: DateTime<Utc>,
}

impl CachedRobots {
    /// Creates a new entry stamped with the current time
    pub fn new(content: Arc<RobotsTxt>) -> Self {
        Self {
            content,
            fetched_at: Utc::now(),
        }
    }

    /// Returns how long ago the robots.txt was fetched
    pub fn age(&self) -> ChronoDuration {
        Utc::now() - self.fetched_at
    }

    /// Checks if the entry is older than `ttl`
    pub fn is_stale(&self, ttl: Duration) -> bool {
        match ChronoDuration::from_std(ttl) {
            Ok(ttl) => self.age() > ttl,
            Err(_) => false,
        }
    }
}

/// TTL cache of parsed robots.txt policies keyed by host
#[derive(Debug)]
pub struct RobotsCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, CachedRobots>>,
    span: Span,
}

impl RobotsCache {
    /// Creates an empty cache whose entries expire after `ttl`
    pub fn new(ttl: Duration, span: Span) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
            span,
        }
    }

    /// Returns the cached policy for `host` if it is still fresh
    pub fn get(&self, host: &str) -> Option<Arc<RobotsTxt>> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(host)
            .filter(|entry| !entry.is_stale(self.ttl))
            .map(|entry| Arc::clone(&entry.content))
    }

    /// Stores the policy for `host`, replacing any previous entry
    pub fn insert(&self, host: &str, robots: Arc<RobotsTxt>) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(host.to_string(), CachedRobots::new(robots));
    }

    /// Removes every expired entry and returns how many were evicted
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_stale(self.ttl));
        before - entries.len()
    }

    /// Number of entries currently held, fresh or not
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Spawns the periodic sweep task
    ///
    /// The task holds only a weak reference: it exits when the cache is
    /// dropped or when `shutdown` is cancelled.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let cache: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let Some(cache) = cache.upgrade() else {
                    break;
                };
                let evicted = cache.sweep();
                if evicted > 0 {
                    tracing::debug!(parent: &cache.span, evicted, "swept expired robots.txt entries");
                }
            }
        })
    }
}
