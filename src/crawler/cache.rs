//! In-memory TTL cache of fetched pages

use crate::crawler::CrawlResult;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Page results keyed by requested URL
#[derive(Debug)]
pub struct PageCache {
    ttl: Duration,
    entries: RwLock<HashMap<String, (CrawlResult, Instant)>>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Returns a copy of the cached result if it has not expired
    pub fn get(&self, url: &str) -> Option<CrawlResult> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries
            .get(url)
            .filter(|(_, stored_at)| stored_at.elapsed() < self.ttl)
            .map(|(result, _)| result.clone())
    }

    pub fn insert(&self, url: &str, result: CrawlResult) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(url.to_string(), (result, Instant::now()));
    }

    /// Drops expired entries and returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, (_, stored_at)| stored_at.elapsed() < self.ttl);
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
