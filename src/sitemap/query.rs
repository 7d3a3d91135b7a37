//! Helper queries over a parsed sitemap

use crate::sitemap::{ChangeFreq, Sitemap, SitemapUrl};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// Priority at or above which an entry counts as high priority
pub const HIGH_PRIORITY: f64 = 0.8;

/// Priority at or above which an entry counts as medium priority
pub const MEDIUM_PRIORITY: f64 = 0.5;

/// Summary counts for a sitemap
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SitemapStats {
    pub total: usize,
    pub with_lastmod: usize,
    pub high_priority: usize,
    pub medium_priority: usize,
    pub low_priority: usize,
    pub by_changefreq: BTreeMap<ChangeFreq, usize>,
}

impl Sitemap {
    /// Entries whose priority is at least `min_priority`
    pub fn filter_by_priority(&self, min_priority: f64) -> Vec<&SitemapUrl> {
        self.urls
            .iter()
            .filter(|url| url.priority >= min_priority)
            .collect()
    }

    /// Entries modified within `max_age` of now
    ///
    /// Entries without a parseable `lastmod` are kept.
    pub fn filter_by_age(&self, max_age: Duration) -> Vec<&SitemapUrl> {
        self.filter_by_age_at(max_age, Utc::now())
    }

    /// Same as [`Sitemap::filter_by_age`] with an explicit reference time
    pub fn filter_by_age_at(&self, max_age: Duration, now: DateTime<Utc>) -> Vec<&SitemapUrl> {
        let cutoff = now - max_age;
        self.urls
            .iter()
            .filter(|url| match url.last_modified() {
                Ok(modified) => modified >= cutoff,
                Err(_) => true,
            })
            .collect()
    }

    /// Entries grouped by change frequency
    pub fn group_by_changefreq(&self) -> BTreeMap<ChangeFreq, Vec<&SitemapUrl>> {
        let mut groups: BTreeMap<ChangeFreq, Vec<&SitemapUrl>> = BTreeMap::new();
        for url in &self.urls {
            groups.entry(url.changefreq).or_default().push(url);
        }
        groups
    }

    /// Counts by priority bucket and change frequency
    pub fn stats(&self) -> SitemapStats {
        let mut stats = SitemapStats {
            total: self.urls.len(),
            ..SitemapStats::default()
        };

        for url in &self.urls {
            if url.lastmod.is_some() {
                stats.with_lastmod += 1;
            }

            if url.priority >= HIGH_PRIORITY {
                stats.high_priority += 1;
            } else if url.priority >= MEDIUM_PRIORITY {
                stats.medium_priority += 1;
            } else {
                stats.low_priority += 1;
            }

            *stats.by_changefreq.entry(url.changefreq).or_insert(0) += 1;
        }

        stats
    }
}
