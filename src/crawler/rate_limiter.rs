//! Request throttling
//!
//! A steady-rate limiter: every caller reserves the next free slot under a
//! short lock and then sleeps until that slot outside the lock, so concurrent
//! workers are spaced `interval` apart without serializing on the mutex.

use crate::{ConfigError, CrawlError};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Slowest accepted budget: one request per day
pub const MAX_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

/// Parses a rate-limit budget of the form `"<N>/s"` or `"<N>/m"`
///
/// Returns the interval between two requests, or `None` when the string is
/// empty (throttling disabled). Budgets slower than [`MAX_INTERVAL`] are
/// rejected.
///
/// # Examples
///
/// ```
/// use seo_crawler::crawler::parse_rate_limit;
/// use std::time::Duration;
///
/// assert_eq!(parse_rate_limit("2/s").unwrap(), Some(Duration::from_millis(500)));
/// assert_eq!(parse_rate_limit("").unwrap(), None);
/// assert!(parse_rate_limit("10/h").is_err());
/// ```
pub fn parse_rate_limit(value: &str) -> Result<Option<Duration>, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let invalid = || ConfigError::InvalidRateLimit(value.to_string());

    let (count, unit) = value.split_once('/').ok_or_else(invalid)?;
    let count: f64 = count.trim().parse().map_err(|_| invalid())?;
    if !count.is_finite() || count <= 0.0 {
        return Err(invalid());
    }

    let period = match unit.trim().to_ascii_lowercase().as_str() {
        "s" => 1.0,
        "m" => 60.0,
        _ => return Err(invalid()),
    };

    let interval = Duration::try_from_secs_f64(period / count).map_err(|_| invalid())?;
    if interval > MAX_INTERVAL {
        return Err(invalid());
    }
    Ok(Some(interval))
}

/// Steady-rate request limiter shared by all workers of a crawler
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Builds a limiter from a `"<N>/s"` or `"<N>/m"` budget string
    ///
    /// Returns `Ok(None)` for an empty budget.
    pub fn parse(value: &str) -> Result<Option<Self>, ConfigError> {
        Ok(parse_rate_limit(value)?.map(Self::from_interval))
    }

    pub fn from_interval(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Returns a limiter that is at least as slow as `min_interval`
    pub fn with_min_interval(&self, min_interval: Duration) -> Self {
        Self::from_interval(self.interval.max(min_interval))
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Waits for the next request slot
    ///
    /// Returns `CrawlError::Cancelled` as soon as `cancel` fires.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), CrawlError> {
        if cancel.is_cancelled() {
            return Err(CrawlError::Cancelled);
        }

        let slot = self.reserve();
        if slot <= Instant::now() {
            return Ok(());
        }

        tokio::select! {
            _ = cancel.cancelled() => Err(CrawlError::Cancelled),
            _ = tokio::time::sleep_until(slot) => Ok(()),
        }
    }

    fn reserve(&self) -> Instant {
        let now = Instant::now();
        let mut next_slot = self.next_slot.lock().unwrap_or_else(|e| e.into_inner());
        let slot = match *next_slot {
            Some(next) if next > now => next,
            _ => now,
        };
        *next_slot = Some(slot + self.interval);
        slot
    }
}
