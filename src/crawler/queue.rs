//! Crawl frontier
//!
//! A breadth-first queue that admits each URL at most once and never more
//! than `max_pages` URLs in total. Workers pop with [`CrawlQueue::next`],
//! which keeps them parked while siblings are still in flight (a page being
//! fetched may enqueue more links) and releases them once the frontier is
//! drained.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// A URL waiting to be crawled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
    pub url: String,
    pub depth: u32,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<QueueItem>,
    admitted: HashSet<String>,
    in_flight: usize,
}

#[derive(Debug)]
pub struct CrawlQueue {
    max_pages: usize,
    state: Mutex<QueueState>,
    notify: Notify,
}

impl CrawlQueue {
    pub fn new(max_pages: usize) -> Self {
        Self {
            max_pages,
            state: Mutex::new(QueueState::default()),
            notify: Notify::new(),
        }
    }

    /// Admits `url` at `depth`
    ///
    /// Returns `false` when the URL was already admitted or the admission
    /// budget is spent.
    pub fn add(&self, url: &str, depth: u32) -> bool {
        {
            let mut state = self.lock();
            if state.admitted.len() >= self.max_pages || state.admitted.contains(url) {
                return false;
            }
            state.admitted.insert(url.to_string());
            state.items.push_back(QueueItem {
                url: url.to_string(),
                depth,
            });
        }
        self.notify.notify_waiters();
        true
    }

    /// Pops the oldest item without waiting
    ///
    /// The item counts as in flight until [`CrawlQueue::complete`] is called.
    pub fn try_next(&self) -> Option<QueueItem> {
        let mut state = self.lock();
        let item = state.items.pop_front()?;
        state.in_flight += 1;
        Some(item)
    }

    /// Pops the oldest item, waiting while other items are in flight
    ///
    /// Returns `None` once the queue is empty and nothing is in flight, or
    /// when `cancel` fires.
    pub async fn next(&self, cancel: &CancellationToken) -> Option<QueueItem> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if let Some(item) = state.items.pop_front() {
                    state.in_flight += 1;
                    return Some(item);
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = &mut notified => {}
            }
        }
    }

    /// Marks a popped item as finished
    pub fn complete(&self) {
        let drained = {
            let mut state = self.lock();
            state.in_flight = state.in_flight.saturating_sub(1);
            state.in_flight == 0 && state.items.is_empty()
        };
        if drained {
            self.notify.notify_waiters();
        }
    }

    /// Number of items waiting to be popped
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of URLs admitted so far
    pub fn admitted(&self) -> usize {
        self.lock().admitted.len()
    }

    pub fn max_pages(&self) -> usize {
        self.max_pages
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
