//! Robots.txt handling module
//!
//! This module provides parsing, evaluation, and per-host caching of
//! robots.txt policies. Fetching happens in the crawler, which routes the
//! request through its rate limiter like any other network call.

mod cache;
mod parser;

pub use cache::{CachedRobots, RobotsCache, DEFAULT_SWEEP_INTERVAL};
pub use parser::{
    parse_crawl_delay, parse_robots_txt, path_matches, RobotRules, RobotsTxt, MAX_CRAWL_DELAY,
};
