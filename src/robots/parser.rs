//! Robots.txt parser implementation
//!
//! Parses robots.txt text into per-user-agent rule sections and answers
//! allow/deny questions for URLs. Allow rules take precedence over Disallow
//! rules whenever both match a path.

use crate::CrawlError;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;
use url::Url;

/// Rules from one user-agent section of a robots.txt file
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RobotRules {
    /// The (lowercased) user-agent token this section applies to
    pub user_agent: String,

    /// Path patterns explicitly allowed
    pub allowed: Vec<String>,

    /// Path patterns disallowed
    pub disallowed: Vec<String>,

    /// Crawl-delay declared in this section
    pub crawl_delay: Option<Duration>,
}

/// Parsed robots.txt data
#[derive(Debug, Clone, Default, Serialize)]
pub struct RobotsTxt {
    /// Sections for named user agents, keyed by lowercased user-agent token
    pub rules: HashMap<String, RobotRules>,

    /// The `User-agent: *` section, if present
    pub default_rules: Option<RobotRules>,

    /// Crawl delays keyed by lowercased user-agent token (`*` included)
    pub crawl_delays: HashMap<String, Duration>,

    /// Sitemap locations declared anywhere in the file
    pub sitemaps: Vec<String>,

    /// Preferred host declared by a `Host:` directive
    pub host: Option<String>,
}

/// Parses robots.txt content
///
/// # Format
///
/// - One `directive: value` per line, split on the first `:`
/// - Directive names are case-insensitive
/// - `#` starts a comment; blank and comment-only lines are ignored
/// - Consecutive `User-agent` lines share the rules that follow them
/// - A `User-agent` line after rules starts a new group; naming an agent that
///   was seen before appends to its existing section
///
/// # Errors
///
/// Returns `CrawlError::Robots` when the text is an HTML document, which
/// servers commonly return instead of a 404 for a missing robots.txt.
///
/// # Example
///
/// ```
/// use seo_crawler::robots::parse_robots_txt;
///
/// let robots = parse_robots_txt("User-agent: *\nDisallow: /private").unwrap();
/// assert!(!robots.is_allowed("MyBot", "https://example.com/private/page"));
/// assert!(robots.is_allowed("MyBot", "https://example.com/public"));
/// ```
pub fn parse_robots_txt(text: &str) -> Result<RobotsTxt, CrawlError> {
    let head = text.trim_start_matches('\u{feff}').trim_start();
    if head.starts_with('<') {
        return Err(CrawlError::Robots(
            "content looks like an HTML document".to_string(),
        ));
    }

    let mut robots = RobotsTxt::default();
    let mut current_agents: Vec<String> = Vec::new();
    let mut in_rules = false;

    for raw_line in text.lines() {
        let line = match raw_line.find('#') {
            Some(idx) => &raw_line[..idx],
            None => raw_line,
        };
        let line = line.trim().trim_start_matches('\u{feff}');
        if line.is_empty() {
            continue;
        }

        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if in_rules {
                    current_agents.clear();
                    in_rules = false;
                }
                let agent = value.to_lowercase();
                if agent.is_empty() {
                    continue;
                }
                robots.section_mut(&agent);
                current_agents.push(agent);
            }
            "allow" | "disallow" => {
                in_rules = true;
                // An empty value places no restriction
                if value.is_empty() {
                    continue;
                }
                for agent in &current_agents {
                    let section = robots.section_mut(agent);
                    if key == "allow" {
                        section.allowed.push(value.to_string());
                    } else {
                        section.disallowed.push(value.to_string());
                    }
                }
            }
            "crawl-delay" => {
                in_rules = true;
                let Some(delay) = parse_crawl_delay(value) else {
                    continue;
                };
                for agent in &current_agents {
                    robots.section_mut(agent).crawl_delay = Some(delay);
                    robots.crawl_delays.insert(agent.clone(), delay);
                }
            }
            "sitemap" => {
                if !value.is_empty() && !robots.sitemaps.iter().any(|s| s == value) {
                    robots.sitemaps.push(value.to_string());
                }
            }
            "host" => {
                if !value.is_empty() && robots.host.is_none() {
                    robots.host = Some(value.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(robots)
}

/// Longest crawl-delay honored; larger values are clamped to it
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Parses a crawl-delay value
///
/// Accepts a bare number of seconds (`"10"`, `"2.5"`) or a number with a unit
/// suffix (`"500ms"`, `"2s"`, `"1m"`, `"1h"`). Values above
/// [`MAX_CRAWL_DELAY`] are clamped.
pub fn parse_crawl_delay(value: &str) -> Option<Duration> {
    let value = value.trim().to_ascii_lowercase();
    if let Ok(seconds) = value.parse::<f64>() {
        return seconds_to_duration(seconds);
    }

    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .filter(|idx| *idx > 0)?;
    let (number, unit) = value.split_at(split);
    let number: f64 = number.parse().ok()?;
    let seconds = match unit.trim() {
        "ms" => number / 1000.0,
        "s" | "sec" | "secs" => number,
        "m" | "min" => number * 60.0,
        "h" => number * 3600.0,
        _ => return None,
    };
    seconds_to_duration(seconds)
}

fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds.min(MAX_CRAWL_DELAY.as_secs_f64())).ok()
}

impl RobotsTxt {
    /// Creates a permissive policy that allows everything
    ///
    /// Used when robots.txt is missing or cannot be fetched.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Returns the section for `agent`, creating it if needed
    fn section_mut(&mut self, agent: &str) -> &mut RobotRules {
        if agent == "*" {
            return self.default_rules.get_or_insert_with(|| RobotRules {
                user_agent: "*".to_string(),
                ..RobotRules::default()
            });
        }
        self.rules
            .entry(agent.to_string())
            .or_insert_with(|| RobotRules {
                user_agent: agent.to_string(),
                ..RobotRules::default()
            })
    }

    /// Resolves the rule section that applies to `user_agent`
    ///
    /// Exact (case-insensitive) match first, then the longest section name
    /// contained in the user agent, then the `*` section.
    pub fn rules_for(&self, user_agent: &str) -> Option<&RobotRules> {
        let agent = user_agent.to_lowercase();

        if let Some(rules) = self.rules.get(&agent) {
            return Some(rules);
        }

        let substring_match = self
            .rules
            .iter()
            .filter(|(name, _)| agent.contains(name.as_str()))
            .max_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| b.cmp(a)))
            .map(|(_, rules)| rules);

        substring_match.or(self.default_rules.as_ref())
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// `url` may be an absolute URL or a path. Allow rules are checked first
    /// and win over any Disallow rule that also matches. A path matched by no
    /// rule is allowed.
    pub fn is_allowed(&self, user_agent: &str, url: &str) -> bool {
        let Some(rules) = self.rules_for(user_agent) else {
            return true;
        };

        let path = request_path(url);

        if rules.allowed.iter().any(|p| path_matches(p, &path)) {
            return true;
        }

        !rules.disallowed.iter().any(|p| path_matches(p, &path))
    }

    /// Gets the crawl delay for a specific user agent
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.rules_for(user_agent).and_then(|rules| rules.crawl_delay)
    }
}

/// Extracts the path and query of `url`, or returns it as-is if it is already a path
fn request_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        },
        Err(_) if url.is_empty() => "/".to_string(),
        Err(_) => url.to_string(),
    }
}

/// Matches a robots.txt path pattern against a request path
///
/// - `*` matches any run of characters
/// - a trailing `$` anchors the pattern at the end of the path
/// - without `$` the pattern only has to match a prefix of the path
pub fn path_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(stripped) => (stripped, true),
        None => (pattern, false),
    };

    if !pattern.contains('*') {
        return if anchored {
            path == pattern
        } else {
            path.starts_with(pattern)
        };
    }

    wildcard_match(pattern.as_bytes(), path.as_bytes(), anchored)
}

/// Glob matching for patterns containing `*`
fn wildcard_match(pattern: &[u8], path: &[u8], anchored: bool) -> bool {
    let mut p = 0;
    let mut s = 0;
    let mut star: Option<usize> = None;
    let mut star_s = 0;

    while s < path.len() {
        if p == pattern.len() && !anchored {
            return true;
        }
        if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            star_s = s;
            p += 1;
        } else if p < pattern.len() && pattern[p] == path[s] {
            p += 1;
            s += 1;
        } else if let Some(star_p) = star {
            p = star_p + 1;
            star_s += 1;
            s = star_s;
        } else {
            return false;
        }
    }

    pattern[p..].iter().all(|&c| c == b'*')
}
