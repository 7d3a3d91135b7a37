//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - The fixed request header set sent with every GET
//! - Retry with exponential backoff for transient failures
//! - gzip decompression and the response body size cap
//! - Error classification
//!
//! The fetcher never touches shared crawl state; it turns one URL into one
//! [`CrawlResult`].

use crate::config::{Config, RetryConfig};
use crate::crawler::CrawlResult;
use crate::CrawlError;
use flate2::read::GzDecoder;
use reqwest::header::{
    HeaderMap, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONNECTION, CONTENT_ENCODING,
    CONTENT_TYPE, DNT, UPGRADE_INSECURE_REQUESTS,
};
use reqwest::{redirect::Policy, Client, Response};
use std::collections::BTreeMap;
use std::io::Read;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::Span;
use url::Url;

/// Bodies larger than this are truncated
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Maximum number of redirect hops followed per request
pub const MAX_REDIRECTS: usize = 10;

/// Response headers kept on a [`CrawlResult`]
const KEPT_HEADERS: &[&str] = &[
    "cache-control",
    "content-encoding",
    "content-language",
    "content-length",
    "content-type",
    "etag",
    "last-modified",
    "link",
    "location",
    "server",
    "x-robots-tag",
];

const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.9";

/// A failed fetch together with whatever was received
///
/// For 4xx responses `result` carries the full response; for exhausted
/// retries it carries the most complete attempt.
#[derive(Debug, Error)]
#[error("{source}")]
pub struct FetchFailure {
    pub result: Box<CrawlResult>,
    pub source: CrawlError,
}

impl FetchFailure {
    fn new(mut result: CrawlResult, source: CrawlError) -> Self {
        result.error = Some(source.to_string());
        Self {
            result: Box::new(result),
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }

    /// Consumes the failure, returning the error-bearing result
    pub fn into_result(self) -> CrawlResult {
        *self.result
    }
}

/// Exponential backoff schedule
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            attempts: config.attempts.max(1),
            initial_delay: config.delay(),
            multiplier: config.multiplier,
            max_delay: config.max_delay(),
        }
    }

    /// Delay before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(retry.min(i32::MAX as u32) as i32);
        let delay = self.initial_delay.as_secs_f64() * factor;
        if !delay.is_finite() || delay >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay)
    }

    /// Delays between consecutive attempts
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        (0..self.attempts.saturating_sub(1)).map(|retry| self.delay_for(retry))
    }
}

/// Builds an HTTP client with the crawler's configuration
///
/// The user agent is set on the client so it is re-sent on every redirect
/// hop.
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, CrawlError> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .build()
        .map_err(CrawlError::Client)
}

/// Fetches single URLs with retry
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    retry: RetryPolicy,
    span: Span,
}

impl Fetcher {
    pub fn new(config: &Config, span: Span) -> Result<Self, CrawlError> {
        let client = build_http_client(&config.crawler.user_agent, config.crawler.timeout())?;
        Ok(Self {
            client,
            retry: RetryPolicy::from_config(&config.retry),
            span,
        })
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Fetches `url`, retrying transport errors and 5xx responses
    ///
    /// 4xx responses are returned immediately as a [`FetchFailure`].
    /// Cancellation interrupts both the request and the backoff sleep.
    pub async fn fetch(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<CrawlResult, FetchFailure> {
        let mut best: Option<CrawlResult> = None;
        let mut last_error: Option<CrawlError> = None;

        for attempt in 0..self.retry.attempts {
            if attempt > 0 {
                let delay = self.retry.delay_for(attempt - 1);
                tracing::debug!(parent: &self.span, url, attempt, ?delay, "retrying fetch");
                tokio::select! {
                    _ = cancel.cancelled() => {
                        let result = best.unwrap_or_else(|| CrawlResult::new(url));
                        return Err(FetchFailure::new(result, CrawlError::Cancelled));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            match self.fetch_once(cancel, url).await {
                Ok(result) => return Ok(result),
                Err(failure) if failure.is_cancelled() || !failure.source.is_retryable() => {
                    return Err(failure);
                }
                Err(failure) => {
                    tracing::warn!(
                        parent: &self.span,
                        url,
                        attempt = attempt + 1,
                        attempts = self.retry.attempts,
                        error = %failure.source,
                        "fetch attempt failed"
                    );
                    let FetchFailure { result, source } = failure;
                    let keep = match &best {
                        Some(previous) => result.status_code != 0 || previous.status_code == 0,
                        None => true,
                    };
                    if keep {
                        best = Some(*result);
                    }
                    last_error = Some(source);
                }
            }
        }

        let error = last_error.unwrap_or_else(|| CrawlError::Timeout {
            url: url.to_string(),
        });
        let result = best.unwrap_or_else(|| CrawlResult::new(url));
        Err(FetchFailure::new(result, error))
    }

    async fn fetch_once(
        &self,
        cancel: &CancellationToken,
        url: &str,
    ) -> Result<CrawlResult, FetchFailure> {
        let mut result = CrawlResult::new(url);
        let target = match Url::parse(url) {
            Ok(target) => target,
            Err(e) => {
                let error = CrawlError::InvalidUrl {
                    url: url.to_string(),
                    reason: e.to_string(),
                };
                return Err(FetchFailure::new(result, error));
            }
        };

        let started = Instant::now();
        let request = self
            .client
            .get(target.clone())
            .header(ACCEPT, ACCEPT_VALUE)
            .header(ACCEPT_LANGUAGE, ACCEPT_LANGUAGE_VALUE)
            .header(ACCEPT_ENCODING, "gzip")
            .header(CONNECTION, "keep-alive")
            .header(DNT, "1")
            .header(UPGRADE_INSECURE_REQUESTS, "1");

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(FetchFailure::new(result, CrawlError::Cancelled));
            }
            response = request.send() => response,
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                result.response_time = started.elapsed();
                return Err(FetchFailure::new(result, classify_error(url, e)));
            }
        };

        let status = response.status();
        result.status_code = status.as_u16();
        if response.url() != &target {
            result.final_url = Some(response.url().to_string());
        }
        result.content_type = header_value(response.headers(), CONTENT_TYPE.as_str());
        result.headers = kept_headers(response.headers());
        let gzipped = header_value(response.headers(), CONTENT_ENCODING.as_str())
            .to_ascii_lowercase()
            .contains("gzip");

        let body = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(FetchFailure::new(result, CrawlError::Cancelled));
            }
            body = read_capped_body(response) => body,
        };
        let (raw, truncated) = match body {
            Ok(body) => body,
            Err(e) => {
                result.response_time = started.elapsed();
                return Err(FetchFailure::new(result, classify_error(url, e)));
            }
        };
        if truncated {
            tracing::debug!(parent: &self.span, url, "response body truncated");
        }

        result.body = decode_body(&raw, gzipped);
        result.response_time = started.elapsed();

        tracing::debug!(
            parent: &self.span,
            url,
            status = result.status_code,
            bytes = result.body.len(),
            elapsed_ms = result.response_time.as_millis() as u64,
            "fetched"
        );

        if status.is_client_error() || status.is_server_error() {
            let error = CrawlError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            };
            return Err(FetchFailure::new(result, error));
        }

        Ok(result)
    }
}

/// Maps a reqwest error onto the crawler's error taxonomy
fn classify_error(url: &str, error: reqwest::Error) -> CrawlError {
    if error.is_timeout() {
        CrawlError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_redirect() {
        CrawlError::RedirectLimit {
            url: url.to_string(),
        }
    } else {
        CrawlError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}

fn header_value(headers: &HeaderMap, name: &str) -> String {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string()
}

fn kept_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    KEPT_HEADERS
        .iter()
        .filter_map(|name| {
            let value = headers.get(*name)?.to_str().ok()?;
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Reads at most [`MAX_BODY_BYTES`], reporting whether the body was cut
async fn read_capped_body(mut response: Response) -> Result<(Vec<u8>, bool), reqwest::Error> {
    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await? {
        let room = MAX_BODY_BYTES - body.len();
        if chunk.len() >= room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, chunk.len() > room || response.chunk().await?.is_some()));
        }
        body.extend_from_slice(&chunk);
    }
    Ok((body, false))
}

/// Decodes a body as lossy UTF-8, inflating gzip first when flagged
///
/// A corrupt or truncated gzip stream keeps whatever inflated cleanly; a
/// stream that yields nothing falls back to the raw bytes.
pub fn decode_body(raw: &[u8], gzipped: bool) -> String {
    if gzipped {
        let mut inflated = Vec::new();
        let read = GzDecoder::new(raw)
            .take(MAX_BODY_BYTES as u64)
            .read_to_end(&mut inflated);
        if read.is_ok() || !inflated.is_empty() {
            return String::from_utf8_lossy(&inflated).into_owned();
        }
    }
    let raw = &raw[..raw.len().min(MAX_BODY_BYTES)];
    String::from_utf8_lossy(raw).into_owned()
}
