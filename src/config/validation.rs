use crate::config::types::{CacheConfig, Config, CrawlerConfig, RetryConfig};
use crate::crawler::parse_rate_limit;
use crate::ConfigError;

/// Upper bound on the worker pool size
const MAX_WORKERS: u32 = 256;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_retry_config(&config.retry)?;
    validate_cache_config(&config.cache)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    parse_rate_limit(&config.rate_limit)?;

    Ok(())
}

/// Validates retry configuration
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.attempts < 1 {
        return Err(ConfigError::Validation(format!(
            "retry attempts must be >= 1, got {}",
            config.attempts
        )));
    }

    if !config.multiplier.is_finite() || config.multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "retry multiplier must be >= 1.0, got {}",
            config.multiplier
        )));
    }

    if config.max_delay_ms < config.delay_ms {
        return Err(ConfigError::Validation(format!(
            "max_delay_ms ({}) must be >= delay_ms ({})",
            config.max_delay_ms, config.delay_ms
        )));
    }

    Ok(())
}

/// Validates cache configuration
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.enabled && config.duration_secs == 0 {
        return Err(ConfigError::Validation(
            "cache duration_secs must be > 0 when the cache is enabled".to_string(),
        ));
    }

    Ok(())
}
