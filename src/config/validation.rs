use crate::config::types::{
    Config, CrawlerConfig, ExtractionConfig, NavigatorConfig, SessionConfig,
};
use crate::ConfigError;

/// Smallest accepted page deadline; anything shorter fails on real sites
const MIN_REQUEST_TIMEOUT_MS: u64 = 1_000;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_extraction_config(&config.extraction)?;
    validate_session_config(&config.session)?;
    validate_navigator_config(&config.navigator)?;
    Ok(())
}

/// Validates link discovery configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // max_depth >= 0 is always true for u32, so no check needed

    at_least_one("crawler.max-pages", config.max_pages)?;
    at_least_one("crawler.total-pages", config.total_pages)?;
    at_least_one("crawler.max-concurrency", config.max_concurrency)?;
    at_least_one(
        "crawler.max-requests-per-minute",
        config.max_requests_per_minute,
    )?;
    validate_timeout("crawler.request-timeout-ms", config.request_timeout_ms)?;

    Ok(())
}

/// Validates content extraction configuration
fn validate_extraction_config(config: &ExtractionConfig) -> Result<(), ConfigError> {
    at_least_one("extraction.max-concurrency", config.max_concurrency)?;
    at_least_one(
        "extraction.max-requests-per-minute",
        config.max_requests_per_minute,
    )?;
    at_least_one("extraction.max-retries", config.max_retries)?;
    validate_timeout("extraction.request-timeout-ms", config.request_timeout_ms)?;

    Ok(())
}

/// Validates session lifecycle configuration
fn validate_session_config(config: &SessionConfig) -> Result<(), ConfigError> {
    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "session.timeout-secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.cleanup_interval_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "session.cleanup-interval-secs must be >= 1, got {}",
            config.cleanup_interval_secs
        )));
    }

    Ok(())
}

/// Validates navigator configuration
fn validate_navigator_config(config: &NavigatorConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "navigator.user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn at_least_one(name: &str, value: u32) -> Result<(), ConfigError> {
    if value < 1 {
        return Err(ConfigError::Validation(format!(
            "{} must be >= 1, got {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_timeout(name: &str, value: u64) -> Result<(), ConfigError> {
    if value < MIN_REQUEST_TIMEOUT_MS {
        return Err(ConfigError::Validation(format!(
            "{} must be >= {}ms, got {}ms",
            name, MIN_REQUEST_TIMEOUT_MS, value
        )));
    }
    Ok(())
}
