use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default browser-like user agent sent by the HTTP navigator
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Main configuration structure for Site-Gleaner
///
/// Every section and field has a default, so an empty file (or no file at
/// all) yields a working configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub extraction: ExtractionConfig,
    pub session: SessionConfig,
    pub navigator: NavigatorConfig,
}

/// Link discovery configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum link-hops from a seed URL
    pub max_depth: u32,

    /// Maximum number of pages processed per session
    pub max_pages: u32,

    /// Number of internal links after which the crawl stops
    pub total_pages: u32,

    /// Maximum number of concurrent workers per session
    pub max_concurrency: u32,

    /// Request budget per minute, shared by all workers of a session
    pub max_requests_per_minute: u32,

    /// Deadline for each page load and link extraction (milliseconds)
    pub request_timeout_ms: u64,

    /// Retries for transient failures before a page is given up
    pub max_retries: u32,

    /// Pause before retrying a transient failure (milliseconds)
    pub retry_delay_ms: u64,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_pages: 10,
            total_pages: 5,
            max_concurrency: 10,
            max_requests_per_minute: 100,
            request_timeout_ms: 60_000,
            max_retries: 3,
            retry_delay_ms: 5_000,
        }
    }
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Content extraction configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct ExtractionConfig {
    /// Maximum number of concurrent workers per session
    pub max_concurrency: u32,

    /// Request budget per minute, shared by all workers of a session
    pub max_requests_per_minute: u32,

    /// Deadline for each page load and markup read (milliseconds)
    pub request_timeout_ms: u64,

    /// Retries for transient failures before a page is given up
    pub max_retries: u32,

    /// Number of characters kept when previewing extracted text
    pub content_preview_length: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 20,
            max_requests_per_minute: 200,
            request_timeout_ms: 30_000,
            max_retries: 3,
            content_preview_length: 200,
        }
    }
}

impl ExtractionConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct SessionConfig {
    /// Age after which the reaper removes a session (seconds)
    pub timeout_secs: u64,

    /// Interval between reaper sweeps (seconds)
    pub cleanup_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3_600,
            cleanup_interval_secs: 300,
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Navigator configuration
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default, rename_all = "kebab-case")]
pub struct NavigatorConfig {
    /// User agent string sent with every page load
    pub user_agent: String,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}
