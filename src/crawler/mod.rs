//! Crawler module for link discovery and content extraction
//!
//! This module contains the core crawling logic, including:
//! - The per-session frontier and rate limiter
//! - A bounded worker pool generic over its task handler
//! - Link discovery and readable-text extraction handlers
//! - The navigator and extractor seams with their default implementations
//! - Overall crawl coordination

mod coordinator;
mod deadline;
mod discovery;
mod extraction;
mod extractor;
mod fetcher;
mod frontier;
mod navigator;
mod parser;
mod pool;
mod rate_limiter;
mod report;

pub use coordinator::Coordinator;
pub use deadline::with_deadline;
pub use discovery::LinkDiscovery;
pub use extraction::{ContentExtraction, FollowLinks};
pub use extractor::{collapse_whitespace, Article, Extractor, ReadableTextExtractor};
pub use fetcher::{build_http_client, HttpLauncher, HttpNavigator};
pub use frontier::{EnqueueOutcome, Frontier, Task};
pub use navigator::{BrowserLauncher, BrowserLease, Navigator, PageHandle};
pub use parser::{extract_links, extract_title};
pub use pool::{PoolSettings, PoolStats, TaskHandler, WorkerPool};
pub use rate_limiter::RateLimiter;
pub use report::{DiscoveryReport, ExtractionReport};
