//! Site-Gleaner: session-scoped site crawling and readable-text extraction
//!
//! This crate discovers a website's internal content pages and extracts clean
//! readable text from them. Each request runs in its own session with a
//! bounded worker pool, a per-session rate limit, depth and breadth limits,
//! and guaranteed release of browser resources on completion, error or
//! cancellation.

pub mod config;
pub mod crawler;
pub mod session;
pub mod url;

use std::time::Duration;
use thiserror::Error;

/// Main error type for Site-Gleaner operations
///
/// Per-page failures never surface here; they are recorded in the session's
/// error list. Only failures that prevent a session from running at all are
/// returned to the caller.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("No valid URLs provided ({} rejected)", .errors.len())]
    NoValidSeeds { errors: Vec<String> },

    #[error("Failed to launch browser: {0}")]
    Launch(NavigationError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// URL-specific errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Errors raised by a navigator while loading or inspecting a page
#[derive(Debug, Clone, Error)]
pub enum NavigationError {
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Empty response received from {url}")]
    EmptyResponse { url: String },

    #[error("Connection timed out for {url}")]
    ConnectionTimedOut { url: String },

    #[error("Connection refused for {url}")]
    ConnectionRefused { url: String },

    #[error("Connection reset for {url}")]
    ConnectionReset { url: String },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Browser has been closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Coarse classification of a navigation failure, used for logging and retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    EmptyResponse,
    ConnectionTimedOut,
    ConnectionRefused,
    ConnectionReset,
    ServerError,
    ClientError,
    Closed,
    Other,
}

impl NavigationError {
    /// Classifies this error
    ///
    /// Free-form errors are matched on the substrings browsers and HTTP
    /// stacks use (`ERR_CONNECTION_REFUSED`, `timed out`, ...).
    pub fn classify(&self) -> FailureKind {
        match self {
            Self::Timeout { .. } => FailureKind::Timeout,
            Self::EmptyResponse { .. } => FailureKind::EmptyResponse,
            Self::ConnectionTimedOut { .. } => FailureKind::ConnectionTimedOut,
            Self::ConnectionRefused { .. } => FailureKind::ConnectionRefused,
            Self::ConnectionReset { .. } => FailureKind::ConnectionReset,
            Self::HttpStatus { status, .. } if *status >= 500 => FailureKind::ServerError,
            Self::HttpStatus { .. } => FailureKind::ClientError,
            Self::Closed => FailureKind::Closed,
            Self::Other(message) => classify_message(message),
        }
    }

    /// Returns true if retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self.classify(),
            FailureKind::Timeout
                | FailureKind::EmptyResponse
                | FailureKind::ConnectionTimedOut
                | FailureKind::ConnectionRefused
                | FailureKind::ConnectionReset
                | FailureKind::ServerError
        )
    }
}

fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if lower.contains("err_empty_response") || lower.contains("empty response") {
        FailureKind::EmptyResponse
    } else if lower.contains("err_connection_timed_out") || lower.contains("connection timed out")
    {
        FailureKind::ConnectionTimedOut
    } else if lower.contains("err_connection_refused") || lower.contains("connection refused") {
        FailureKind::ConnectionRefused
    } else if lower.contains("err_connection_reset") || lower.contains("connection reset") {
        FailureKind::ConnectionReset
    } else if lower.contains("timed out") || lower.contains("timeout") {
        FailureKind::Timeout
    } else {
        FailureKind::Other
    }
}

/// Result type alias for Site-Gleaner operations
pub type Result<T> = std::result::Result<T, CrawlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, DiscoveryReport, ExtractionReport};
pub use session::{Session, SessionId, SessionManager};
pub use crate::url::{is_non_content, is_valid_url, normalize_url};
