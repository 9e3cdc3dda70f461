//! HTTP navigator
//!
//! The default [`Navigator`]: loads pages with `reqwest` and reports their
//! `<a href>` links with `scraper`. It does not run scripts, so it sees the
//! markup as served.

use crate::config::NavigatorConfig;
use crate::crawler::navigator::{BrowserLauncher, Navigator, PageHandle};
use crate::crawler::parser::extract_links;
use crate::NavigationError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use std::error::Error as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Maximum redirect hops followed per page load
const MAX_REDIRECTS: usize = 10;

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The navigator configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use site_gleaner::config::NavigatorConfig;
/// use site_gleaner::crawler::build_http_client;
///
/// let client = build_http_client(&NavigatorConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &NavigatorConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.as_str())
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(MAX_REDIRECTS))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Launches [`HttpNavigator`]s sharing one connection pool
#[derive(Debug, Clone)]
pub struct HttpLauncher {
    client: Client,
}

impl HttpLauncher {
    pub fn new(config: &NavigatorConfig) -> Result<Self, NavigationError> {
        let client = build_http_client(config).map_err(|e| {
            NavigationError::Other(format!("Failed to build HTTP client: {}", e))
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BrowserLauncher for HttpLauncher {
    async fn launch(&self) -> Result<Arc<dyn Navigator>, NavigationError> {
        Ok(Arc::new(HttpNavigator::new(self.client.clone())))
    }
}

/// Navigator backed by plain HTTP requests
#[derive(Debug)]
pub struct HttpNavigator {
    client: Client,
    closed: AtomicBool,
}

impl HttpNavigator {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            closed: AtomicBool::new(false),
        }
    }

    fn ensure_open(&self) -> Result<(), NavigationError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(NavigationError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl Navigator for HttpNavigator {
    async fn load(&self, url: &Url, timeout: Duration) -> Result<PageHandle, NavigationError> {
        self.ensure_open()?;

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_request_error(url, timeout, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(NavigationError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let final_url = response.url().clone();
        let body = response
            .text()
            .await
            .map_err(|e| classify_request_error(url, timeout, e))?;

        if body.trim().is_empty() {
            return Err(NavigationError::EmptyResponse {
                url: url.to_string(),
            });
        }

        tracing::debug!("Loaded {} ({} bytes)", final_url, body.len());
        Ok(PageHandle::new(final_url, body))
    }

    async fn extract_outbound_links(
        &self,
        page: &PageHandle,
    ) -> Result<Vec<String>, NavigationError> {
        self.ensure_open()?;
        Ok(extract_links(&page.markup, &page.url))
    }

    async fn raw_markup(&self, page: &PageHandle) -> Result<String, NavigationError> {
        self.ensure_open()?;
        Ok(page.markup.clone())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

/// Maps a `reqwest` failure onto the navigation error taxonomy
fn classify_request_error(url: &Url, timeout: Duration, error: reqwest::Error) -> NavigationError {
    let detail = error_chain(&error).to_lowercase();
    let url = url.to_string();

    if error.is_connect() {
        if detail.contains("timed out") {
            NavigationError::ConnectionTimedOut { url }
        } else if detail.contains("reset") {
            NavigationError::ConnectionReset { url }
        } else {
            NavigationError::ConnectionRefused { url }
        }
    } else if error.is_timeout() {
        NavigationError::Timeout {
            operation: format!("Loading {}", url),
            after: timeout,
        }
    } else if detail.contains("connection reset") {
        NavigationError::ConnectionReset { url }
    } else {
        NavigationError::Other(format!("Request to {} failed: {}", url, error_chain(&error)))
    }
}

/// Joins an error and its sources into one line
fn error_chain(error: &reqwest::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
