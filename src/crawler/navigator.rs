//! Page navigation capability
//!
//! The crawler never talks to a browser or HTTP stack directly. It goes
//! through a [`Navigator`] obtained from a [`BrowserLauncher`], held for the
//! lifetime of one pool by a [`BrowserLease`].

use crate::NavigationError;
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// A loaded page
#[derive(Debug, Clone)]
pub struct PageHandle {
    /// Final URL of the page (after redirects)
    pub url: Url,

    /// Markup as served
    pub markup: String,
}

impl PageHandle {
    pub fn new(url: Url, markup: String) -> Self {
        Self { url, markup }
    }
}

/// Loads pages and inspects them
#[async_trait]
pub trait Navigator: Send + Sync {
    /// Loads `url`, giving up after `timeout`
    async fn load(&self, url: &Url, timeout: Duration) -> Result<PageHandle, NavigationError>;

    /// Returns the absolute targets of the page's `<a href>` elements
    async fn extract_outbound_links(&self, page: &PageHandle)
        -> Result<Vec<String>, NavigationError>;

    /// Returns the page's markup
    async fn raw_markup(&self, page: &PageHandle) -> Result<String, NavigationError>;

    /// Releases the navigator's resources; later calls fail with `Closed`
    async fn close(&self);
}

/// Produces a navigator for one worker pool
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn Navigator>, NavigationError>;
}

/// Exclusive use of a navigator by one pool
///
/// The navigator is closed exactly once, by whichever of [`release`] or
/// `Drop` gets there first.
///
/// [`release`]: BrowserLease::release
pub struct BrowserLease {
    navigator: Arc<dyn Navigator>,
    released: AtomicBool,
}

impl BrowserLease {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        Self {
            navigator,
            released: AtomicBool::new(false),
        }
    }

    pub fn navigator(&self) -> Arc<dyn Navigator> {
        Arc::clone(&self.navigator)
    }

    /// Closes the navigator
    ///
    /// Returns false if the lease had already been released.
    pub async fn release(&self) -> bool {
        if self.released.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.navigator.close().await;
        tracing::debug!("Browser lease released");
        true
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }
}

impl fmt::Debug for BrowserLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrowserLease")
            .field("released", &self.is_released())
            .finish()
    }
}

impl Drop for BrowserLease {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let navigator = Arc::clone(&self.navigator);
                handle.spawn(async move {
                    navigator.close().await;
                });
                tracing::debug!("Browser lease dropped unreleased, closing in background");
            }
            Err(_) => tracing::warn!("Browser lease dropped outside a runtime, navigator not closed"),
        }
    }
}
