//! Internal link discovery
//!
//! The [`LinkDiscovery`] handler loads a page, keeps the outbound links that
//! stay on the same origin and point at content, and admits them into the
//! session's discovered links until the target count is reached.

use crate::crawler::deadline::with_deadline;
use crate::crawler::frontier::Task;
use crate::crawler::navigator::Navigator;
use crate::crawler::pool::TaskHandler;
use crate::session::{Admission, Session};
use crate::url::{classify_link, is_non_content_url, normalize_url, LinkVerdict};
use crate::NavigationError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Task handler that collects internal links
pub struct LinkDiscovery {
    session: Arc<Session>,
    max_depth: u32,
    total_pages: u32,
    request_timeout: Duration,
}

impl LinkDiscovery {
    pub fn new(
        session: Arc<Session>,
        max_depth: u32,
        total_pages: u32,
        request_timeout: Duration,
    ) -> Self {
        Self {
            session,
            max_depth,
            total_pages,
            request_timeout,
        }
    }
}

#[async_trait]
impl TaskHandler for LinkDiscovery {
    async fn handle(
        &self,
        task: &Task,
        navigator: &Arc<dyn Navigator>,
    ) -> Result<Vec<String>, NavigationError> {
        let session = &self.session;
        if session.is_halted() {
            return Ok(Vec::new());
        }

        let Some(url) = normalize_url(&task.url) else {
            session.record_error(format!("Invalid URL: {}", task.url));
            return Ok(Vec::new());
        };

        if task.depth > self.max_depth {
            tracing::debug!("Skipping {} - depth {} exceeds limit", url, task.depth);
            return Ok(Vec::new());
        }

        if is_non_content_url(&url) {
            tracing::debug!("Skipping non-content URL: {}", url);
            return Ok(Vec::new());
        }

        if task.attempt == 0 && !session.mark_visited(url.as_str()) {
            tracing::debug!("Skipping {} - already visited", url);
            return Ok(Vec::new());
        }

        tracing::info!("[{}] Crawling {} (depth {})", session.id(), url, task.depth);

        let timeout = self.request_timeout;
        let page = with_deadline("Loading page", timeout, navigator.load(&url, timeout)).await?;
        let links = with_deadline(
            "Extracting links",
            timeout,
            navigator.extract_outbound_links(&page),
        )
        .await?;

        Ok(admit_links(
            session,
            &url,
            links,
            self.total_pages,
            OnTarget::Stop,
        ))
    }

    fn on_failed(&self, task: &Task, error: &NavigationError) {
        let url = normalize_url(&task.url)
            .map(|url| url.to_string())
            .unwrap_or_else(|| task.url.clone());
        tracing::error!("Failed request: {} - {}", url, error);
        self.session
            .record_error(format!("Failed request: {} - {}", url, error));
    }
}

/// What reaching the link target does to a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OnTarget {
    /// Stop the session; the crawl is done once the target is met
    Stop,
    /// Refuse further links but keep processing queued work
    Continue,
}

/// Filters a page's links and admits them into the session's discovered set
///
/// A link is kept if it normalizes, shares the page's origin, carries no
/// fragment, is not a non-content page and has not been visited. Admission
/// stops for good once `total_pages` links are held. With [`OnTarget::Stop`]
/// the session is then stopped and no children are returned; with
/// [`OnTarget::Continue`] the links admitted so far are still returned.
///
/// # Returns
///
/// The newly admitted links, to be processed one level deeper
pub(crate) fn admit_links(
    session: &Session,
    page_url: &Url,
    links: Vec<String>,
    total_pages: u32,
    on_target: OnTarget,
) -> Vec<String> {
    let cap = total_pages as usize;
    let mut children = Vec::new();

    for link in links {
        if session.is_halted() {
            break;
        }

        let candidate = match classify_link(&link, page_url) {
            LinkVerdict::Accept(candidate) => candidate.to_string(),
            _ => continue,
        };
        if session.is_visited(&candidate) {
            continue;
        }

        match session.discovered().admit(&candidate, cap) {
            Admission::Admitted { remaining } => {
                tracing::debug!("Discovered {}", candidate);
                children.push(candidate);
                if remaining == 0 {
                    tracing::info!(
                        "[{}] Reached target of {} internal links",
                        session.id(),
                        total_pages
                    );
                    if on_target == OnTarget::Stop {
                        session.stop();
                    }
                    break;
                }
            }
            Admission::Duplicate => {}
            Admission::Full => {
                if on_target == OnTarget::Stop {
                    session.stop();
                }
                break;
            }
        }
    }

    if session.is_halted() {
        Vec::new()
    } else {
        children
    }
}
