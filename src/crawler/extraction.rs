//! Readable content extraction
//!
//! The [`ContentExtraction`] handler loads each page, hands its markup to an
//! [`Extractor`] and stores the collapsed text under the URL it was asked
//! for. With `follow_links` it also feeds same-origin content links back into
//! the frontier, filtered exactly like link discovery.

use crate::crawler::deadline::with_deadline;
use crate::crawler::discovery::{admit_links, OnTarget};
use crate::crawler::extractor::{collapse_whitespace, Extractor};
use crate::crawler::frontier::Task;
use crate::crawler::navigator::Navigator;
use crate::crawler::pool::TaskHandler;
use crate::session::Session;
use crate::url::normalize_url;
use crate::NavigationError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Whether and how far extraction follows links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowLinks {
    pub max_depth: u32,
    pub total_pages: u32,
}

/// Task handler that extracts readable text
pub struct ContentExtraction {
    session: Arc<Session>,
    extractor: Arc<dyn Extractor>,
    request_timeout: Duration,
    follow: Option<FollowLinks>,
}

impl ContentExtraction {
    /// # Arguments
    ///
    /// * `session` - Session receiving results and errors
    /// * `extractor` - Readability implementation
    /// * `request_timeout` - Deadline for each navigator call
    /// * `follow` - Link-following limits, `None` to extract only the given URLs
    pub fn new(
        session: Arc<Session>,
        extractor: Arc<dyn Extractor>,
        request_timeout: Duration,
        follow: Option<FollowLinks>,
    ) -> Self {
        Self {
            session,
            extractor,
            request_timeout,
            follow,
        }
    }
}

#[async_trait]
impl TaskHandler for ContentExtraction {
    async fn handle(
        &self,
        task: &Task,
        navigator: &Arc<dyn Navigator>,
    ) -> Result<Vec<String>, NavigationError> {
        let session = &self.session;
        if session.is_aborted() {
            tracing::info!("Skipping {} - session has been aborted", task.url);
            return Ok(Vec::new());
        }

        let Some(url) = normalize_url(&task.url) else {
            session.record_error(format!("Invalid URL provided: {}", task.url));
            return Ok(Vec::new());
        };

        if task.attempt == 0 && !session.mark_visited(url.as_str()) {
            tracing::debug!("Skipping {} - already processed", url);
            return Ok(Vec::new());
        }

        session.record_start(&task.url);
        tracing::info!("[{}] Starting to process: {}", session.id(), task.url);

        let timeout = self.request_timeout;
        let page = with_deadline("Loading page", timeout, navigator.load(&url, timeout)).await?;
        let markup = with_deadline(
            "Fetching page content",
            timeout,
            navigator.raw_markup(&page),
        )
        .await?;

        let article = self
            .extractor
            .parse(&markup, &page.url)
            .map(|article| (collapse_whitespace(&article.text_content), article.title))
            .filter(|(text, _)| !text.is_empty());

        match article {
            Some((text, title)) => {
                if let Some(title) = title {
                    session.record_title(&task.url, title);
                }
                session.record_result(&task.url, text);
                tracing::info!("[{}] Finished processing: {}", session.id(), task.url);
            }
            None => {
                tracing::warn!("Could not extract readable content from: {}", task.url);
                session.record_error(format!(
                    "Could not extract readable content from: {}",
                    task.url
                ));
            }
        }

        let Some(follow) = self.follow else {
            return Ok(Vec::new());
        };
        if task.depth >= follow.max_depth || session.is_halted() {
            return Ok(Vec::new());
        }

        let links = with_deadline(
            "Extracting links",
            timeout,
            navigator.extract_outbound_links(&page),
        )
        .await?;
        // Reaching the link target ends following, not extraction
        Ok(admit_links(
            session,
            &url,
            links,
            follow.total_pages,
            OnTarget::Continue,
        ))
    }

    fn on_failed(&self, task: &Task, error: &NavigationError) {
        if self.session.has_result(&task.url) {
            return;
        }
        tracing::error!("Failed to scrape {}: {}", task.url, error);
        self.session
            .record_error(format!("Failed to scrape {}: {}", task.url, error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::extractor::ReadableTextExtractor;
    use crate::crawler::navigator::PageHandle;
    use crate::session::SessionId;
    use std::collections::HashMap;
    use url::Url;

    struct StaticPages {
        pages: HashMap<String, String>,
    }

    #[async_trait]
    impl Navigator for StaticPages {
        async fn load(&self, url: &Url, _timeout: Duration) -> Result<PageHandle, NavigationError> {
            match self.pages.get(url.as_str()) {
                Some(markup) => Ok(PageHandle::new(url.clone(), markup.clone())),
                None => Err(NavigationError::HttpStatus {
                    url: url.to_string(),
                    status: 404,
                }),
            }
        }

        async fn extract_outbound_links(
            &self,
            page: &PageHandle,
        ) -> Result<Vec<String>, NavigationError> {
            Ok(crate::crawler::parser::extract_links(&page.markup, &page.url))
        }

        async fn raw_markup(&self, page: &PageHandle) -> Result<String, NavigationError> {
            Ok(page.markup.clone())
        }

        async fn close(&self) {}
    }

    fn create_test_navigator() -> Arc<dyn Navigator> {
        Arc::new(StaticPages {
            pages: HashMap::from([
                (
                    "https://example.com/post".to_string(),
                    r#"<html><body><article><p>Hello
                        world</p></article><a href="/next">Next</a><a href="/pricing">Plans</a></body></html>"#
                        .to_string(),
                ),
                (
                    "https://example.com/titled".to_string(),
                    r#"<html><head><title> Release notes </title></head>
                        <body><main>Version two</main></body></html>"#
                        .to_string(),
                ),
                (
                    "https://example.com/hub".to_string(),
                    r#"<html><body><p>Hub</p><a href="/one">1</a><a href="/two">2</a>
                        <a href="/three">3</a></body></html>"#
                        .to_string(),
                ),
                (
                    "https://example.com/empty".to_string(),
                    "<html><body></body></html>".to_string(),
                ),
            ]),
        })
    }

    fn create_handler(follow: Option<FollowLinks>) -> (Arc<Session>, ContentExtraction) {
        let session = Arc::new(Session::new(SessionId::new("extraction-test"), None));
        let handler = ContentExtraction::new(
            Arc::clone(&session),
            Arc::new(ReadableTextExtractor),
            Duration::from_secs(5),
            follow,
        );
        (session, handler)
    }

    fn task(url: &str) -> Task {
        Task {
            url: url.to_string(),
            depth: 0,
            session_id: SessionId::new("extraction-test"),
            attempt: 0,
        }
    }

    #[tokio::test]
    async fn test_extracts_collapsed_text() {
        let (session, handler) = create_handler(None);
        let children = handler
            .handle(&task("https://example.com/post"), &create_test_navigator())
            .await
            .unwrap();

        assert!(children.is_empty());
        assert_eq!(session.results()["https://example.com/post"], "Hello world");
        let times = session.processing_times();
        assert!(times["https://example.com/post"].end.is_some());
        assert!(session.errors().is_empty());
    }

    #[tokio::test]
    async fn test_empty_page_records_error() {
        let (session, handler) = create_handler(None);
        handler
            .handle(&task("https://example.com/empty"), &create_test_navigator())
            .await
            .unwrap();

        assert!(session.results().is_empty());
        assert!(session.processing_times()["https://example.com/empty"].end.is_none());
        assert_eq!(
            session.errors(),
            vec!["Could not extract readable content from: https://example.com/empty"]
        );
    }

    #[tokio::test]
    async fn test_follow_links_returns_filtered_children() {
        let (_session, handler) = create_handler(Some(FollowLinks {
            max_depth: 2,
            total_pages: 5,
        }));
        let children = handler
            .handle(&task("https://example.com/post"), &create_test_navigator())
            .await
            .unwrap();

        assert_eq!(children, vec!["https://example.com/next"]);
    }

    #[tokio::test]
    async fn test_records_title() {
        let (session, handler) = create_handler(None);
        handler
            .handle(&task("https://example.com/titled"), &create_test_navigator())
            .await
            .unwrap();

        assert_eq!(session.results()["https://example.com/titled"], "Version two");
        assert_eq!(session.titles()["https://example.com/titled"], "Release notes");
        assert!(session.titles().get("https://example.com/post").is_none());
    }

    #[tokio::test]
    async fn test_follow_links_at_target_keeps_session_running() {
        let (session, handler) = create_handler(Some(FollowLinks {
            max_depth: 2,
            total_pages: 2,
        }));
        let children = handler
            .handle(&task("https://example.com/hub"), &create_test_navigator())
            .await
            .unwrap();

        assert_eq!(
            children,
            vec!["https://example.com/one", "https://example.com/two"]
        );
        assert!(!session.is_halted());
        assert_eq!(session.results()["https://example.com/hub"], "Hub 1 2 3");
    }

    #[tokio::test]
    async fn test_failed_hook_skips_urls_with_results() {
        let (session, handler) = create_handler(None);
        let error = NavigationError::Other("boom".to_string());

        session.record_result("https://example.com/done", "text".to_string());
        handler.on_failed(&task("https://example.com/done"), &error);
        handler.on_failed(&task("https://example.com/missing"), &error);

        assert_eq!(
            session.errors(),
            vec!["Failed to scrape https://example.com/missing: boom"]
        );
    }
}
