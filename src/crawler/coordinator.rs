//! Crawl coordinator - caller-facing orchestration
//!
//! The coordinator turns a request into a session, seeds its frontier, leases
//! a navigator, runs a worker pool over it and reports what the session
//! collected. It owns its [`SessionManager`]; two coordinators share nothing.

use crate::config::Config;
use crate::crawler::discovery::LinkDiscovery;
use crate::crawler::extraction::{ContentExtraction, FollowLinks};
use crate::crawler::extractor::{Extractor, ReadableTextExtractor};
use crate::crawler::fetcher::HttpLauncher;
use crate::crawler::frontier::{EnqueueOutcome, Frontier};
use crate::crawler::navigator::{BrowserLauncher, BrowserLease};
use crate::crawler::pool::{PoolSettings, TaskHandler, WorkerPool};
use crate::crawler::rate_limiter::RateLimiter;
use crate::crawler::report::{DiscoveryReport, ExtractionReport};
use crate::session::{PoolHandle, Session, SessionId, SessionManager};
use crate::{CrawlError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    sessions: Arc<SessionManager>,
    launcher: Arc<dyn BrowserLauncher>,
    extractor: Arc<dyn Extractor>,
}

impl Coordinator {
    /// Creates a coordinator using the HTTP navigator and the built-in extractor
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(CrawlError)` - The HTTP client could not be built
    pub fn new(config: Config) -> Result<Self> {
        let launcher = HttpLauncher::new(&config.navigator).map_err(CrawlError::Launch)?;
        Ok(Self::with_collaborators(
            config,
            Arc::new(launcher),
            Arc::new(ReadableTextExtractor),
        ))
    }

    /// Creates a coordinator with caller-supplied navigation and extraction
    pub fn with_collaborators(
        config: Config,
        launcher: Arc<dyn BrowserLauncher>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(config.session.timeout()));
        Self {
            config: Arc::new(config),
            sessions,
            launcher,
            extractor,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The session registry, shared with the reaper
    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Discovers a site's internal content pages
    ///
    /// Crawls breadth-first from `seeds` up to `max-depth` link-hops and
    /// stops once `total-pages` internal links are known. Page failures are
    /// reported in the returned errors, never as `Err`.
    ///
    /// # Arguments
    ///
    /// * `seeds` - Start URLs; a missing scheme defaults to https
    /// * `session_id` - Session to (re)use; a running crawl under it is stopped first
    /// * `cancel` - Caller token; cancelling it aborts the crawl
    ///
    /// # Returns
    ///
    /// * `Ok(DiscoveryReport)` - Links and errors collected by the session
    /// * `Err(CrawlError::NoValidSeeds)` - None of the seeds was a usable URL
    pub async fn discover_links(
        &self,
        seeds: &[String],
        session_id: Option<SessionId>,
        cancel: Option<CancellationToken>,
    ) -> Result<DiscoveryReport> {
        let crawler = &self.config.crawler;
        let session = self.sessions.create(session_id, cancel.as_ref()).await;
        tracing::info!(
            "[{}] Discovering links from {} seed URL(s)",
            session.id(),
            seeds.len()
        );

        let frontier = self.seed_frontier(&session, seeds, crawler.max_depth)?;

        let handler = LinkDiscovery::new(
            Arc::clone(&session),
            crawler.max_depth,
            crawler.total_pages,
            crawler.request_timeout(),
        );
        let settings = PoolSettings {
            max_concurrency: crawler.max_concurrency,
            max_pages: Some(crawler.max_pages),
            max_retries: crawler.max_retries,
            retry_delay: crawler.retry_delay(),
        };
        self.run_pool(&session, frontier, handler, settings, crawler.max_requests_per_minute)
            .await;

        let report = DiscoveryReport::from_session(&session);
        tracing::info!(
            "[{}] Found {} internal links ({} errors)",
            session.id(),
            report.internal_links.len(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Extracts readable text from `urls`
    ///
    /// With `follow_links`, same-origin content links found on those pages
    /// are extracted too, within the crawler's depth and page-count limits.
    ///
    /// # Returns
    ///
    /// * `Ok(ExtractionReport)` - Texts, timings and errors collected by the session
    /// * `Err(CrawlError::NoValidSeeds)` - None of the URLs was usable
    pub async fn extract_content(
        &self,
        urls: &[String],
        follow_links: bool,
        session_id: Option<SessionId>,
        cancel: Option<CancellationToken>,
    ) -> Result<ExtractionReport> {
        let crawler = &self.config.crawler;
        let extraction = &self.config.extraction;
        let session = self.sessions.create(session_id, cancel.as_ref()).await;
        tracing::info!(
            "[{}] Extracting content from {} URL(s){}",
            session.id(),
            urls.len(),
            if follow_links { ", following links" } else { "" }
        );

        let frontier = self.seed_frontier(&session, urls, crawler.max_depth)?;

        let follow = follow_links.then_some(FollowLinks {
            max_depth: crawler.max_depth,
            total_pages: crawler.total_pages,
        });
        let handler = ContentExtraction::new(
            Arc::clone(&session),
            Arc::clone(&self.extractor),
            extraction.request_timeout(),
            follow,
        );
        let settings = PoolSettings {
            max_concurrency: extraction.max_concurrency,
            max_pages: None,
            max_retries: extraction.max_retries,
            retry_delay: crawler.retry_delay(),
        };
        self.run_pool(
            &session,
            frontier,
            handler,
            settings,
            extraction.max_requests_per_minute,
        )
        .await;

        let report = ExtractionReport::from_session(&session);
        tracing::info!(
            "[{}] Extracted {} page(s) ({} errors)",
            session.id(),
            report.results.len(),
            report.errors.len()
        );
        Ok(report)
    }

    /// Aborts a running session; true iff a pool was live
    pub async fn stop_session(&self, id: &SessionId) -> bool {
        self.sessions.stop(id).await
    }

    /// Stops a session and drops all of its state
    pub async fn cleanup_session(&self, id: &SessionId) {
        self.sessions.cleanup(id).await
    }

    /// Builds the session's frontier and enqueues the distinct seeds at depth 0
    ///
    /// Fails only when no seed is a usable URL. Seeds refused because the
    /// session was already aborted leave an empty frontier and an `Ok`.
    fn seed_frontier(
        &self,
        session: &Arc<Session>,
        seeds: &[String],
        max_depth: u32,
    ) -> Result<Arc<Frontier>> {
        let frontier = Arc::new(Frontier::new(Arc::clone(session), max_depth));
        self.sessions
            .attach_frontier(session, Arc::clone(&frontier));

        let mut seen = HashSet::new();
        let mut usable = 0;
        for seed in seeds.iter().filter(|seed| seen.insert(seed.as_str())) {
            match frontier.enqueue(seed, 0) {
                EnqueueOutcome::Admitted => usable += 1,
                EnqueueOutcome::Invalid => {}
                outcome => {
                    usable += 1;
                    tracing::debug!("Seed {} not queued: {:?}", seed, outcome);
                }
            }
        }

        if usable == 0 {
            tracing::warn!("[{}] No valid URLs provided", session.id());
            return Err(CrawlError::NoValidSeeds {
                errors: session.errors(),
            });
        }
        Ok(frontier)
    }

    /// Leases a navigator, runs a pool to completion and releases everything
    async fn run_pool<H: TaskHandler>(
        &self,
        session: &Arc<Session>,
        frontier: Arc<Frontier>,
        handler: H,
        settings: PoolSettings,
        max_requests_per_minute: u32,
    ) {
        if session.is_aborted() {
            tracing::info!("[{}] Session aborted before start", session.id());
            frontier.close();
            return;
        }

        let navigator = match self.launcher.launch().await {
            Ok(navigator) => navigator,
            Err(e) => {
                tracing::error!("[{}] Crawler execution error: {}", session.id(), e);
                session.record_error(format!("Crawler execution error: {}", e));
                frontier.close();
                return;
            }
        };

        let lease = Arc::new(BrowserLease::new(navigator));
        let (done_tx, done_rx) = watch::channel(false);
        self.sessions.attach_pool(
            session,
            PoolHandle::new(session.abort_token().clone(), &lease, done_rx),
        );

        let limiter = RateLimiter::new(max_requests_per_minute, settings.max_concurrency);
        let pool = WorkerPool::new(
            handler,
            Arc::clone(session),
            Arc::clone(&frontier),
            limiter,
            lease.navigator(),
            settings,
        );
        pool.run().await;

        frontier.close();
        lease.release().await;
        let _ = done_tx.send(true);
        self.sessions.detach_pool(session);
    }
}
