//! Bounded-concurrency worker pool
//!
//! The pool drains a session's [`Frontier`] with up to `max_concurrency`
//! workers. What a worker does with a task is decided by a
//! [`TaskHandler`]; retries, rate limiting, page budgets and cancellation
//! are handled here, identically for link discovery and content extraction.

use crate::crawler::frontier::{Frontier, Task};
use crate::crawler::navigator::Navigator;
use crate::crawler::rate_limiter::RateLimiter;
use crate::session::Session;
use crate::{FailureKind, NavigationError};
use async_trait::async_trait;
use futures::StreamExt;
use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

/// Per-task behaviour plugged into a [`WorkerPool`]
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Processes one task, returning the links to enqueue at `depth + 1`
    async fn handle(
        &self,
        task: &Task,
        navigator: &Arc<dyn Navigator>,
    ) -> Result<Vec<String>, NavigationError>;

    /// Called once a task has failed for good
    fn on_failed(&self, task: &Task, error: &NavigationError);
}

/// Limits applied by a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_concurrency: u32,

    /// Budget of tasks dispatched (first attempts only); unlimited when `None`
    pub max_pages: Option<u32>,

    pub max_retries: u32,
    pub retry_delay: Duration,
}

/// Summary of a finished pool run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// First attempts handed to the handler
    pub dispatched: u32,

    /// Workers that ended in a panic
    pub panicked: u32,
}

struct Shared<H> {
    handler: H,
    session: Arc<Session>,
    frontier: Arc<Frontier>,
    limiter: RateLimiter,
    navigator: Arc<dyn Navigator>,
    settings: PoolSettings,
    dispatched: AtomicU32,
}

/// Worker pool bound to one session
pub struct WorkerPool<H> {
    shared: Arc<Shared<H>>,
}

impl<H: TaskHandler> WorkerPool<H> {
    /// # Arguments
    ///
    /// * `handler` - What to do with each task
    /// * `session` - Session whose stop flag and abort token the workers obey
    /// * `frontier` - Queue to drain
    /// * `limiter` - Request budget shared by all workers
    /// * `navigator` - Leased navigator
    /// * `settings` - Pool limits
    pub fn new(
        handler: H,
        session: Arc<Session>,
        frontier: Arc<Frontier>,
        limiter: RateLimiter,
        navigator: Arc<dyn Navigator>,
        settings: PoolSettings,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                handler,
                session,
                frontier,
                limiter,
                navigator,
                settings,
                dispatched: AtomicU32::new(0),
            }),
        }
    }

    /// Runs the workers until the frontier is exhausted, the session is
    /// stopped or aborted, or the page budget is spent
    ///
    /// A worker panic is recorded as `Crawler execution error: ...`; the
    /// remaining workers carry on.
    pub async fn run(self) -> PoolStats {
        let width = self.shared.settings.max_concurrency.max(1);
        let mut workers = JoinSet::new();

        for worker_id in 0..width {
            let shared = Arc::clone(&self.shared);
            workers.spawn(async move { work(shared, worker_id).await });
        }

        let mut panicked = 0;
        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    panicked += 1;
                    let message = panic_message(e.into_panic());
                    tracing::error!(
                        "[{}] Crawler execution error: {}",
                        self.shared.session.id(),
                        message
                    );
                    self.shared
                        .session
                        .record_error(format!("Crawler execution error: {}", message));
                }
            }
        }

        let stats = PoolStats {
            dispatched: self.shared.dispatched.load(Ordering::SeqCst),
            panicked,
        };
        tracing::debug!(
            "[{}] Pool finished: {} pages dispatched",
            self.shared.session.id(),
            stats.dispatched
        );
        stats
    }
}

/// Marks the current task finished however the iteration ends
struct InFlight<'a>(&'a Frontier);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.task_done();
    }
}

async fn work<H: TaskHandler>(shared: Arc<Shared<H>>, worker_id: u32) {
    let session = &shared.session;
    let frontier = &shared.frontier;
    let abort = session.abort_token().clone();

    let tasks = frontier.drain(abort.clone());
    tokio::pin!(tasks);

    while let Some(task) = tasks.next().await {
        let _in_flight = InFlight(frontier);

        if session.is_halted() {
            frontier.close();
            break;
        }

        if task.attempt == 0 {
            if let Some(max_pages) = shared.settings.max_pages {
                let dispatched = shared.dispatched.fetch_add(1, Ordering::SeqCst);
                if dispatched >= max_pages {
                    shared.dispatched.fetch_sub(1, Ordering::SeqCst);
                    tracing::info!("[{}] Page budget of {} reached", session.id(), max_pages);
                    frontier.close();
                    break;
                }
            } else {
                shared.dispatched.fetch_add(1, Ordering::SeqCst);
            }
        }

        if !shared.limiter.acquire(&abort).await {
            break;
        }

        tracing::trace!("Worker {} processing {}", worker_id, task.url);
        let outcome = tokio::select! {
            biased;
            _ = abort.cancelled() => None,
            result = shared.handler.handle(&task, &shared.navigator) => Some(result),
        };

        match outcome {
            None => break,
            Some(Ok(children)) => {
                if !session.is_halted() {
                    for child in children {
                        frontier.enqueue(&child, task.depth + 1);
                    }
                }
            }
            Some(Err(error)) => {
                if session.is_aborted() {
                    break;
                }
                log_failure(&task, &error);

                if error.is_transient() && task.attempt < shared.settings.max_retries {
                    tracing::info!(
                        "Retrying {} in {:?} (attempt {}/{})",
                        task.url,
                        shared.settings.retry_delay,
                        task.attempt + 1,
                        shared.settings.max_retries
                    );
                    tokio::select! {
                        _ = abort.cancelled() => break,
                        _ = tokio::time::sleep(shared.settings.retry_delay) => {}
                    }
                    if !frontier.requeue(task.retry()) {
                        shared.handler.on_failed(&task, &error);
                    }
                } else {
                    shared.handler.on_failed(&task, &error);
                }
            }
        }

        if session.is_halted() {
            frontier.close();
        }
    }
}

fn log_failure(task: &Task, error: &NavigationError) {
    let kind = match error.classify() {
        FailureKind::ConnectionTimedOut => "Connection timed out",
        FailureKind::ConnectionRefused => "Connection refused",
        FailureKind::ConnectionReset => "Connection reset",
        FailureKind::EmptyResponse => "Empty response",
        FailureKind::Timeout => "Timeout",
        FailureKind::ServerError => "Server error",
        FailureKind::ClientError => "Client error",
        FailureKind::Closed => "Browser closed",
        FailureKind::Other => "Request failed",
    };
    tracing::warn!("{} for {}: {}", kind, task.url, error);
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}
