//! Per-session work queue
//!
//! The frontier hands tasks to workers in FIFO order, which keeps the crawl
//! approximately breadth-first. It tracks how many tasks are in flight so a
//! waiting worker can tell "nothing queued yet" apart from "crawl finished".

use crate::session::{lock, Session, SessionId};
use crate::url::normalize_url;
use futures::stream::{self, Stream};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// One unit of work: a URL at a given depth
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// URL as enqueued (seeds keep the caller's spelling)
    pub url: String,

    /// Link-hops from the seed
    pub depth: u32,

    pub session_id: SessionId,

    /// Retry counter, 0 for the first try
    pub attempt: u32,
}

impl Task {
    /// The same task, one attempt later
    pub fn retry(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

/// Result of [`Frontier::enqueue`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Admitted,
    /// Already queued earlier in this session
    Duplicate,
    /// Already visited in this session
    Visited,
    /// Deeper than the crawl's depth limit
    TooDeep,
    /// The session is stopped or aborted
    Halted,
    /// The frontier is closed or disposed
    Closed,
    /// Not a usable http(s) URL; recorded in the session's errors
    Invalid,
}

#[derive(Debug, Default)]
struct FrontierState {
    queue: VecDeque<Task>,
    queued: HashSet<String>,
    in_flight: usize,
    closed: bool,
    disposed: bool,
}

/// Work queue of one session
#[derive(Debug)]
pub struct Frontier {
    session: Arc<Session>,
    max_depth: u32,
    state: Mutex<FrontierState>,
    notify: Notify,
}

impl Frontier {
    pub fn new(session: Arc<Session>, max_depth: u32) -> Self {
        Self {
            session,
            max_depth,
            state: Mutex::new(FrontierState::default()),
            notify: Notify::new(),
        }
    }

    /// Offers a URL to the queue
    ///
    /// Never fails: rejections are reported through the outcome, and
    /// unusable URLs are also recorded as `Invalid URL provided: <url>`.
    pub fn enqueue(&self, url: &str, depth: u32) -> EnqueueOutcome {
        if self.session.is_halted() {
            return EnqueueOutcome::Halted;
        }
        if depth > self.max_depth {
            return EnqueueOutcome::TooDeep;
        }

        let key = match normalize_url(url) {
            Some(normalized) if matches!(normalized.scheme(), "http" | "https") => {
                normalized.to_string()
            }
            _ => {
                self.session
                    .record_error(format!("Invalid URL provided: {}", url));
                return EnqueueOutcome::Invalid;
            }
        };

        if self.session.is_visited(&key) {
            return EnqueueOutcome::Visited;
        }

        {
            let mut state = lock(&self.state);
            if state.closed {
                return EnqueueOutcome::Closed;
            }
            if !state.queued.insert(key) {
                return EnqueueOutcome::Duplicate;
            }
            state.queue.push_back(Task {
                url: url.to_string(),
                depth,
                session_id: self.session.id().clone(),
                attempt: 0,
            });
        }

        self.notify.notify_waiters();
        EnqueueOutcome::Admitted
    }

    /// Puts a task back for another attempt, bypassing dedup
    ///
    /// Returns false if the frontier is closed.
    pub fn requeue(&self, task: Task) -> bool {
        {
            let mut state = lock(&self.state);
            if state.closed {
                return false;
            }
            state.queue.push_back(task);
        }
        self.notify.notify_waiters();
        true
    }

    /// Takes the next task, waiting while others are still in flight
    ///
    /// Returns `None` once the queue is empty with nothing in flight, the
    /// frontier is closed, or `cancel` fires. Every task returned must be
    /// matched by a call to [`task_done`](Frontier::task_done).
    pub async fn next(&self, cancel: &CancellationToken) -> Option<Task> {
        loop {
            if cancel.is_cancelled() {
                return None;
            }

            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = lock(&self.state);
                if state.closed {
                    return None;
                }
                if let Some(task) = state.queue.pop_front() {
                    state.in_flight += 1;
                    return Some(task);
                }
                if state.in_flight == 0 {
                    return None;
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = &mut notified => {}
            }
        }
    }

    /// Lazy stream of tasks, ending under the same conditions as [`next`](Frontier::next)
    pub fn drain(&self, cancel: CancellationToken) -> impl Stream<Item = Task> + '_ {
        stream::unfold(cancel, move |cancel| async move {
            let task = self.next(&cancel).await?;
            Some((task, cancel))
        })
    }

    /// Marks one in-flight task as finished
    pub fn task_done(&self) {
        let exhausted = {
            let mut state = lock(&self.state);
            state.in_flight = state.in_flight.saturating_sub(1);
            state.in_flight == 0 && state.queue.is_empty()
        };
        if exhausted {
            self.notify.notify_waiters();
        }
    }

    /// Stops handing out work and wakes every waiting worker
    pub fn close(&self) {
        lock(&self.state).closed = true;
        self.notify.notify_waiters();
    }

    /// Closes the frontier and drops everything queued; idempotent
    pub fn dispose(&self) {
        {
            let mut state = lock(&self.state);
            if state.disposed {
                return;
            }
            state.closed = true;
            state.disposed = true;
            state.queue = VecDeque::new();
            state.queued = HashSet::new();
        }
        self.notify.notify_waiters();
        tracing::debug!("Frontier for session {} disposed", self.session.id());
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.state).closed
    }

    /// Number of tasks waiting to be handed out
    pub fn len(&self) -> usize {
        lock(&self.state).queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn in_flight(&self) -> usize {
        lock(&self.state).in_flight
    }
}
