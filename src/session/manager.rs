//! Registry of live crawl sessions
//!
//! The manager owns every session together with its frontier and, while a
//! crawl runs, a handle on the worker pool. It is instance-owned: each
//! [`Coordinator`](crate::Coordinator) carries its own.

use crate::crawler::{BrowserLease, Frontier};
use crate::session::state::{lock, Session, SessionId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Handle on a running worker pool
///
/// The lease is held weakly: the pool's own future keeps it alive, so if
/// that future is dropped the lease's `Drop` still releases the browser.
#[derive(Debug)]
pub struct PoolHandle {
    abort: CancellationToken,
    lease: Weak<BrowserLease>,
    done: watch::Receiver<bool>,
}

impl PoolHandle {
    /// # Arguments
    ///
    /// * `abort` - Token the pool's workers observe
    /// * `lease` - Browser lease used by the pool
    /// * `done` - Flipped to `true` once the pool has wound down
    pub fn new(
        abort: CancellationToken,
        lease: &Arc<BrowserLease>,
        done: watch::Receiver<bool>,
    ) -> Self {
        Self {
            abort,
            lease: Arc::downgrade(lease),
            done,
        }
    }

    fn is_live(&self) -> bool {
        self.lease.strong_count() > 0 && !*self.done.borrow()
    }
}

#[derive(Debug)]
struct Entry {
    session: Arc<Session>,
    frontier: Option<Arc<Frontier>>,
    pool: Option<PoolHandle>,
}

/// Owns every session's state and lifecycle
#[derive(Debug)]
pub struct SessionManager {
    entries: Mutex<HashMap<SessionId, Entry>>,
    session_timeout: Duration,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(Duration::from_secs(3_600))
    }
}

impl SessionManager {
    /// Creates an empty registry whose sessions expire after `session_timeout`
    pub fn new(session_timeout: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            session_timeout,
        }
    }

    /// Creates (or resets) a session
    ///
    /// If a pool is still running under the same id it is stopped first, so
    /// at most one pool per id is ever live. The previous state is replaced.
    ///
    /// # Arguments
    ///
    /// * `id` - Session id to reuse; a fresh one is generated when `None`
    /// * `parent` - Caller cancellation token the session's abort token derives from
    ///
    /// # Returns
    ///
    /// The new session
    pub async fn create(
        &self,
        id: Option<SessionId>,
        parent: Option<&CancellationToken>,
    ) -> Arc<Session> {
        let id = match id {
            Some(id) => {
                if self.stop(&id).await {
                    tracing::info!("Stopped running crawl for reused session {}", id);
                }
                id
            }
            None => SessionId::generate(),
        };

        let session = Arc::new(Session::new(id.clone(), parent));
        let previous = lock(&self.entries).insert(
            id.clone(),
            Entry {
                session: Arc::clone(&session),
                frontier: None,
                pool: None,
            },
        );

        if let Some(frontier) = previous.and_then(|entry| entry.frontier) {
            frontier.dispose();
        }

        tracing::debug!("Created session {}", id);
        session
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        lock(&self.entries)
            .get(id)
            .map(|entry| Arc::clone(&entry.session))
    }

    /// Associates a frontier with the session it was built for
    pub fn attach_frontier(&self, session: &Arc<Session>, frontier: Arc<Frontier>) {
        let mut entries = lock(&self.entries);
        match entries.get_mut(session.id()) {
            Some(entry) if Arc::ptr_eq(&entry.session, session) => {
                if let Some(old) = entry.frontier.replace(frontier) {
                    old.dispose();
                }
            }
            _ => {
                tracing::warn!("Session {} not found, frontier not attached", session.id());
                frontier.dispose();
            }
        }
    }

    /// Records the pool now running for `session`
    pub fn attach_pool(&self, session: &Arc<Session>, pool: PoolHandle) {
        let mut entries = lock(&self.entries);
        match entries.get_mut(session.id()) {
            Some(entry) if Arc::ptr_eq(&entry.session, session) => entry.pool = Some(pool),
            _ => tracing::warn!("Session {} not found, pool not attached", session.id()),
        }
    }

    /// Forgets the pool of `session`
    ///
    /// A no-op if the id has meanwhile been reused by a newer session.
    pub fn detach_pool(&self, session: &Arc<Session>) {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get_mut(session.id()) {
            if Arc::ptr_eq(&entry.session, session) {
                entry.pool = None;
            }
        }
    }

    /// Aborts a session and waits for its pool to wind down
    ///
    /// Idempotent. Returns true iff a pool was live.
    pub async fn stop(&self, id: &SessionId) -> bool {
        let (session, pool) = {
            let mut entries = lock(&self.entries);
            match entries.get_mut(id) {
                Some(entry) => (Arc::clone(&entry.session), entry.pool.take()),
                None => return false,
            }
        };

        session.abort();

        let Some(mut pool) = pool else {
            return false;
        };
        let was_live = pool.is_live();

        pool.abort.cancel();
        if let Some(lease) = pool.lease.upgrade() {
            lease.release().await;
        }
        // Err means the pool's future was dropped, which also ends it
        let _ = pool.done.wait_for(|done| *done).await;

        if was_live {
            tracing::info!("Crawler for session {} stopped and resources released", id);
        }
        was_live
    }

    /// Stops a session and removes every trace of it
    ///
    /// Idempotent; unknown ids are ignored.
    pub async fn cleanup(&self, id: &SessionId) {
        self.stop(id).await;

        let removed = lock(&self.entries).remove(id);
        if let Some(entry) = removed {
            if let Some(frontier) = entry.frontier {
                frontier.dispose();
            }
            tracing::info!("Session {} cleaned up successfully", id);
        }
    }

    /// Ids of sessions older than the session timeout at `now`
    pub fn expired(&self, now: Instant) -> Vec<SessionId> {
        lock(&self.entries)
            .values()
            .filter(|entry| entry.session.age(now) > self.session_timeout)
            .map(|entry| entry.session.id().clone())
            .collect()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        lock(&self.entries).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn session_timeout(&self) -> Duration {
        self.session_timeout
    }
}
