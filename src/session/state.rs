//! Per-session crawl state
//!
//! A [`Session`] is shared between the workers of one pool through an `Arc`.
//! Every collection sits behind its own `std::sync::Mutex`; no lock is held
//! across an await point.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Opaque identifier of a crawl session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Wraps a caller-supplied identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh identifier of the form `session_<unix-millis>_<9 chars>`
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let suffix: String = uuid::Uuid::new_v4()
            .simple()
            .to_string()
            .chars()
            .take(9)
            .collect();
        Self(format!("session_{}_{}", millis, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Outcome of a capped insert into an [`OrderedSet`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Value inserted; `remaining` slots are left before the cap
    Admitted { remaining: usize },
    /// Value was already present
    Duplicate,
    /// The set is already at its cap
    Full,
}

#[derive(Debug, Default)]
struct OrderedInner {
    items: Vec<String>,
    index: HashSet<String>,
}

/// Insertion-ordered, de-duplicated set of strings
#[derive(Debug, Default)]
pub struct OrderedSet {
    inner: Mutex<OrderedInner>,
}

impl OrderedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning false if it was already present
    pub fn insert(&self, value: &str) -> bool {
        let mut inner = lock(&self.inner);
        if inner.index.contains(value) {
            return false;
        }
        inner.index.insert(value.to_string());
        inner.items.push(value.to_string());
        true
    }

    /// Inserts a value unless the set already holds `cap` entries
    ///
    /// The check and the insert happen under one lock, so concurrent callers
    /// can never push the set past `cap`.
    pub fn admit(&self, value: &str, cap: usize) -> Admission {
        let mut inner = lock(&self.inner);
        if inner.index.contains(value) {
            return Admission::Duplicate;
        }
        if inner.items.len() >= cap {
            return Admission::Full;
        }
        inner.index.insert(value.to_string());
        inner.items.push(value.to_string());
        Admission::Admitted {
            remaining: cap - inner.items.len(),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        lock(&self.inner).index.contains(value)
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the values in insertion order
    pub fn to_vec(&self) -> Vec<String> {
        lock(&self.inner).items.clone()
    }
}

/// Start and end timestamps of one page extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingTime {
    pub start: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub end: Option<DateTime<Utc>>,
}

/// Mutable state of one crawl session
#[derive(Debug)]
pub struct Session {
    id: SessionId,
    start_time: Instant,
    visited: Mutex<HashSet<String>>,
    discovered: OrderedSet,
    errors: OrderedSet,
    results: Mutex<BTreeMap<String, String>>,
    titles: Mutex<BTreeMap<String, String>>,
    processing_times: Mutex<BTreeMap<String, ProcessingTime>>,
    stop: AtomicBool,
    abort: CancellationToken,
}

impl Session {
    /// Creates an empty session
    ///
    /// When `parent` is given, the session's abort token is a child of it, so
    /// cancelling the caller's token aborts the session.
    pub fn new(id: SessionId, parent: Option<&CancellationToken>) -> Self {
        let abort = match parent {
            Some(token) => token.child_token(),
            None => CancellationToken::new(),
        };

        Self {
            id,
            start_time: Instant::now(),
            visited: Mutex::new(HashSet::new()),
            discovered: OrderedSet::new(),
            errors: OrderedSet::new(),
            results: Mutex::new(BTreeMap::new()),
            titles: Mutex::new(BTreeMap::new()),
            processing_times: Mutex::new(BTreeMap::new()),
            stop: AtomicBool::new(false),
            abort,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn start_time(&self) -> Instant {
        self.start_time
    }

    /// Age of the session measured against `now`
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.start_time)
    }

    /// Marks a canonical URL as visited; false if it already was
    pub fn mark_visited(&self, url: &str) -> bool {
        lock(&self.visited).insert(url.to_string())
    }

    pub fn is_visited(&self, url: &str) -> bool {
        lock(&self.visited).contains(url)
    }

    pub fn visited_count(&self) -> usize {
        lock(&self.visited).len()
    }

    /// Internal links discovered so far, capped by the crawl's page target
    pub fn discovered(&self) -> &OrderedSet {
        &self.discovered
    }

    /// Records a failure description; duplicates are dropped
    pub fn record_error(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!("[{}] {}", self.id, message);
        self.errors.insert(&message);
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.to_vec()
    }

    /// Records the moment processing of `url` started
    pub fn record_start(&self, url: &str) {
        lock(&self.processing_times).insert(
            url.to_string(),
            ProcessingTime {
                start: Utc::now(),
                end: None,
            },
        );
    }

    /// Stores the extracted text for `url` and stamps its end time
    pub fn record_result(&self, url: &str, text: String) {
        lock(&self.results).insert(url.to_string(), text);

        let now = Utc::now();
        lock(&self.processing_times)
            .entry(url.to_string())
            .and_modify(|time| time.end = Some(now))
            .or_insert(ProcessingTime {
                start: now,
                end: Some(now),
            });
    }

    pub fn record_title(&self, url: &str, title: String) {
        lock(&self.titles).insert(url.to_string(), title);
    }

    /// Document titles of extracted pages that declare one
    pub fn titles(&self) -> BTreeMap<String, String> {
        lock(&self.titles).clone()
    }

    pub fn has_result(&self, url: &str) -> bool {
        lock(&self.results).contains_key(url)
    }

    pub fn results(&self) -> BTreeMap<String, String> {
        lock(&self.results).clone()
    }

    pub fn processing_times(&self) -> BTreeMap<String, ProcessingTime> {
        lock(&self.processing_times).clone()
    }

    /// Asks the crawl to finish gracefully (target reached)
    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Cancels the session immediately
    pub fn abort(&self) {
        self.abort.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.abort.is_cancelled()
    }

    pub fn abort_token(&self) -> &CancellationToken {
        &self.abort
    }

    /// True once the session is stopped or aborted
    pub fn is_halted(&self) -> bool {
        self.is_stopped() || self.is_aborted()
    }
}

/// Locks a mutex, recovering the data if a worker panicked while holding it
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
