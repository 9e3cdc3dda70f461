//! Per-session request rate limiting
//!
//! A token bucket refilled continuously at `max_requests_per_minute / 60s`.
//! Burst capacity is `min(max_requests_per_minute, max_concurrency)`, so a
//! fresh pool can start all its workers at once without exceeding the
//! per-minute budget.

use crate::session::lock;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Shortest sleep between refill checks
const MIN_WAIT: Duration = Duration::from_millis(1);

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    last_refill: Instant,
}

/// Token bucket shared by all workers of one pool
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
    capacity: f64,
    per_second: f64,
}

impl RateLimiter {
    /// Creates a full bucket
    ///
    /// # Arguments
    ///
    /// * `max_requests_per_minute` - Sustained request budget
    /// * `max_concurrency` - Pool width, caps the burst
    pub fn new(max_requests_per_minute: u32, max_concurrency: u32) -> Self {
        let per_minute = max_requests_per_minute.max(1);
        let capacity = per_minute.min(max_concurrency.max(1)) as f64;

        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
            capacity,
            per_second: per_minute as f64 / 60.0,
        }
    }

    /// Waits for a token
    ///
    /// Returns false if `cancel` fires first.
    pub async fn acquire(&self, cancel: &CancellationToken) -> bool {
        loop {
            if cancel.is_cancelled() {
                return false;
            }

            let wait = match self.try_take() {
                None => return true,
                Some(wait) => wait,
            };

            tokio::select! {
                _ = cancel.cancelled() => return false,
                _ = tokio::time::sleep(wait) => {}
            }
        }
    }

    /// Takes a token if one is available, otherwise returns how long to wait
    fn try_take(&self) -> Option<Duration> {
        let mut bucket = lock(&self.bucket);
        let now = Instant::now();
        let elapsed = now.saturating_duration_since(bucket.last_refill).as_secs_f64();
        bucket.tokens = (bucket.tokens + elapsed * self.per_second).min(self.capacity);
        bucket.last_refill = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            return None;
        }

        let missing = 1.0 - bucket.tokens;
        Some(Duration::from_secs_f64(missing / self.per_second).max(MIN_WAIT))
    }

    pub fn capacity(&self) -> u32 {
        self.capacity as u32
    }
}
