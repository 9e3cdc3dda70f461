//! Background sweep that tears down expired sessions

use crate::session::manager::SessionManager;
use crate::session::state::{lock, SessionId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Source of the current instant used to judge session expiry
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Clock backed by `tokio::time::Instant::now`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new(start: Instant) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = lock(&self.now);
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *lock(&self.now)
    }
}

/// Cleans up every session that has outlived the manager's timeout
///
/// # Returns
///
/// The ids that were removed
pub async fn reap_expired(manager: &SessionManager, clock: &dyn Clock) -> Vec<SessionId> {
    let expired = manager.expired(clock.now());
    for id in &expired {
        tracing::info!("Session {} expired, cleaning up", id);
        manager.cleanup(id).await;
    }
    expired
}

/// Spawns the periodic reaper
///
/// The first sweep runs one `interval` after spawning. The task ends when
/// `shutdown` is cancelled.
///
/// # Arguments
///
/// * `manager` - Registry to sweep
/// * `interval` - Time between sweeps
/// * `clock` - Clock used to judge expiry
/// * `shutdown` - Token that stops the reaper
pub fn spawn_reaper(
    manager: Arc<SessionManager>,
    interval: Duration,
    clock: Arc<dyn Clock>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::debug!("Session reaper shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    let reaped = reap_expired(&manager, clock.as_ref()).await;
                    if !reaped.is_empty() {
                        tracing::info!("Reaped {} expired session(s)", reaped.len());
                    }
                }
            }
        }
    })
}
