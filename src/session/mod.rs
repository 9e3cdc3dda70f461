//! Session management
//!
//! Each crawl request runs inside a session that owns its visited set,
//! discovered links, errors and extraction results. This module contains:
//! - Session state and identifiers
//! - The session registry with create / stop / cleanup
//! - The reaper that expires stale sessions

mod manager;
mod reaper;
mod state;

pub use manager::{PoolHandle, SessionManager};
pub use reaper::{reap_expired, spawn_reaper, Clock, ManualClock, SystemClock};
pub use state::{Admission, OrderedSet, ProcessingTime, Session, SessionId};

pub(crate) use state::lock;
