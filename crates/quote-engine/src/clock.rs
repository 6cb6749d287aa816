//! Time sources.
//!
//! Monotonic time comes from tokio's clock so that paused-time tests drive
//! cache TTLs, backoff delays and the debounce timer consistently.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use log::warn;
use tokio::time::Instant;

/// Monotonic time plus the current calendar date.
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Current local calendar date.
    fn today(&self) -> NaiveDate;
}

/// Wall clock backed by tokio time and the local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Manually advanced clock for tests and replays.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    today: NaiveDate,
}

impl ManualClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            state: Mutex::new(ManualState {
                now: Instant::now(),
                today,
            }),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ManualState> {
        self.state.lock().unwrap_or_else(|poisoned| {
            warn!("Manual clock mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Moves monotonic time forward.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock_state();
        state.now += by;
    }

    pub fn set_today(&self, today: NaiveDate) {
        self.lock_state().today = today;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.lock_state().now
    }

    fn today(&self) -> NaiveDate {
        self.lock_state().today
    }
}
