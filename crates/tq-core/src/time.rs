//! Time utilities for torq
//!
//! Provides the [`Clock`] seam, the polling primitive every device state
//! wait is built on, and timestamp helpers.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::error::Result;

/// Interval between predicate evaluations for every device state wait
pub const POLLING_INTERVAL: Duration = Duration::from_millis(500);

/// Source of time and blocking sleeps
pub trait Clock: Send + Sync {
    /// Current monotonic instant
    fn now(&self) -> Instant;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by `std::thread::sleep`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Virtual clock whose `sleep` advances time instantly.
///
/// Used by tests to drive multi-second waits deterministically.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    elapsed: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    /// Create a clock starting at zero elapsed time
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            elapsed: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Virtual time elapsed since creation
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock().unwrap_or_else(|e| e.into_inner()) += duration;
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        self.advance(duration);
    }
}

/// Wait until `predicate` is true, or give up after `timeout`.
///
/// The predicate is evaluated at least once, immediately, and again after
/// every `interval` sleep. Returns `Ok(true)` on the first true observation
/// and `Ok(false)` once more than `timeout` has elapsed without one. A fault
/// raised by the predicate propagates immediately.
pub fn poll_until<F>(
    clock: &dyn Clock,
    timeout: Duration,
    interval: Duration,
    mut predicate: F,
) -> Result<bool>
where
    F: FnMut() -> Result<bool>,
{
    let start = clock.now();
    loop {
        if predicate()? {
            return Ok(true);
        }
        if clock.now().duration_since(start) > timeout {
            return Ok(false);
        }
        clock.sleep(interval);
    }
}

/// Get the current Unix timestamp in milliseconds.
///
/// # Panics
/// Panics if the system time is before the Unix epoch (1970-01-01),
/// which would indicate a severely misconfigured system.
pub fn current_time_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time before UNIX epoch")
        .as_millis() as u64
}

/// Round a millisecond duration up to whole seconds
pub fn ceil_secs(ms: u64) -> u64 {
    ms.div_ceil(1000)
}
