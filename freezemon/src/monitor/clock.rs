//! Millisecond clocks shared by the event loop hooks and the sampler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic millisecond timestamps. Must never return 0.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Monotonic clock anchored to the wall clock at construction, so timestamps
/// can be rendered as time of day.
#[derive(Debug)]
pub struct SystemClock {
    origin: Instant,
    origin_wall_ms: u64,
}

impl SystemClock {
    #[must_use]
    pub fn new() -> Self {
        let wall = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
        Self {
            origin: Instant::now(),
            origin_wall_ms: u64::try_from(wall.as_millis()).unwrap_or(u64::MAX / 2).max(1),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        let elapsed = u64::try_from(self.origin.elapsed().as_millis()).unwrap_or(u64::MAX / 2);
        self.origin_wall_ms + elapsed
    }
}

/// Hand-driven clock for simulated-time tests
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Starts at `start_ms`; 0 is the idle sentinel, so it becomes 1
    #[must_use]
    pub fn new(start_ms: u64) -> Self {
        Self { now: AtomicU64::new(start_ms.max(1)) }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms.max(1), Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) -> u64 {
        self.now.fetch_add(ms, Ordering::SeqCst) + ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}
