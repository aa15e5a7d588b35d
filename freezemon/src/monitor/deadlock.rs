//! Probable-deadlock detection.

/// Flags a dispatch that has been running longer than the deadlock threshold,
/// at most once per stall.
///
/// A stall is identified by its last-active timestamp; a new dispatch (new
/// timestamp) re-arms the tracker. A zero timestamp means the event loop is
/// sleeping and never counts as a stall.
#[derive(Debug, Clone)]
pub struct DeadlockTracker {
    threshold_ms: u64,
    reported_for: Option<u64>,
}

impl DeadlockTracker {
    #[must_use]
    pub fn new(threshold_ms: u64) -> Self {
        Self { threshold_ms, reported_for: None }
    }

    /// Returns true the first time the stall starting at `last_active_ms`
    /// exceeds the threshold.
    pub fn check(&mut self, now_ms: u64, last_active_ms: u64) -> bool {
        if last_active_ms == 0 || self.reported_for == Some(last_active_ms) {
            return false;
        }
        if now_ms.saturating_sub(last_active_ms) > self.threshold_ms {
            self.reported_for = Some(last_active_ms);
            return true;
        }
        false
    }

    /// True if the stall starting at `last_active_ms` was already reported
    #[must_use]
    pub fn was_reported(&self, last_active_ms: u64) -> bool {
        last_active_ms != 0 && self.reported_for == Some(last_active_ms)
    }
}
