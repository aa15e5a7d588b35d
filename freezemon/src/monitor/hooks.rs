//! Event loop side of the monitor
//!
//! The event loop reports four transitions: begin/end of a dispatched event and
//! begin/end of idle sleep. Each transition measures the time since the last
//! one; a gap at or above the long-event threshold is handed to the sampler
//! through a single-slot mailbox, and the sampler is woken immediately.
//!
//! ## Shared State
//!
//! | field | writer | reader |
//! |---|---|---|
//! | `event_start_or_resume` | event loop | sampler |
//! | `mailbox` | event loop (overwrite) | sampler (take) |
//! | `cancelled` | owner | both |
//!
//! Zero in `event_start_or_resume` means "not dispatching".

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender};
use freezemon_common::LongEventInfo;
use log::trace;

use super::clock::Clock;

pub(crate) struct Shared {
    event_start_or_resume: AtomicU64,
    mailbox: Mutex<Option<LongEventInfo>>,
    wake_tx: Sender<()>,
    wake_rx: Receiver<()>,
    cancelled: AtomicBool,
    long_event_threshold_ms: u64,
}

impl Shared {
    fn new(long_event_threshold_ms: u64) -> Self {
        let (wake_tx, wake_rx) = bounded(1);
        Self {
            event_start_or_resume: AtomicU64::new(0),
            mailbox: Mutex::new(None),
            wake_tx,
            wake_rx,
            cancelled: AtomicBool::new(false),
            long_event_threshold_ms,
        }
    }

    /// Start of the current dispatch, 0 while sleeping
    pub(crate) fn active_since(&self) -> u64 {
        self.event_start_or_resume.load(Ordering::Acquire)
    }

    /// Record the start of the running dispatch (0: sleeping)
    pub(crate) fn set_active(&self, start_ms: u64) {
        self.event_start_or_resume.store(start_ms, Ordering::Release);
    }

    /// Replace whatever is in the mailbox and wake the sampler
    pub(crate) fn publish(&self, info: LongEventInfo) {
        *self.mailbox.lock().unwrap_or_else(PoisonError::into_inner) = Some(info);
        self.wake();
    }

    pub(crate) fn take_published(&self) -> Option<LongEventInfo> {
        self.mailbox.lock().unwrap_or_else(PoisonError::into_inner).take()
    }

    pub(crate) fn wake(&self) {
        // A pending wake-up is as good as a new one
        let _ = self.wake_tx.try_send(());
    }

    /// Interruptible sleep: returns early on [`Shared::wake`]
    pub(crate) fn sleep(&self, timeout: Duration) {
        // Timeout and wake-up both just end the sleep; the sender lives in
        // `self`, so the channel never disconnects
        let _ = self.wake_rx.recv_timeout(timeout);
    }

    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.wake();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

/// Transition callbacks for the monitored event loop.
///
/// Call these from the event loop thread only. Clones share state, so a clone
/// can be moved into runtime callbacks (see [`crate::runtime::instrument`]).
/// After the monitor shuts down, every callback is a no-op.
#[derive(Clone)]
pub struct EventLoopHooks {
    shared: Arc<Shared>,
    clock: Arc<dyn Clock>,
}

impl EventLoopHooks {
    /// Hooks that are not yet attached to a sampling thread.
    ///
    /// [`crate::monitor::EventLoopMonitor::start`] creates these itself; this
    /// constructor is for driving a [`crate::monitor::Sampler`] by hand.
    pub fn new(long_event_threshold_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self { shared: Arc::new(Shared::new(long_event_threshold_ms)), clock }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// An event is about to be dispatched
    pub fn begin_event(&self) {
        self.transition(true);
    }

    /// A dispatched event returned; the enclosing dispatch (if any) resumes
    pub fn end_event(&self) {
        self.transition(true);
    }

    /// The event loop is about to wait for work
    pub fn begin_sleep(&self) {
        self.transition(false);
    }

    /// The event loop woke up
    pub fn end_sleep(&self) {
        self.transition(true);
    }

    /// Start of the current dispatch, `None` while sleeping
    #[must_use]
    pub fn dispatch_start_ms(&self) -> Option<u64> {
        Some(self.shared.active_since()).filter(|&t| t != 0)
    }

    fn transition(&self, active_after: bool) {
        if self.shared.is_cancelled() {
            return;
        }
        let now = self.clock.now_ms();
        let start = self.shared.active_since();

        // Store the new state first: once the sampler sees the mailbox it must
        // also see that the reported dispatch is over.
        self.shared.set_active(if active_after { now } else { 0 });

        if start != 0 {
            let duration_ms = now.saturating_sub(start);
            if duration_ms >= self.shared.long_event_threshold_ms {
                trace!("Long event: {duration_ms}ms starting at {start}");
                self.shared.publish(LongEventInfo { start_ms: start, duration_ms });
            }
        }
    }
}
