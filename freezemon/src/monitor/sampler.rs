//! Sampling side of the monitor
//!
//! [`Sampler`] is the state machine run by the sampling thread. It owns the
//! sample buffer exclusively; only finished [`UiFreezeEvent`] copies leave it.
//! Time is passed in explicitly, so the whole machine can be driven on a
//! simulated clock.
//!
//! ## One Poll
//!
//! ```text
//! poll(now)
//!   ├─ starvation?      slept far longer than requested → remember the window
//!   ├─ mailbox          completed long event → report (with its samples)
//!   ├─ new dispatch?    event loop moved on → park the old buffer, reset intervals
//!   ├─ sample           due and still in the same dispatch → capture
//!   ├─ deadlock?        running past the deadlock threshold → report once
//!   └─ filter           drop events passing through filtered call sites
//! ```
//!
//! A starvation window only mutes what was measured inside it: a completed
//! event is dropped when most of it was spent in starvation, and a running
//! dispatch is reported as a deadlock only once it has been stuck for the
//! full threshold after the last window ended.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use freezemon_common::{LongEventInfo, StackSample, UiFreezeEvent};
use log::{debug, warn};

use super::deadlock::DeadlockTracker;
use super::decimate::decimate;
use super::hooks::{EventLoopHooks, Shared};
use crate::capture::StackSource;
use crate::config::Parameters;
use crate::domain::{CaptureError, ConfigError, ThreadKey};
use crate::filter::FilterHandler;

/// Starvation windows remembered for discarding overlapping long events
const MAX_STARVATION_WINDOWS: usize = 8;

pub struct Sampler<S> {
    params: Parameters,
    shared: Arc<Shared>,
    source: S,
    ui_thread: ThreadKey,
    ui_filter: FilterHandler,
    deadlock: DeadlockTracker,

    /// Dispatch the buffer belongs to (its start/resume time), 0 = none
    tracked_start: u64,
    samples: Vec<StackSample>,
    /// Last dispatch left behind before its long event was collected
    previous: Option<(u64, Vec<StackSample>)>,
    /// Doubles every time the buffer is decimated
    sample_interval_ms: u64,
    next_sample_at: u64,

    last_poll_ms: u64,
    requested_sleep_ms: u64,
    starvation_windows: VecDeque<(u64, u64)>,
}

impl<S: StackSource> Sampler<S> {
    /// Create a sampler reading the transitions reported through `hooks`.
    ///
    /// # Errors
    /// Returns an error if `params` is invalid
    pub fn new(
        params: Parameters,
        source: S,
        ui_thread: ThreadKey,
        hooks: &EventLoopHooks,
    ) -> Result<Self, ConfigError> {
        params.validate()?;
        let ui_filter = FilterHandler::new(&params.ui_thread_filter)?;
        Ok(Self {
            deadlock: DeadlockTracker::new(params.deadlock_threshold_ms),
            sample_interval_ms: params.sample_interval_ms,
            params,
            shared: Arc::clone(hooks.shared()),
            source,
            ui_thread,
            ui_filter,
            tracked_start: 0,
            samples: Vec::new(),
            previous: None,
            next_sample_at: 0,
            last_poll_ms: 0,
            requested_sleep_ms: 0,
            starvation_windows: VecDeque::new(),
        })
    }

    /// Samples buffered for the current dispatch
    #[must_use]
    pub fn buffered_samples(&self) -> &[StackSample] {
        &self.samples
    }

    /// How long to wait before the next poll.
    ///
    /// Never longer than half the sample interval, so samples land at most
    /// half an interval late; shorter when the next sample is due sooner.
    pub fn next_sleep(&mut self, now_ms: u64) -> Duration {
        let half = (self.params.sample_interval_ms / 2).max(1);
        let sleep = if self.tracked_start != 0 {
            half.min(self.next_sample_at.saturating_sub(now_ms).max(1))
        } else {
            half
        };
        self.requested_sleep_ms = sleep;
        Duration::from_millis(sleep)
    }

    /// Run one polling step at `now_ms` and return the freeze events to publish.
    ///
    /// # Errors
    /// Returns the capture error if the event loop thread could not be
    /// sampled; the sampling loop stops on it.
    pub fn poll(&mut self, now_ms: u64) -> Result<Vec<UiFreezeEvent>, CaptureError> {
        let mut events = Vec::new();

        self.check_starvation(now_ms);

        // Mailbox first: the event loop stores its new state before publishing,
        // so a published event is never mistaken for the running dispatch.
        if let Some(info) = self.shared.take_published() {
            if let Some(event) = self.completed_event(info) {
                events.push(event);
            }
        }

        let active = self.shared.active_since();
        if active != self.tracked_start {
            self.track(active);
        }

        if active != 0 {
            if now_ms >= self.next_sample_at {
                self.take_sample(now_ms)?;
            }
            if self.stuck_since_starvation(active, now_ms) && self.deadlock.check(now_ms, active) {
                warn!("Event loop stuck for {}ms, reporting probable deadlock", now_ms - active);
                events.push(self.snapshot_event(active, now_ms - active, true));
            }
        }

        self.last_poll_ms = now_ms;

        events.retain(|event| {
            let keep = self.ui_filter.should_log_event(&event.samples, event.ui_thread_id);
            if !keep {
                debug!("Freeze at {}ms suppressed by UI thread filter", event.start_ms);
            }
            keep
        });
        Ok(events)
    }

    /// Detect that this thread itself was starved: it woke up far later than
    /// it asked to. Whatever happened in that window says nothing about the
    /// event loop.
    fn check_starvation(&mut self, now_ms: u64) {
        if self.last_poll_ms == 0 {
            return;
        }
        let from = self.last_poll_ms;
        let slept = now_ms.saturating_sub(from);
        let tolerance = self.params.long_event_threshold_ms / 2;
        if slept <= self.requested_sleep_ms + tolerance {
            return;
        }

        debug!("Sampler starved: asked for {}ms, woke after {slept}ms", self.requested_sleep_ms);
        if self.starvation_windows.len() == MAX_STARVATION_WINDOWS {
            self.starvation_windows.pop_front();
        }
        self.starvation_windows.push_back((from, now_ms));

        // Nothing is sampled at the very end of a window; resume one interval later
        self.samples.retain(|s| s.timestamp_ms <= from);
        if self.tracked_start != 0 {
            self.next_sample_at = self.next_sample_at.max(now_ms + self.sample_interval_ms);
        }
    }

    /// Milliseconds of `info` spent inside starvation windows
    fn starved_ms(&self, info: &LongEventInfo) -> u64 {
        self.starvation_windows
            .iter()
            .map(|&(from, to)| to.min(info.end_ms()).saturating_sub(from.max(info.start_ms)))
            .sum()
    }

    /// The dispatch started at `active` has run for the full deadlock
    /// threshold since the last starvation window it overlapped
    fn stuck_since_starvation(&self, active: u64, now_ms: u64) -> bool {
        self.starvation_windows
            .iter()
            .filter(|&&(_, to)| to >= active)
            .map(|&(_, to)| to)
            .max()
            .map_or(true, |end| now_ms.saturating_sub(end) > self.params.deadlock_threshold_ms)
    }

    /// Start following a new dispatch (or sleep, when `active` is 0)
    fn track(&mut self, active: u64) {
        let finished = std::mem::take(&mut self.samples);
        if self.tracked_start != 0 {
            // Its long event may still be on its way through the mailbox
            self.previous = Some((self.tracked_start, finished));
        }
        self.tracked_start = active;
        self.sample_interval_ms = self.params.sample_interval_ms;
        self.next_sample_at = active + self.params.initial_sample_delay_ms;
    }

    fn take_sample(&mut self, now_ms: u64) -> Result<(), CaptureError> {
        let threads = self.source.capture(self.ui_thread, self.params.dump_all_threads)?;
        let max = self.params.max_stack_samples;
        if self.samples.len() >= max {
            decimate(&mut self.samples, max.div_ceil(2), false);
            self.sample_interval_ms *= 2;
            debug!("Sample buffer full, sampling every {}ms from now on", self.sample_interval_ms);
        }
        self.samples.push(StackSample::new(now_ms, threads));
        self.next_sample_at = now_ms + self.sample_interval_ms;
        Ok(())
    }

    /// Build the report for a long event the event loop just finished
    fn completed_event(&mut self, info: LongEventInfo) -> Option<UiFreezeEvent> {
        let mut samples = self.claim_samples(info.start_ms);

        if self.deadlock.was_reported(info.start_ms) {
            debug!("{}ms event at {}ms already reported as deadlock", info.duration_ms, info.start_ms);
            return None;
        }

        let starved = self.starved_ms(&info);
        if starved * 2 > info.duration_ms {
            debug!(
                "Dropping {}ms event at {}ms: {starved}ms of it overlaps sampler starvation",
                info.duration_ms, info.start_ms
            );
            return None;
        }

        while samples.last().is_some_and(|s| s.timestamp_ms > info.end_ms()) {
            let to = samples.len() - 1;
            decimate(&mut samples, to, true);
        }

        Some(UiFreezeEvent {
            start_ms: info.start_ms,
            duration_ms: info.duration_ms,
            samples,
            still_running: false,
            ui_thread_id: self.ui_thread.as_u64(),
        })
    }

    /// Take the samples recorded for the dispatch started at `start_ms`,
    /// whether it is still tracked or was already left behind
    fn claim_samples(&mut self, start_ms: u64) -> Vec<StackSample> {
        if start_ms == self.tracked_start {
            return std::mem::take(&mut self.samples);
        }
        match self.previous.take() {
            Some((previous_start, samples)) if previous_start == start_ms => samples,
            other => {
                self.previous = other;
                Vec::new()
            }
        }
    }

    /// Copy of the buffer as a freeze event; the buffer keeps growing afterwards
    fn snapshot_event(&self, start_ms: u64, duration_ms: u64, still_running: bool) -> UiFreezeEvent {
        UiFreezeEvent {
            start_ms,
            duration_ms,
            samples: self.samples.clone(),
            still_running,
            ui_thread_id: self.ui_thread.as_u64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::clock::ManualClock;
    use freezemon_common::ThreadSnapshot;

    const UI: ThreadKey = ThreadKey(3);

    struct UiOnly;

    impl StackSource for UiOnly {
        fn capture(&mut self, ui_thread: ThreadKey, _all: bool) -> Result<Vec<ThreadSnapshot>, CaptureError> {
            Ok(vec![ThreadSnapshot { id: ui_thread.as_u64(), ..ThreadSnapshot::default() }])
        }
    }

    fn params() -> Parameters {
        Parameters {
            long_event_threshold_ms: 500,
            sample_interval_ms: 100,
            initial_sample_delay_ms: 100,
            max_stack_samples: 5,
            deadlock_threshold_ms: 5_000,
            ..Parameters::default()
        }
    }

    fn setup() -> (Arc<ManualClock>, EventLoopHooks, Sampler<UiOnly>) {
        let clock = Arc::new(ManualClock::new(10_000));
        let hooks = EventLoopHooks::new(500, clock.clone());
        let sampler = Sampler::new(params(), UiOnly, UI, &hooks).unwrap();
        (clock, hooks, sampler)
    }

    /// Poll every 50ms in `(from, to]`
    fn poll_until(sampler: &mut Sampler<UiOnly>, clock: &ManualClock, from: u64, to: u64) -> Vec<UiFreezeEvent> {
        let mut events = Vec::new();
        let mut now = from;
        while now + 50 <= to {
            now += 50;
            clock.set(now);
            events.extend(sampler.poll(now).unwrap());
        }
        events
    }

    #[test]
    fn test_late_mailbox_after_deadlock_is_not_reported_again() {
        let (clock, hooks, mut sampler) = setup();
        hooks.end_sleep();
        let mut events = poll_until(&mut sampler, &clock, 10_000, 16_000);
        assert_eq!(events.len(), 1);
        assert!(events[0].still_running);

        // The sampler runs between the event loop storing its new state and
        // publishing the finished dispatch
        clock.set(16_010);
        hooks.shared().set_active(0);
        events.extend(sampler.poll(16_010).unwrap());
        hooks.shared().publish(LongEventInfo { start_ms: 10_000, duration_ms: 6_010 });
        clock.set(16_020);
        events.extend(sampler.poll(16_020).unwrap());

        assert_eq!(events.len(), 1, "{events:?}");
    }

    #[test]
    fn test_late_mailbox_keeps_its_samples() {
        let (clock, hooks, mut sampler) = setup();
        hooks.end_sleep();
        assert!(poll_until(&mut sampler, &clock, 10_000, 11_200).is_empty());

        clock.set(11_210);
        hooks.shared().set_active(0);
        assert!(sampler.poll(11_210).unwrap().is_empty());
        hooks.shared().publish(LongEventInfo { start_ms: 10_000, duration_ms: 1_210 });
        clock.set(11_220);
        let events = sampler.poll(11_220).unwrap();

        assert_eq!(events.len(), 1);
        assert!(!events[0].still_running);
        assert!(!events[0].samples.is_empty());
        assert!(events[0].samples.iter().all(|s| s.timestamp_ms <= 11_210));
    }

    #[test]
    fn test_samples_after_event_end_are_trimmed() {
        let (clock, hooks, mut sampler) = setup();
        hooks.end_sleep();
        poll_until(&mut sampler, &clock, 10_000, 10_900);
        let stamps: Vec<u64> = sampler.buffered_samples().iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(stamps, vec![10_100, 10_500, 10_800, 10_900]);

        hooks.shared().publish(LongEventInfo { start_ms: 10_000, duration_ms: 600 });
        let events = poll_until(&mut sampler, &clock, 10_900, 10_950);

        assert_eq!(events.len(), 1);
        let stamps: Vec<u64> = events[0].samples.iter().map(|s| s.timestamp_ms).collect();
        assert_eq!(stamps, vec![10_100, 10_500]);
    }

    #[test]
    fn test_buffer_stays_bounded() {
        let (clock, hooks, mut sampler) = setup();
        hooks.end_sleep();
        for end in (10_500..14_000).step_by(500) {
            poll_until(&mut sampler, &clock, end - 500, end);
            assert!(sampler.buffered_samples().len() <= 5);
        }
    }
}
