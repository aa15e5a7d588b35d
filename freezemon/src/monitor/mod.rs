//! # Event Loop Monitor
//!
//! Watches one event loop thread for long dispatches and probable deadlocks.
//!
//! ```text
//!  event loop thread                         freezemon-sampler thread
//!  ─────────────────                         ────────────────────────
//!  begin/end event, begin/end sleep          loop until cancelled:
//!     │                                        sleep ≤ interval/2 (woken early
//!     ├─► event_start_or_resume (atomic) ───►    by published long events)
//!     └─► mailbox: LongEventInfo ──────────►   Sampler::poll(now)
//!                                                 │
//!                                                 ▼
//!                                             LoggerRegistry::publish
//! ```
//!
//! - `hooks`: event loop side (transitions, mailbox, cancellation)
//! - `sampler`: the polling state machine
//! - `deadlock`, `decimate`: helpers with no shared state
//! - `clock`: millisecond time sources

pub mod clock;
pub mod deadlock;
pub mod decimate;
pub mod hooks;
pub mod sampler;

use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

use log::{debug, info};

pub use clock::{Clock, ManualClock, SystemClock};
pub use deadlock::DeadlockTracker;
pub use decimate::decimate;
pub use hooks::EventLoopHooks;
pub use sampler::Sampler;

use crate::capture::procfs::{raise_current_thread_priority, SAMPLER_NICE};
use crate::capture::{current_thread_key, RegistrySource, StackSource};
use crate::config::Parameters;
use crate::domain::{CaptureError, MonitorError, ThreadKey};
use crate::filter::FilterHandler;
use crate::logging::{DefaultUiFreezeEventLogger, FreezeLogger, LoggerId, LoggerRegistry};

/// A running freeze monitor bound to the thread that started it.
pub struct EventLoopMonitor {
    hooks: EventLoopHooks,
    loggers: Arc<LoggerRegistry>,
    ui_thread: ThreadKey,
    owner: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl EventLoopMonitor {
    /// Start monitoring the calling thread's event loop with the system clock.
    ///
    /// # Errors
    /// Returns an error if `params` is invalid or the sampling thread cannot be spawned
    pub fn start(params: Parameters) -> Result<Self, MonitorError> {
        Self::start_with_clock(params, Arc::new(SystemClock::new()))
    }

    /// Start monitoring the calling thread with a custom clock.
    ///
    /// # Errors
    /// Returns an error if `params` is invalid or the sampling thread cannot be spawned
    pub fn start_with_clock(params: Parameters, clock: Arc<dyn Clock>) -> Result<Self, MonitorError> {
        params.validate()?;
        let source = RegistrySource::new(FilterHandler::new(&params.uninteresting_thread_filter)?);
        Self::start_with_source(params, clock, source)
    }

    /// Start monitoring the calling thread, sampling through `source`.
    ///
    /// Validation happens before anything is spawned: on error, nothing runs.
    ///
    /// # Errors
    /// Returns an error if `params` is invalid or the sampling thread cannot be spawned
    pub fn start_with_source<S: StackSource + 'static>(
        params: Parameters,
        clock: Arc<dyn Clock>,
        source: S,
    ) -> Result<Self, MonitorError> {
        params.validate()?;

        let ui_thread = current_thread_key();
        let hooks = EventLoopHooks::new(params.long_event_threshold_ms, clock);
        let loggers = Arc::new(LoggerRegistry::new());
        if params.log_to_error_log {
            loggers.add(Arc::new(DefaultUiFreezeEventLogger::new()));
        }

        info!(
            "Monitoring event loop on {ui_thread}: long event {}ms, sample every {}ms after {}ms, deadlock {}ms",
            params.long_event_threshold_ms,
            params.sample_interval_ms,
            params.initial_sample_delay_ms,
            params.deadlock_threshold_ms
        );

        let sampler = Sampler::new(params, source, ui_thread, &hooks)?;
        let thread_hooks = hooks.clone();
        let thread_loggers = Arc::clone(&loggers);
        let handle = thread::Builder::new()
            .name("freezemon-sampler".to_string())
            .spawn(move || run_sampler(sampler, &thread_hooks, &thread_loggers))
            .map_err(MonitorError::SpawnFailed)?;

        Ok(Self { hooks, loggers, ui_thread, owner: thread::current().id(), handle: Some(handle) })
    }

    /// Transition callbacks for the monitored event loop
    #[must_use]
    pub fn hooks(&self) -> EventLoopHooks {
        self.hooks.clone()
    }

    /// Key of the monitored event loop thread
    #[must_use]
    pub fn ui_thread(&self) -> ThreadKey {
        self.ui_thread
    }

    pub fn add_logger(&self, logger: Arc<dyn FreezeLogger>) -> LoggerId {
        self.loggers.add(logger)
    }

    pub fn remove_logger(&self, id: LoggerId) -> bool {
        self.loggers.remove(id)
    }

    /// False once the sampler has stopped (shutdown, or the event loop went away)
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.hooks.shared().is_cancelled()
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop sampling and detach the hooks.
    ///
    /// # Errors
    /// Returns [`MonitorError::WrongThread`] if called from any thread other
    /// than the one that started the monitor, [`MonitorError::SamplerPanicked`]
    /// if the sampling thread died
    pub fn shutdown(&mut self) -> Result<(), MonitorError> {
        if thread::current().id() != self.owner {
            return Err(MonitorError::WrongThread);
        }
        self.hooks.shared().cancel();
        match self.handle.take() {
            Some(handle) => handle.join().map_err(|_| MonitorError::SamplerPanicked),
            None => Ok(()),
        }
    }
}

impl Drop for EventLoopMonitor {
    fn drop(&mut self) {
        self.hooks.shared().cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Body of the sampling thread
fn run_sampler<S: StackSource>(mut sampler: Sampler<S>, hooks: &EventLoopHooks, loggers: &LoggerRegistry) {
    let shared = hooks.shared();
    let clock = hooks.clock();

    if let Err(e) = raise_current_thread_priority(SAMPLER_NICE) {
        debug!("Sampling thread keeps normal priority: {e}");
    }

    while !shared.is_cancelled() {
        let sleep = sampler.next_sleep(clock.now_ms());
        shared.sleep(sleep);
        if shared.is_cancelled() {
            break;
        }

        match sampler.poll(clock.now_ms()) {
            Ok(events) => {
                for event in &events {
                    loggers.publish(event);
                }
            }
            Err(CaptureError::Disposed(key)) => {
                info!("Event loop thread {key} is gone, stopping freeze monitor");
                shared.cancel();
            }
        }
    }
    info!("Freeze monitor stopped");
}
