//! Freeze event fan-out
//!
//! Every published [`UiFreezeEvent`] goes to each registered [`FreezeLogger`]
//! in registration order. A logger that returns an error or panics is removed
//! for good and the failure is reported once through the `log` facade; the
//! remaining loggers still receive the event.

pub mod default_logger;
pub mod report;

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use freezemon_common::UiFreezeEvent;
use log::error;

pub use default_logger::DefaultUiFreezeEventLogger;
pub use report::format_report;

/// Consumer of freeze events.
///
/// Called on the sampling thread; a slow logger delays the next poll.
pub trait FreezeLogger: Send + Sync {
    /// Handle one freeze event
    ///
    /// # Errors
    /// Any error permanently unregisters this logger
    fn log(&self, event: &UiFreezeEvent) -> anyhow::Result<()>;

    /// Name used in diagnostics
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

/// Handle returned by [`LoggerRegistry::add`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoggerId(u64);

/// The set of active loggers
#[derive(Default)]
pub struct LoggerRegistry {
    next_id: AtomicU64,
    loggers: Mutex<Vec<(LoggerId, Arc<dyn FreezeLogger>)>>,
}

impl LoggerRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, Vec<(LoggerId, Arc<dyn FreezeLogger>)>> {
        self.loggers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, logger: Arc<dyn FreezeLogger>) -> LoggerId {
        let id = LoggerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries().push((id, logger));
        id
    }

    /// Returns false if the logger was not registered (or was already removed)
    pub fn remove(&self, id: LoggerId) -> bool {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|(entry_id, _)| *entry_id != id);
        entries.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Deliver `event` to every logger, dropping the ones that fail.
    pub fn publish(&self, event: &UiFreezeEvent) {
        // Loggers run without the registry lock held, so they may add or
        // remove loggers themselves.
        let loggers: Vec<(LoggerId, Arc<dyn FreezeLogger>)> = self.entries().clone();

        for (id, logger) in loggers {
            let outcome = catch_unwind(AssertUnwindSafe(|| logger.log(event)));
            let failure = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => format!("{e:#}"),
                Err(panic) => panic_message(panic.as_ref()),
            };
            if self.remove(id) {
                error!("Freeze logger {} failed and was removed: {failure}", logger.name());
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counting(AtomicUsize);

    impl FreezeLogger for Counting {
        fn log(&self, _event: &UiFreezeEvent) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct Failing;

    impl FreezeLogger for Failing {
        fn log(&self, _event: &UiFreezeEvent) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }
    }

    struct Panicking;

    impl FreezeLogger for Panicking {
        fn log(&self, _event: &UiFreezeEvent) -> anyhow::Result<()> {
            panic!("logger bug")
        }
    }

    fn event() -> UiFreezeEvent {
        UiFreezeEvent { start_ms: 1, duration_ms: 600, samples: vec![], still_running: false, ui_thread_id: 1 }
    }

    #[test]
    fn test_failing_logger_is_removed_others_still_called() {
        let registry = LoggerRegistry::new();
        let counter = Arc::new(Counting::default());
        registry.add(Arc::new(Failing));
        registry.add(counter.clone());
        registry.add(Arc::new(Panicking));

        registry.publish(&event());
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
        assert_eq!(registry.len(), 1);

        registry.publish(&event());
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_remove_by_id() {
        let registry = LoggerRegistry::new();
        let id = registry.add(Arc::new(Counting::default()));
        assert!(registry.remove(id));
        assert!(!registry.remove(id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_default_name_is_type_name() {
        assert!(Failing.name().ends_with("Failing"));
    }
}
