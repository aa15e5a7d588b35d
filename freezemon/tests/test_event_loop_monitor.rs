//! Real-thread tests: the monitor samples the test thread itself.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use freezemon::domain::MonitorError;
use freezemon::logging::FreezeLogger;
use freezemon::{frame, EventLoopMonitor, Parameters, UiFreezeEvent};

#[derive(Default)]
struct Collecting(Mutex<Vec<UiFreezeEvent>>);

impl Collecting {
    fn events(&self) -> Vec<UiFreezeEvent> {
        self.0.lock().unwrap().clone()
    }

    fn wait_for(&self, count: usize, timeout: Duration) -> Vec<UiFreezeEvent> {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let events = self.events();
            if events.len() >= count {
                return events;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        self.events()
    }
}

impl FreezeLogger for Collecting {
    fn log(&self, event: &UiFreezeEvent) -> anyhow::Result<()> {
        self.0.lock().unwrap().push(event.clone());
        Ok(())
    }
}

fn fast_params() -> Parameters {
    Parameters {
        long_event_threshold_ms: 100,
        sample_interval_ms: 20,
        initial_sample_delay_ms: 20,
        max_stack_samples: 10,
        deadlock_threshold_ms: 60_000,
        log_to_error_log: false,
        ..Parameters::default()
    }
}

fn blocked_work(duration: Duration) {
    let _frame = frame!("test::Worker", "crunch");
    std::thread::sleep(duration);
}

#[test]
fn test_blocked_thread_is_reported_with_its_frames() {
    let mut monitor = EventLoopMonitor::start(fast_params()).unwrap();
    let logger = Arc::new(Collecting::default());
    monitor.add_logger(logger.clone());
    let hooks = monitor.hooks();

    hooks.begin_event();
    blocked_work(Duration::from_millis(300));
    hooks.end_event();
    hooks.begin_sleep();

    let events = logger.wait_for(1, Duration::from_secs(5));
    monitor.shutdown().unwrap();

    assert_eq!(events.len(), 1, "{events:?}");
    let event = &events[0];
    assert!(event.duration_ms >= 300);
    assert!(!event.still_running);
    assert_eq!(event.ui_thread_id, monitor.ui_thread().as_u64());
    assert!(event
        .ui_thread_snapshots()
        .any(|(_, t)| t.frames.iter().any(|f| f.class == "test::Worker" && f.method == "crunch")));
}

#[test]
fn test_filtered_freeze_never_reaches_logger() {
    let params = Parameters { ui_thread_filter: "test::Worker.crunch".to_string(), ..fast_params() };
    let mut monitor = EventLoopMonitor::start(params).unwrap();
    let logger = Arc::new(Collecting::default());
    monitor.add_logger(logger.clone());
    let hooks = monitor.hooks();

    hooks.begin_event();
    blocked_work(Duration::from_millis(300));
    hooks.begin_sleep();

    std::thread::sleep(Duration::from_millis(300));
    monitor.shutdown().unwrap();
    assert!(logger.events().is_empty());
}

#[test]
fn test_invalid_parameters_start_nothing() {
    let params = Parameters { sample_interval_ms: 500, ..Parameters::default() };
    let err = EventLoopMonitor::start(params).err().unwrap();
    assert!(matches!(err, MonitorError::InvalidParameters(_)));
}

#[test]
fn test_shutdown_from_other_thread_is_rejected() {
    let monitor = EventLoopMonitor::start(fast_params()).unwrap();
    let monitor = Arc::new(Mutex::new(monitor));

    let remote = Arc::clone(&monitor);
    let result = std::thread::spawn(move || remote.lock().unwrap().shutdown()).join().unwrap();
    assert!(matches!(result, Err(MonitorError::WrongThread)));

    let mut monitor = monitor.lock().unwrap();
    assert!(monitor.is_running());
    monitor.shutdown().unwrap();
    assert!(!monitor.is_running());
}

#[test]
fn test_hooks_are_inert_after_shutdown() {
    let mut monitor = EventLoopMonitor::start(fast_params()).unwrap();
    let logger = Arc::new(Collecting::default());
    monitor.add_logger(logger.clone());
    let hooks = monitor.hooks();
    monitor.shutdown().unwrap();

    hooks.begin_event();
    std::thread::sleep(Duration::from_millis(150));
    hooks.begin_sleep();
    assert_eq!(hooks.dispatch_start_ms(), None);
    assert!(logger.events().is_empty());
}

#[test]
fn test_tokio_task_blocking_the_runtime_is_reported() {
    let mut monitor = EventLoopMonitor::start(fast_params()).unwrap();
    let logger = Arc::new(Collecting::default());
    monitor.add_logger(logger.clone());

    let runtime = freezemon::runtime::current_thread_runtime(&monitor.hooks()).unwrap();
    runtime.block_on(async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        blocked_work(Duration::from_millis(250));
        tokio::time::sleep(Duration::from_millis(10)).await;
    });
    drop(runtime);

    let events = logger.wait_for(1, Duration::from_secs(5));
    monitor.shutdown().unwrap();
    assert!(events.iter().any(|e| e.duration_ms >= 250 && !e.still_running));
}
