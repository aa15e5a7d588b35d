//! Tokio integration
//!
//! A current-thread Tokio runtime is an event loop: the thread parks when no
//! task is ready and unparks to poll tasks. Wiring the runtime's park/unpark
//! callbacks to [`EventLoopHooks::begin_sleep`] / [`EventLoopHooks::end_sleep`]
//! turns every stretch between two parks into one monitored dispatch, so a task
//! that blocks the thread shows up as a freeze.
//!
//! ```ignore
//! let mut monitor = EventLoopMonitor::start(Parameters::default())?;
//! let runtime = freezemon::runtime::current_thread_runtime(&monitor.hooks())?;
//! runtime.block_on(app());
//! drop(runtime);
//! monitor.shutdown()?;
//! ```
//!
//! The runtime must be driven from the thread that started the monitor.

use tokio::runtime::{Builder, Runtime};

use crate::monitor::EventLoopHooks;

/// Attach `hooks` to a runtime builder's park/unpark callbacks
pub fn instrument<'a>(builder: &'a mut Builder, hooks: &EventLoopHooks) -> &'a mut Builder {
    let on_park = hooks.clone();
    let on_unpark = hooks.clone();
    builder
        .on_thread_park(move || on_park.begin_sleep())
        .on_thread_unpark(move || on_unpark.end_sleep())
}

/// Build a monitored current-thread runtime with all drivers enabled
///
/// # Errors
/// Returns an error if the runtime cannot be created
pub fn current_thread_runtime(hooks: &EventLoopHooks) -> std::io::Result<Runtime> {
    let mut builder = Builder::new_current_thread();
    builder.enable_all();
    instrument(&mut builder, hooks).build()
}
