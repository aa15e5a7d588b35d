//! # freezemon - Event Loop Freeze Monitor
//!
//! freezemon watches a single event loop thread (a UI thread, a
//! current-thread Tokio runtime, any dispatch loop) and reports dispatches that
//! hold the thread for too long. While a dispatch runs, a separate sampling
//! thread periodically snapshots the event loop thread's stack so the report
//! shows where the time went. A dispatch that never finishes is reported as a
//! probable deadlock while it is still running.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    Monitored Event Loop Thread                  │
//! │   begin_event / end_event / begin_sleep / end_sleep (hooks)     │
//! │   frame!/enter/waiting_on/holding guards (capture registry)     │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ dispatch start (atomic) + long-event mailbox
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                  freezemon-sampler Thread                       │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Sampler    │──▶│   Filters    │──▶│   Loggers    │         │
//! │  │ (poll loop)  │   │ (call sites) │   │  (fan-out)   │         │
//! │  └──────────────┘   └──────────────┘   └──────────────┘         │
//! │         │                                      │                │
//! │         ▼                                      ▼                │
//! │  ┌──────────────┐                      ┌──────────────┐         │
//! │  │ StackSource  │                      │ log / JSONL  │         │
//! │  │ (+ /proc)    │                      │   export     │         │
//! │  └──────────────┘                      └──────────────┘         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`monitor`]: hooks, the sampling state machine and the monitor handle
//! - [`capture`]: cooperative stack registry and `/proc` thread details
//! - [`filter`]: `Class.method` filter lists
//! - [`logging`]: logger fan-out, text reports and the default logger
//! - [`export`]: JSON Lines freeze log
//! - [`runtime`]: Tokio current-thread runtime instrumentation
//! - [`config`]: monitor parameters and their validation
//! - [`cli`]: command-line arguments of the demo binary
//! - [`domain`]: identifiers and error types
//!
//! ## Typical Usage
//!
//! ```ignore
//! let mut monitor = EventLoopMonitor::start(Parameters::default())?;
//! let hooks = monitor.hooks();
//! loop {
//!     hooks.begin_sleep();
//!     let event = queue.recv();
//!     hooks.end_sleep();
//!     let _frame = freezemon::frame!("app::Window", "handle_event");
//!     handle(event);
//! }
//! ```

pub mod capture;
pub mod cli;
pub mod config;
pub mod domain;
pub mod export;
pub mod filter;
pub mod logging;
pub mod monitor;
pub mod runtime;

pub use config::Parameters;
pub use freezemon_common::{
    Frame, LongEventInfo, StackSample, ThreadSnapshot, ThreadState, UiFreezeEvent,
};
pub use monitor::{EventLoopHooks, EventLoopMonitor};
