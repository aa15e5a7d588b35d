//! # Shared Data Structures (Monitor ↔ Loggers)
//!
//! Defines the immutable data model produced by the freeze monitor and handed to
//! freeze loggers. Logger implementations only need this crate; they never see the
//! sampler's internal buffers.
//!
//! ## Key Types
//!
//! - [`LongEventInfo`] - One dispatch that exceeded the long-event threshold
//! - [`StackSample`] - Thread snapshots captured at one point in time
//! - [`ThreadSnapshot`] - One thread's frames, state and lock annotations
//! - [`UiFreezeEvent`] - A complete (or still running) freeze with its samples
//!
//! All timestamps are milliseconds on the monitor's clock. Zero is never a valid
//! timestamp: the monitor uses it as the "not dispatching" sentinel.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Long Events
// ============================================================================

/// A single dispatch cycle that ran at least as long as the long-event threshold.
///
/// Published by the event loop thread at the transition that ended the dispatch,
/// consumed by the sampling thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LongEventInfo {
    /// When the dispatch started or resumed (ms)
    pub start_ms: u64,
    /// How long it ran (ms)
    pub duration_ms: u64,
}

impl LongEventInfo {
    /// End of the dispatch (ms)
    #[must_use]
    pub fn end_ms(&self) -> u64 {
        self.start_ms + self.duration_ms
    }

    /// Returns true if `[start, end]` overlaps `[from, to]`.
    #[must_use]
    pub fn overlaps(&self, from_ms: u64, to_ms: u64) -> bool {
        self.start_ms <= to_ms && from_ms <= self.end_ms()
    }
}

// ============================================================================
// Thread Snapshots
// ============================================================================

/// One stack frame recorded by instrumented code.
///
/// `class` is the owning type or module path (e.g. `app::editor::Buffer`),
/// `method` the function name (e.g. `reflow`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Frame {
    pub class: String,
    pub method: String,
    pub file: Option<String>,
    pub line: Option<u32>,
}

impl Frame {
    /// Create a frame without source location
    pub fn new(class: impl Into<String>, method: impl Into<String>) -> Self {
        Self { class: class.into(), method: method.into(), file: None, line: None }
    }

    /// Attach a source location
    #[must_use]
    pub fn at(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = Some(file.into());
        self.line = Some(line);
        self
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.method)?;
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "({file}:{line})"),
            (Some(file), None) => write!(f, "({file})"),
            _ => write!(f, "(Unknown Source)"),
        }
    }
}

/// Scheduler state of a thread at capture time
///
/// Mirrors the single-letter state in `/proc/<pid>/task/<tid>/stat`:
/// - `R` → [`ThreadState::Running`]
/// - `S` → [`ThreadState::Sleeping`] (interruptible wait)
/// - `D` → [`ThreadState::Blocked`] (uninterruptible, usually I/O)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ThreadState {
    Running,
    Sleeping,
    Blocked,
    Stopped,
    Zombie,
    #[default]
    Unknown,
}

impl ThreadState {
    /// Decode the state letter from `/proc/.../stat`
    #[must_use]
    pub fn from_proc_code(code: char) -> Self {
        match code {
            'R' => ThreadState::Running,
            'S' | 'I' => ThreadState::Sleeping,
            'D' => ThreadState::Blocked,
            'T' | 't' => ThreadState::Stopped,
            'Z' | 'X' => ThreadState::Zombie,
            _ => ThreadState::Unknown,
        }
    }
}

impl fmt::Display for ThreadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ThreadState::Running => "RUNNING",
            ThreadState::Sleeping => "SLEEPING",
            ThreadState::Blocked => "BLOCKED",
            ThreadState::Stopped => "STOPPED",
            ThreadState::Zombie => "ZOMBIE",
            ThreadState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// Snapshot of one thread.
///
/// Frames are ordered innermost first: `frames[0]` is the function that was
/// executing when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ThreadSnapshot {
    /// Monitor-assigned thread key (stable for the thread's lifetime)
    pub id: u64,
    /// Kernel thread id, when known
    pub tid: Option<u32>,
    pub name: String,
    pub state: ThreadState,
    pub frames: Vec<Frame>,
    /// Lock the thread announced it is waiting for
    pub waiting_on: Option<String>,
    /// Locks the thread announced it holds, oldest first
    pub held_locks: Vec<String>,
    /// Kernel wait channel (e.g. `futex_wait_queue`), when readable
    pub wait_channel: Option<String>,
}

impl ThreadSnapshot {
    /// Innermost frame, if any
    #[must_use]
    pub fn top_frame(&self) -> Option<&Frame> {
        self.frames.first()
    }
}

// ============================================================================
// Samples and Freeze Events
// ============================================================================

/// Thread snapshots captured at one instant.
///
/// The thread array is shared, so cloning a sample (and therefore a whole
/// [`UiFreezeEvent`]) never copies stack data.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StackSample {
    pub timestamp_ms: u64,
    pub threads: Arc<[ThreadSnapshot]>,
}

impl StackSample {
    pub fn new(timestamp_ms: u64, threads: Vec<ThreadSnapshot>) -> Self {
        Self { timestamp_ms, threads: threads.into() }
    }

    /// Find a thread by its monitor key
    #[must_use]
    pub fn thread(&self, id: u64) -> Option<&ThreadSnapshot> {
        self.threads.iter().find(|t| t.id == id)
    }
}

/// A detected UI freeze.
///
/// `still_running` distinguishes a probable deadlock (the dispatch had not
/// finished when reported) from a completed long event.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct UiFreezeEvent {
    pub start_ms: u64,
    pub duration_ms: u64,
    /// Ordered by timestamp (non-decreasing)
    pub samples: Vec<StackSample>,
    pub still_running: bool,
    /// Monitor key of the event loop thread
    pub ui_thread_id: u64,
}

impl UiFreezeEvent {
    /// The event loop thread's snapshot in each sample (samples that lack it are skipped)
    pub fn ui_thread_snapshots(&self) -> impl Iterator<Item = (&StackSample, &ThreadSnapshot)> {
        self.samples.iter().filter_map(|s| s.thread(self.ui_thread_id).map(|t| (s, t)))
    }
}
