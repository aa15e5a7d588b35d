//! Cooperative frame recording
//!
//! Rust has no runtime API to walk another thread's stack, so instrumented code
//! records its own logical call stack. Each thread that records a frame is
//! registered in a process-wide [`ThreadRegistry`] and unregistered when it
//! exits; the sampler reads the recorded state from any thread.
//!
//! ```ignore
//! fn save(&mut self) {
//!     let _frame = freezemon::frame!("app::Editor", "save");
//!     let _wait = freezemon::capture::waiting_on("document lock");
//!     let doc = self.doc.lock().unwrap();
//!     drop(_wait);
//!     let _held = freezemon::capture::holding("document lock");
//!     // ...
//! }
//! ```
//!
//! Guards are `!Send`: a frame always belongs to the thread that entered it.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use freezemon_common::{Frame, ThreadSnapshot};

use super::procfs::current_tid;
use crate::domain::ThreadKey;

/// Recorded state of one thread
#[derive(Debug, Default)]
struct Recorded {
    /// Outermost first (push order)
    frames: Vec<Frame>,
    waiting_on: Option<String>,
    held_locks: Vec<String>,
}

#[derive(Debug)]
struct ThreadTrack {
    key: ThreadKey,
    tid: Option<u32>,
    name: String,
    recorded: Mutex<Recorded>,
}

impl ThreadTrack {
    fn lock(&self) -> MutexGuard<'_, Recorded> {
        // A panic while holding this lock cannot leave `Recorded` inconsistent
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn snapshot(&self) -> ThreadSnapshot {
        let recorded = self.lock();
        ThreadSnapshot {
            id: self.key.as_u64(),
            tid: self.tid,
            name: self.name.clone(),
            frames: recorded.frames.iter().rev().cloned().collect(),
            waiting_on: recorded.waiting_on.clone(),
            held_locks: recorded.held_locks.clone(),
            ..ThreadSnapshot::default()
        }
    }
}

/// Process-wide table of threads that recorded at least one frame
pub struct ThreadRegistry {
    next_key: AtomicU64,
    threads: Mutex<HashMap<ThreadKey, Arc<ThreadTrack>>>,
}

impl ThreadRegistry {
    fn new() -> Self {
        Self { next_key: AtomicU64::new(1), threads: Mutex::new(HashMap::new()) }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<ThreadKey, Arc<ThreadTrack>>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register_current(&self) -> Arc<ThreadTrack> {
        let key = ThreadKey(self.next_key.fetch_add(1, Ordering::Relaxed));
        let current = std::thread::current();
        let track = Arc::new(ThreadTrack {
            key,
            tid: current_tid().map(|t| t.0),
            name: current.name().unwrap_or("<unnamed>").to_string(),
            recorded: Mutex::new(Recorded::default()),
        });
        self.table().insert(key, Arc::clone(&track));
        log::debug!("Registered thread {key} ({})", track.name);
        track
    }

    fn unregister(&self, key: ThreadKey) {
        self.table().remove(&key);
        log::debug!("Unregistered thread {key}");
    }

    /// Returns true while the thread is alive and registered
    #[must_use]
    pub fn contains(&self, key: ThreadKey) -> bool {
        self.table().contains_key(&key)
    }

    /// Snapshot one thread, `None` if it has exited
    #[must_use]
    pub fn snapshot(&self, key: ThreadKey) -> Option<ThreadSnapshot> {
        let track = self.table().get(&key).cloned()?;
        Some(track.snapshot())
    }

    /// Snapshot every registered thread, ordered by key
    #[must_use]
    pub fn snapshot_all(&self) -> Vec<ThreadSnapshot> {
        let mut tracks: Vec<Arc<ThreadTrack>> = self.table().values().cloned().collect();
        tracks.sort_by_key(|t| t.key);
        // Table lock is released before touching per-thread locks
        tracks.iter().map(|t| t.snapshot()).collect()
    }
}

static REGISTRY: OnceLock<ThreadRegistry> = OnceLock::new();

/// Get the global thread registry.
pub fn registry() -> &'static ThreadRegistry {
    REGISTRY.get_or_init(ThreadRegistry::new)
}

/// Owns the calling thread's registration; unregisters on thread exit.
struct CurrentThread(Arc<ThreadTrack>);

impl Drop for CurrentThread {
    fn drop(&mut self) {
        registry().unregister(self.0.key);
    }
}

thread_local! {
    static CURRENT: CurrentThread = CurrentThread(registry().register_current());
}

fn current_track() -> Arc<ThreadTrack> {
    CURRENT.with(|current| Arc::clone(&current.0))
}

/// Key of the calling thread, registering it on first use.
#[must_use]
pub fn current_thread_key() -> ThreadKey {
    CURRENT.with(|current| current.0.key)
}

/// Pops its frame when dropped
#[must_use = "the frame is popped as soon as the guard is dropped"]
pub struct FrameGuard {
    track: Arc<ThreadTrack>,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        // Truncating also discards frames of guards leaked with mem::forget
        self.track.lock().frames.truncate(self.depth);
    }
}

/// Push a frame onto the calling thread's recorded stack
pub fn enter_frame(frame: Frame) -> FrameGuard {
    let track = current_track();
    let depth = {
        let mut recorded = track.lock();
        recorded.frames.push(frame);
        recorded.frames.len() - 1
    };
    FrameGuard { track, depth, _not_send: PhantomData }
}

/// Push a `(class, method)` frame without source location
pub fn enter(class: impl Into<String>, method: impl Into<String>) -> FrameGuard {
    enter_frame(Frame::new(class, method))
}

/// Restores the previous wait annotation when dropped
#[must_use = "the annotation is cleared as soon as the guard is dropped"]
pub struct WaitGuard {
    track: Arc<ThreadTrack>,
    previous: Option<String>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.track.lock().waiting_on = self.previous.take();
    }
}

/// Announce that the calling thread is about to wait for `lock`
pub fn waiting_on(lock: impl Into<String>) -> WaitGuard {
    let track = current_track();
    let previous = track.lock().waiting_on.replace(lock.into());
    WaitGuard { track, previous, _not_send: PhantomData }
}

/// Removes the held-lock annotation when dropped
#[must_use = "the annotation is cleared as soon as the guard is dropped"]
pub struct HoldGuard {
    track: Arc<ThreadTrack>,
    lock: String,
    _not_send: PhantomData<*const ()>,
}

impl Drop for HoldGuard {
    fn drop(&mut self) {
        let mut recorded = self.track.lock();
        if let Some(idx) = recorded.held_locks.iter().rposition(|l| *l == self.lock) {
            recorded.held_locks.remove(idx);
        }
    }
}

/// Announce that the calling thread now holds `lock`
pub fn holding(lock: impl Into<String>) -> HoldGuard {
    let track = current_track();
    let lock = lock.into();
    track.lock().held_locks.push(lock.clone());
    HoldGuard { track, lock, _not_send: PhantomData }
}

/// Record a frame for the enclosing scope, with the call site's file and line.
///
/// ```ignore
/// let _frame = freezemon::frame!("app::Editor", "save");
/// ```
#[macro_export]
macro_rules! frame {
    ($class:expr, $method:expr) => {
        $crate::capture::enter_frame($crate::Frame::new($class, $method).at(file!(), line!()))
    };
}
