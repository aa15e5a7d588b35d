//! Domain types providing compile-time safety and self-documentation
//!
//! These newtype wrappers keep kernel thread ids and monitor-assigned thread
//! keys apart; both are plain integers underneath.

use std::fmt;

/// Kernel thread ID
///
/// Assigned by the kernel (`gettid`). Only meaningful on Linux.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tid(pub u32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TID:{}", self.0)
    }
}

/// Monitor-assigned thread key
///
/// Handed out by the thread registry when a thread first records a frame.
/// Never zero, never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadKey(pub u64);

impl ThreadKey {
    /// Raw value as stored in [`freezemon_common::ThreadSnapshot::id`]
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ThreadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Thread#{}", self.0)
    }
}
