//! Stack capture
//!
//! The sampler only talks to a [`StackSource`]. The production source,
//! [`RegistrySource`], combines:
//! - `registry`: frames and lock annotations recorded cooperatively by
//!   instrumented threads
//! - `procfs`: kernel thread name, scheduler state and wait channel
//!
//! Tests substitute scripted sources.

pub mod procfs;
pub mod registry;

use freezemon_common::ThreadSnapshot;
use log::debug;

pub use registry::{
    current_thread_key, enter, enter_frame, holding, registry, waiting_on, FrameGuard, HoldGuard,
    ThreadRegistry, WaitGuard,
};

use self::procfs::KernelThreadInfo;
use crate::domain::{CaptureError, ThreadKey, Tid};
use crate::filter::FilterHandler;

/// Something that can snapshot the event loop thread (and optionally all threads).
pub trait StackSource: Send {
    /// Capture thread snapshots. The event loop thread comes first.
    ///
    /// # Errors
    /// Returns [`CaptureError::Disposed`] once the event loop thread is gone;
    /// the sampler stops on any error.
    fn capture(
        &mut self,
        ui_thread: ThreadKey,
        all_threads: bool,
    ) -> Result<Vec<ThreadSnapshot>, CaptureError>;
}

/// Captures from the global thread registry, enriched with `/proc` data.
#[derive(Debug, Default)]
pub struct RegistrySource {
    uninteresting: FilterHandler,
}

impl RegistrySource {
    /// Threads whose innermost frame matches `uninteresting` are left out of
    /// all-thread captures. The event loop thread is always kept.
    #[must_use]
    pub fn new(uninteresting: FilterHandler) -> Self {
        Self { uninteresting }
    }
}

impl StackSource for RegistrySource {
    fn capture(
        &mut self,
        ui_thread: ThreadKey,
        all_threads: bool,
    ) -> Result<Vec<ThreadSnapshot>, CaptureError> {
        let registry = registry();

        if !all_threads {
            let mut ui = registry
                .snapshot(ui_thread)
                .ok_or(CaptureError::Disposed(ui_thread.as_u64()))?;
            if let Some(info) = ui.tid.and_then(|tid| procfs::read_thread(Tid(tid)).ok()) {
                enrich(&mut ui, &info);
            }
            return Ok(vec![ui]);
        }

        let mut registered = registry.snapshot_all();
        let Some(ui_idx) = registered.iter().position(|t| t.id == ui_thread.as_u64()) else {
            return Err(CaptureError::Disposed(ui_thread.as_u64()));
        };
        let ui = registered.remove(ui_idx);

        let kernel_threads = procfs::list_threads().unwrap_or_else(|e| {
            debug!("Failed to list /proc/self/task: {e}");
            Vec::new()
        });

        let (skipped, kept): (Vec<ThreadSnapshot>, Vec<ThreadSnapshot>) =
            registered.into_iter().partition(|t| self.uninteresting.matches_top_frame(t));
        let skipped_tids: Vec<u32> = skipped.iter().filter_map(|t| t.tid).collect();

        let mut threads = Vec::with_capacity(kernel_threads.len().max(kept.len() + 1));
        threads.push(ui);
        threads.extend(kept);

        for snapshot in &mut threads {
            if let Some(info) = snapshot.tid.and_then(|tid| kernel_threads.iter().find(|k| k.tid.0 == tid)) {
                enrich(snapshot, info);
            }
        }

        // Threads that never recorded a frame, listed from the kernel side
        for info in &kernel_threads {
            if skipped_tids.contains(&info.tid.0) {
                continue;
            }
            if !threads.iter().any(|t| t.tid == Some(info.tid.0)) {
                let mut snapshot = ThreadSnapshot { tid: Some(info.tid.0), ..ThreadSnapshot::default() };
                enrich(&mut snapshot, info);
                threads.push(snapshot);
            }
        }

        Ok(threads)
    }
}

/// Merge kernel information into a recorded snapshot
fn enrich(snapshot: &mut ThreadSnapshot, info: &KernelThreadInfo) {
    snapshot.state = info.state;
    snapshot.wait_channel.clone_from(&info.wait_channel);
    if snapshot.name.is_empty() || snapshot.name == "<unnamed>" {
        snapshot.name.clone_from(&info.comm);
    }
}
