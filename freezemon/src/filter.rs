//! Call-site filters for known slow operations.
//!
//! Some calls block the event loop by design (native modal dialogs, file
//! pickers, clipboard round trips). A freeze that passes through one of them
//! is noise, so the monitor drops it before any logger sees it.
//!
//! # Filter Syntax
//!
//! A flat comma-separated list of `Class.method` entries. The last separator
//! splits class from method, and both Java-style dots and Rust-style `::`
//! paths are accepted:
//!
//! ```text
//! org.eclipse.swt.internal.gtk.OS.gtk_dialog_run, app::dialogs::FilePicker::run
//! ```
//!
//! Matching is exact on both the class and the method name.

use freezemon_common::{Frame, StackSample, ThreadSnapshot};
use log::warn;

use crate::domain::ConfigError;

/// One `(class, method)` filter pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct FilterEntry {
    pub class: String,
    pub method: String,
}

impl FilterEntry {
    fn parse(entry: &str) -> Result<Self, ConfigError> {
        // Whichever separator comes last wins: `a::B.run` splits at the dot
        let colons = entry.rfind("::").map(|idx| (idx, idx + 2));
        let dot = entry.rfind('.').map(|idx| (idx, idx + 1));
        let split = match (colons, dot) {
            (Some(c), Some(d)) => Some(if d.0 > c.0 { d } else { c }),
            (c, d) => c.or(d),
        }
        .map(|(end, start)| (&entry[..end], &entry[start..]));

        match split {
            Some((class, method)) if !class.is_empty() && !method.is_empty() => {
                Ok(Self { class: class.to_string(), method: method.to_string() })
            }
            _ => Err(ConfigError::InvalidFilter(entry.to_string())),
        }
    }
}

/// Parse a comma-separated filter list into sorted, deduplicated entries.
///
/// Blank entries are skipped, so an empty string yields an empty list.
///
/// # Errors
/// Returns [`ConfigError::InvalidFilter`] for an entry without both a class and a method
pub fn parse_filter_list(list: &str) -> Result<Vec<FilterEntry>, ConfigError> {
    let mut entries = list
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(FilterEntry::parse)
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();
    entries.dedup();
    Ok(entries)
}

/// Decides whether a captured freeze should reach the loggers.
#[derive(Debug, Clone, Default)]
pub struct FilterHandler {
    filters: Vec<FilterEntry>,
}

impl FilterHandler {
    /// Build a handler from a comma-separated filter list
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidFilter`] for a malformed entry
    pub fn new(list: &str) -> Result<Self, ConfigError> {
        Ok(Self { filters: parse_filter_list(list)? })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Entries in iteration order (sorted by class, then method)
    #[must_use]
    pub fn entries(&self) -> &[FilterEntry] {
        &self.filters
    }

    /// Exact `(class, method)` match against one frame
    #[must_use]
    pub fn matches(&self, frame: &Frame) -> bool {
        self.filters
            .binary_search_by(|f| {
                (f.class.as_str(), f.method.as_str()).cmp(&(frame.class.as_str(), frame.method.as_str()))
            })
            .is_ok()
    }

    /// True if any frame of the thread matches
    #[must_use]
    pub fn matches_stack(&self, thread: &ThreadSnapshot) -> bool {
        thread.frames.iter().any(|frame| self.matches(frame))
    }

    /// True if the thread's innermost frame matches
    #[must_use]
    pub fn matches_top_frame(&self, thread: &ThreadSnapshot) -> bool {
        thread.top_frame().is_some_and(|frame| self.matches(frame))
    }

    /// Returns `false` if the event loop thread's stack in any sample contains a
    /// filtered frame.
    ///
    /// A sample without the event loop thread is reported with a warning and
    /// does not suppress the event.
    #[must_use]
    pub fn should_log_event(&self, samples: &[StackSample], ui_thread_id: u64) -> bool {
        if self.filters.is_empty() {
            return true;
        }
        for sample in samples {
            match sample.thread(ui_thread_id) {
                Some(thread) if self.matches_stack(thread) => return false,
                Some(_) => {}
                None => warn!(
                    "Event loop thread {ui_thread_id} missing from stack sample at {}ms",
                    sample.timestamp_ms
                ),
            }
        }
        true
    }
}
