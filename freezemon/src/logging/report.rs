//! Text rendering of freeze events
//!
//! ```text
//! UI freeze of 1.20s at 14:03:11.250
//! Sample at 14:03:11.350 (+0.100s)
//! "main" id=1 tid=48213 RUNNING
//!     at app::Indexer.rebuild(src/indexer.rs:88)
//!     at app::Main.dispatch(src/main.rs:31)
//!     - waiting on <index lock>
//!     - locked <config>
//! ```

use std::fmt::Write;

use chrono::{DateTime, Local, Utc};
use freezemon_common::{ThreadSnapshot, UiFreezeEvent};

/// Render a millisecond timestamp as local time of day
#[must_use]
pub fn format_time(timestamp_ms: u64) -> String {
    i64::try_from(timestamp_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(
            || format!("{timestamp_ms}ms"),
            |t| t.with_timezone(&Local).format("%H:%M:%S%.3f").to_string(),
        )
}

/// One-line summary of an event
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_header(event: &UiFreezeEvent) -> String {
    let secs = event.duration_ms as f64 / 1000.0;
    let at = format_time(event.start_ms);
    if event.still_running {
        format!("UI freeze of {secs:.2}s at {at} (still running, probable deadlock)")
    } else {
        format!("UI freeze of {secs:.2}s at {at}")
    }
}

/// Full multi-line report: header, then every sample with its threads
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_report(event: &UiFreezeEvent) -> String {
    let mut out = format_header(event);
    out.push('\n');

    if event.samples.is_empty() {
        out.push_str("(no stack samples captured)\n");
        return out;
    }

    for sample in &event.samples {
        let offset = sample.timestamp_ms.saturating_sub(event.start_ms) as f64 / 1000.0;
        let _ = writeln!(out, "Sample at {} (+{offset:.3}s)", format_time(sample.timestamp_ms));
        for thread in sample.threads.iter() {
            write_thread(&mut out, thread);
        }
    }
    out
}

fn write_thread(out: &mut String, thread: &ThreadSnapshot) {
    let _ = write!(out, "\"{}\" id={}", thread.name, thread.id);
    if let Some(tid) = thread.tid {
        let _ = write!(out, " tid={tid}");
    }
    let _ = writeln!(out, " {}", thread.state);

    for frame in &thread.frames {
        let _ = writeln!(out, "    at {frame}");
    }
    if let Some(lock) = &thread.waiting_on {
        let _ = writeln!(out, "    - waiting on <{lock}>");
    }
    for lock in thread.held_locks.iter().rev() {
        let _ = writeln!(out, "    - locked <{lock}>");
    }
    if let Some(wchan) = &thread.wait_channel {
        let _ = writeln!(out, "    - in kernel wait {wchan}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use freezemon_common::{Frame, StackSample, ThreadState};

    fn sample_event(still_running: bool) -> UiFreezeEvent {
        let ui = ThreadSnapshot {
            id: 1,
            tid: Some(4242),
            name: "main".to_string(),
            state: ThreadState::Blocked,
            frames: vec![
                Frame::new("app::Indexer", "rebuild").at("src/indexer.rs", 88),
                Frame::new("app::Main", "dispatch"),
            ],
            waiting_on: Some("index lock".to_string()),
            held_locks: vec!["config".to_string()],
            wait_channel: None,
        };
        UiFreezeEvent {
            start_ms: 1_000,
            duration_ms: 1_200,
            samples: vec![StackSample::new(1_100, vec![ui])],
            still_running,
            ui_thread_id: 1,
        }
    }

    #[test]
    fn test_header_mentions_duration() {
        let header = format_header(&sample_event(false));
        assert!(header.starts_with("UI freeze of 1.20s at "));
        assert!(!header.contains("still running"));
        assert!(format_header(&sample_event(true)).ends_with("(still running, probable deadlock)"));
    }

    #[test]
    fn test_report_lists_frames_and_locks() {
        let report = format_report(&sample_event(false));
        assert!(report.contains("(+0.100s)"));
        assert!(report.contains("\"main\" id=1 tid=4242 BLOCKED"));
        assert!(report.contains("    at app::Indexer.rebuild(src/indexer.rs:88)"));
        assert!(report.contains("    at app::Main.dispatch(Unknown Source)"));
        assert!(report.contains("    - waiting on <index lock>"));
        assert!(report.contains("    - locked <config>"));
    }

    #[test]
    fn test_report_without_samples() {
        let mut event = sample_event(false);
        event.samples.clear();
        assert!(format_report(&event).contains("(no stack samples captured)"));
    }
}
