//! Kernel-side thread information from `/proc/self/task`
//!
//! Fills in what cooperative frame recording cannot know: the kernel thread
//! name, the scheduler state, and the wait channel a blocked thread sleeps in.
//! Everything here is best effort; non-Linux targets report nothing.

use freezemon_common::ThreadState;

use crate::domain::Tid;

/// Kernel view of one thread in this process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelThreadInfo {
    pub tid: Tid,
    pub comm: String,
    pub state: ThreadState,
    pub wait_channel: Option<String>,
}

/// Kernel thread id of the calling thread
#[cfg(target_os = "linux")]
#[allow(unsafe_code, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
#[must_use]
pub fn current_tid() -> Option<Tid> {
    // SAFETY: gettid takes no arguments and cannot fail
    let tid = unsafe { libc::syscall(libc::SYS_gettid) };
    (tid > 0).then(|| Tid(tid as u32))
}

#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn current_tid() -> Option<Tid> {
    None
}

/// Niceness requested for the sampling thread
pub const SAMPLER_NICE: i32 = -5;

/// Raise the calling thread's scheduling priority to `nice`.
///
/// Lowering niceness needs `CAP_SYS_NICE`; callers treat failure as harmless.
///
/// # Errors
/// Returns the OS error if the thread id is unknown or the change is not permitted
#[cfg(target_os = "linux")]
#[allow(unsafe_code)]
pub fn raise_current_thread_priority(nice: i32) -> std::io::Result<()> {
    let tid = current_tid().ok_or_else(|| std::io::Error::other("gettid failed"))?;
    // SAFETY: setpriority only reads its integer arguments; on Linux a tid
    // with PRIO_PROCESS addresses that single thread
    let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS, libc::id_t::from(tid.0), nice) };
    if rc == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

#[cfg(not(target_os = "linux"))]
pub fn raise_current_thread_priority(_nice: i32) -> std::io::Result<()> {
    Err(std::io::Error::new(std::io::ErrorKind::Unsupported, "thread priority not supported"))
}

/// Read one thread of the current process.
///
/// # Errors
/// Returns an error if the thread's `stat` file cannot be read (the thread exited)
#[cfg(target_os = "linux")]
pub fn read_thread(tid: Tid) -> std::io::Result<KernelThreadInfo> {
    let base = format!("/proc/self/task/{}", tid.0);
    let stat = std::fs::read_to_string(format!("{base}/stat"))?;
    let state = parse_stat_state(&stat).map_or(ThreadState::Unknown, ThreadState::from_proc_code);
    let comm = std::fs::read_to_string(format!("{base}/comm"))
        .map(|s| s.trim().to_string())
        .unwrap_or_default();
    let wait_channel = std::fs::read_to_string(format!("{base}/wchan"))
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "0");

    Ok(KernelThreadInfo { tid, comm, state, wait_channel })
}

#[cfg(not(target_os = "linux"))]
pub fn read_thread(tid: Tid) -> std::io::Result<KernelThreadInfo> {
    Err(std::io::Error::new(std::io::ErrorKind::Unsupported, format!("no /proc entry for {tid}")))
}

/// List every thread of the current process.
///
/// Threads that exit between the directory listing and the read are skipped.
///
/// # Errors
/// Returns an error if `/proc/self/task` cannot be listed
#[cfg(target_os = "linux")]
pub fn list_threads() -> std::io::Result<Vec<KernelThreadInfo>> {
    let mut threads: Vec<KernelThreadInfo> = std::fs::read_dir("/proc/self/task")?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let tid = entry.file_name().to_string_lossy().parse::<u32>().ok()?;
            read_thread(Tid(tid)).ok()
        })
        .collect();
    threads.sort_by_key(|t| t.tid);
    Ok(threads)
}

#[cfg(not(target_os = "linux"))]
pub fn list_threads() -> std::io::Result<Vec<KernelThreadInfo>> {
    Ok(Vec::new())
}

/// Extract the state letter from a `stat` line.
///
/// The command name is wrapped in parentheses and may itself contain spaces or
/// parentheses, so parsing starts after the last `)`.
#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_stat_state(stat: &str) -> Option<char> {
    let rest = &stat[stat.rfind(')')? + 1..];
    rest.split_whitespace().next()?.chars().next()
}
