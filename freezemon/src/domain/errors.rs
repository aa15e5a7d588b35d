//! Structured error types for freezemon
//!
//! Using thiserror for automatic Display implementation and error chaining.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("long_event_threshold_ms must be greater than 0")]
    ZeroLongEventThreshold,

    #[error("sample_interval_ms ({sample}) must be between 1 and long_event_threshold_ms ({long}), exclusive")]
    InvalidSampleInterval { sample: u64, long: u64 },

    #[error("initial_sample_delay_ms ({delay}) must be between 1 and long_event_threshold_ms ({long}), exclusive")]
    InvalidInitialSampleDelay { delay: u64, long: u64 },

    #[error("max_stack_samples must be at least 2, got {0}")]
    TooFewStackSamples(usize),

    #[error("deadlock_threshold_ms ({deadlock}) must be greater than long_event_threshold_ms ({long})")]
    DeadlockThresholdTooLow { deadlock: u64, long: u64 },

    #[error("Invalid filter entry \"{0}\": expected <Class>.<method>")]
    InvalidFilter(String),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Invalid monitor parameters: {0}")]
    InvalidParameters(#[from] ConfigError),

    #[error("Failed to spawn sampling thread: {0}")]
    SpawnFailed(#[source] std::io::Error),

    #[error("Monitor must be shut down from the event loop thread that started it")]
    WrongThread,

    #[error("Sampling thread panicked")]
    SamplerPanicked,
}

#[derive(Error, Debug)]
pub enum CaptureError {
    /// The event loop thread is gone; the host is shutting down.
    #[error("Event loop thread {0} is no longer registered")]
    Disposed(u64),
}

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to parse freeze log: {0}")]
    ParseFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
