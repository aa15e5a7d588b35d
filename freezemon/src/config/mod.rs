//! Monitor configuration
//!
//! [`Parameters`] is created once at startup, either from defaults, a JSON file,
//! or CLI overrides (see [`crate::cli`]), and is validated as a unit before the
//! monitor starts. A rejected configuration never reaches the sampler.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::ConfigError;
use crate::filter::parse_filter_list;

/// Freeze monitor parameters. All durations are milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// A dispatch at least this long is reported as a freeze
    pub long_event_threshold_ms: u64,
    /// Interval between stack samples of one stalled dispatch
    pub sample_interval_ms: u64,
    /// Delay after dispatch start before the first sample is taken
    pub initial_sample_delay_ms: u64,
    /// Upper bound on retained samples per freeze
    pub max_stack_samples: usize,
    /// A dispatch still running after this long is reported as a probable deadlock
    pub deadlock_threshold_ms: u64,
    /// Capture every known thread, not just the event loop thread
    pub dump_all_threads: bool,
    /// Write reports through the process log
    pub log_to_error_log: bool,
    /// Comma-separated `Class.method` entries; a freeze whose event loop stack
    /// contains one of them is not reported
    pub ui_thread_filter: String,
    /// Comma-separated `Class.method` entries; threads whose top frame matches
    /// are left out of all-thread dumps
    pub uninteresting_thread_filter: String,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            long_event_threshold_ms: 500,
            sample_interval_ms: 100,
            initial_sample_delay_ms: 300,
            max_stack_samples: 10,
            deadlock_threshold_ms: 300_000,
            dump_all_threads: false,
            log_to_error_log: true,
            ui_thread_filter: String::new(),
            uninteresting_thread_filter: String::new(),
        }
    }
}

impl Parameters {
    /// Load parameters from a JSON file. Missing fields take their defaults.
    ///
    /// The result is validated before it is returned.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if the
    /// resulting parameters are invalid
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let params: Parameters = serde_json::from_str(&content)?;
        params.validate()?;
        Ok(params)
    }

    /// Check every constraint, returning the first violation.
    ///
    /// # Errors
    /// Returns the first [`ConfigError`] describing an invalid field or combination
    pub fn validate(&self) -> Result<(), ConfigError> {
        let long = self.long_event_threshold_ms;
        if long == 0 {
            return Err(ConfigError::ZeroLongEventThreshold);
        }
        if self.sample_interval_ms == 0 || self.sample_interval_ms >= long {
            return Err(ConfigError::InvalidSampleInterval { sample: self.sample_interval_ms, long });
        }
        if self.initial_sample_delay_ms == 0 || self.initial_sample_delay_ms >= long {
            return Err(ConfigError::InvalidInitialSampleDelay {
                delay: self.initial_sample_delay_ms,
                long,
            });
        }
        if self.max_stack_samples < 2 {
            return Err(ConfigError::TooFewStackSamples(self.max_stack_samples));
        }
        if self.deadlock_threshold_ms <= long {
            return Err(ConfigError::DeadlockThresholdTooLow {
                deadlock: self.deadlock_threshold_ms,
                long,
            });
        }
        parse_filter_list(&self.ui_thread_filter)?;
        parse_filter_list(&self.uninteresting_thread_filter)?;
        Ok(())
    }
}
