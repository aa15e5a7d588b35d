//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

use crate::config::Parameters;
use crate::domain::ConfigError;

#[derive(Parser, Debug)]
#[command(
    name = "freezemon",
    about = "Run a demo event loop under the freeze monitor and report UI freezes",
    after_help = "\
EXAMPLES:
    freezemon                                        Defaults, 10 second run
    freezemon --long-event-threshold 200 --export freezes.jsonl
    freezemon --config monitor.json --filter demo::Dialog::run_modal"
)]
pub struct Args {
    /// JSON file with monitor parameters (flags below override it)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Report dispatches at least this long (ms)
    #[arg(long, value_name = "MS")]
    pub long_event_threshold: Option<u64>,

    /// Interval between stack samples (ms)
    #[arg(long, value_name = "MS")]
    pub sample_interval: Option<u64>,

    /// Delay before the first stack sample of a dispatch (ms)
    #[arg(long, value_name = "MS")]
    pub initial_sample_delay: Option<u64>,

    /// Maximum stack samples kept per freeze
    #[arg(long, value_name = "N")]
    pub max_stack_samples: Option<usize>,

    /// Report a dispatch still running after this long as a probable deadlock (ms)
    #[arg(long, value_name = "MS")]
    pub deadlock_threshold: Option<u64>,

    /// Capture all threads, not only the event loop thread
    #[arg(long)]
    pub dump_all_threads: bool,

    /// Do not write reports to the process log
    #[arg(long)]
    pub no_error_log: bool,

    /// Comma-separated Class.method call sites whose freezes are ignored
    #[arg(long, value_name = "LIST")]
    pub filter: Option<String>,

    /// Comma-separated Class.method top frames of threads left out of dumps
    #[arg(long, value_name = "LIST")]
    pub uninteresting: Option<String>,

    /// Append freeze events to this JSON Lines file
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Stop after N seconds
    #[arg(long, default_value = "10")]
    pub duration: u64,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}

impl Args {
    /// Merge the config file (if any) and flag overrides into validated parameters
    ///
    /// # Errors
    /// Returns an error if the config file cannot be loaded or the merged
    /// parameters are invalid
    pub fn to_parameters(&self) -> Result<Parameters, ConfigError> {
        let mut params = match &self.config {
            Some(path) => Parameters::from_file(path)?,
            None => Parameters::default(),
        };

        if let Some(v) = self.long_event_threshold {
            params.long_event_threshold_ms = v;
        }
        if let Some(v) = self.sample_interval {
            params.sample_interval_ms = v;
        }
        if let Some(v) = self.initial_sample_delay {
            params.initial_sample_delay_ms = v;
        }
        if let Some(v) = self.max_stack_samples {
            params.max_stack_samples = v;
        }
        if let Some(v) = self.deadlock_threshold {
            params.deadlock_threshold_ms = v;
        }
        if self.dump_all_threads {
            params.dump_all_threads = true;
        }
        if self.no_error_log {
            params.log_to_error_log = false;
        }
        if let Some(v) = &self.filter {
            params.ui_thread_filter.clone_from(v);
        }
        if let Some(v) = &self.uninteresting {
            params.uninteresting_thread_filter.clone_from(v);
        }

        params.validate()?;
        Ok(params)
    }
}
