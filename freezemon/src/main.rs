//! # freezemon - Demo Entry Point
//!
//! Runs a small single-threaded Tokio application under the freeze monitor.
//! Some of its tasks block the event loop on purpose, so the reports show what
//! a real freeze looks like:
//! - `demo::Indexer::rebuild`: blocks for a little over a second while holding a lock
//! - `demo::Dialog::run_modal`: blocks inside a nested loop; pass
//!   `--filter demo::Dialog::run_modal` to silence it

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::{Duration, Instant};

use freezemon::cli::Args;
use freezemon::domain::{ConfigError, MonitorError};
use freezemon::export::JsonLinesLogger;
use freezemon::runtime::current_thread_runtime;
use freezemon::{capture, frame, EventLoopMonitor};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let invalid_config = err.downcast_ref::<ConfigError>().is_some()
        || matches!(err.downcast_ref::<MonitorError>(), Some(MonitorError::InvalidParameters(_)));
    if invalid_config {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let quiet = args.quiet;
    let params = args.to_parameters()?;

    if !quiet {
        println!("freezemon v{}", env!("CARGO_PKG_VERSION"));
        println!(
            "long event: {}ms, sampling every {}ms, deadlock after {}ms",
            params.long_event_threshold_ms, params.sample_interval_ms, params.deadlock_threshold_ms
        );
    }

    let mut monitor = EventLoopMonitor::start(params)?;

    if let Some(ref export_path) = args.export {
        let exporter = JsonLinesLogger::create(export_path)
            .with_context(|| format!("Failed to open export file {}", export_path.display()))?;
        monitor.add_logger(Arc::new(exporter));
        if !quiet {
            println!("export: {}", export_path.display());
        }
    }

    let runtime = current_thread_runtime(&monitor.hooks()).context("Failed to build Tokio runtime")?;
    let started = Instant::now();
    let exit_reason = runtime.block_on(demo_app(args.duration));
    // Dropping the runtime parks its thread for the last time
    drop(runtime);

    monitor.shutdown()?;

    if !quiet {
        eprintln!("\n{exit_reason}: {:.1}s", started.elapsed().as_secs_f64());
    }
    Ok(())
}

/// The demo event loop: a ticker plus periodic blocking work
async fn demo_app(duration_secs: u64) -> &'static str {
    let ticker = tokio::spawn(async {
        let mut interval = tokio::time::interval(Duration::from_millis(100));
        loop {
            interval.tick().await;
            refresh_clock();
        }
    });

    let workload = tokio::spawn(async {
        let mut round = 0u64;
        loop {
            tokio::time::sleep(Duration::from_secs(2)).await;
            round += 1;
            if round % 3 == 0 {
                run_modal_dialog(Duration::from_millis(700));
            } else {
                rebuild_index(Duration::from_millis(1_200));
            }
        }
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let limit = async {
        if duration_secs > 0 {
            tokio::time::sleep(Duration::from_secs(duration_secs)).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    let reason = tokio::select! {
        () = limit => "duration limit reached",
        _ = &mut ctrl_c => "interrupted",
    };

    ticker.abort();
    workload.abort();
    reason
}

fn refresh_clock() {
    let _frame = frame!("demo::Clock", "tick");
}

/// Blocks the event loop while holding the index lock
fn rebuild_index(total: Duration) {
    let _frame = frame!("demo::Indexer", "rebuild");
    let _lock = capture::holding("demo::Indexer.lock");
    info!("Rebuilding index on the event loop thread");

    let step = total / 4;
    for _ in 0..4 {
        let _frame = frame!("demo::Indexer", "scan_segment");
        std::thread::sleep(step);
    }
}

/// A nested loop that keeps the event loop busy until the "dialog" closes
fn run_modal_dialog(total: Duration) {
    let _frame = frame!("demo::Dialog", "run_modal");
    let _wait = capture::waiting_on("demo::Dialog.closed");
    std::thread::sleep(total);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_for_invalid_config() {
        let err = anyhow::Error::from(ConfigError::ZeroLongEventThreshold);
        assert_eq!(exit_code_for(&err), EXIT_USAGE);

        let err = anyhow::Error::from(MonitorError::InvalidParameters(ConfigError::TooFewStackSamples(1)));
        assert_eq!(exit_code_for(&err), EXIT_USAGE);
    }

    #[test]
    fn test_exit_code_for_other_errors() {
        let err = anyhow::anyhow!("boom");
        assert_eq!(exit_code_for(&err), EXIT_ERROR);
        let err = anyhow::Error::from(MonitorError::WrongThread);
        assert_eq!(exit_code_for(&err), EXIT_ERROR);
    }
}
