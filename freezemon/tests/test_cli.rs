use std::process::Command;

fn freezemon() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_freezemon"));
    cmd.env("RUST_LOG", "warn");
    cmd
}

#[test]
fn test_invalid_parameters_exit_with_usage_code() {
    let status = freezemon()
        .args(["--quiet", "--long-event-threshold", "100", "--sample-interval", "100", "--duration", "1"])
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));
}

#[test]
fn test_malformed_config_exits_with_usage_code() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("monitor.json");
    std::fs::write(&config, "{ not json").unwrap();

    let status = freezemon().arg("--config").arg(&config).args(["--quiet"]).status().unwrap();
    assert_eq!(status.code(), Some(2));
}

#[test]
fn test_demo_run_exports_freeze() {
    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("freezes.jsonl");
    let config = dir.path().join("monitor.json");
    std::fs::write(&config, r#"{"long_event_threshold_ms": 200, "sample_interval_ms": 50, "initial_sample_delay_ms": 50}"#).unwrap();

    let status = freezemon()
        .arg("--config")
        .arg(&config)
        .args(["--max-stack-samples", "6", "--no-error-log", "--quiet", "--duration", "4"])
        .arg("--export")
        .arg(&export)
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(0));

    let events = freezemon::export::read_events(&export).unwrap();
    let rebuild = events
        .iter()
        .find(|e| e.ui_thread_snapshots().any(|(_, t)| t.frames.iter().any(|f| f.method == "rebuild")))
        .expect("index rebuild reported");
    assert!(rebuild.duration_ms >= 1_200);
    assert!(!rebuild.still_running);
}
