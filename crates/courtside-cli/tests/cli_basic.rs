//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against a throwaway data directory and
//! verify outputs.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_courtside"))
        .args(args)
        .env("COURTSIDE_HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(home: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "circuit.work"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "45");

    let (_, _, code) = run_cli(home.path(), &["config", "set", "circuit.work", "60"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(home.path(), &["config", "get", "circuit.work"]);
    assert_eq!(stdout.trim(), "60");
}

#[test]
fn test_config_unknown_key_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["config", "get", "circuit.nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("error:"));
}

#[test]
fn test_circuit_lifecycle() {
    let home = tempfile::tempdir().unwrap();
    let home = home.path();

    let status = run_json(home, &["circuit", "status"]);
    assert_eq!(status["record"]["status"], "idle");

    let started = run_json(
        home,
        &["circuit", "start", "--work", "30", "--rest", "10", "--station", "a", "--station", "b"],
    );
    assert_eq!(started["type"], "SessionStarted");

    let status = run_json(home, &["circuit", "status"]);
    assert_eq!(status["record"]["status"], "running");
    assert_eq!(status["state"]["derived"]["phase"], "work");
    assert_eq!(status["station"], "a");

    let paused = run_json(home, &["circuit", "pause"]);
    assert_eq!(paused["type"], "SessionPaused");

    // Pausing twice is ignored, not an error.
    let (_, stderr, code) = run_cli(home, &["circuit", "pause"]);
    assert_eq!(code, 0);
    assert!(stderr.contains("ignored"));

    let resumed = run_json(home, &["circuit", "resume"]);
    assert_eq!(resumed["type"], "SessionResumed");

    let reset = run_json(home, &["circuit", "reset"]);
    assert_eq!(reset["type"], "SessionReset");
    let status = run_json(home, &["circuit", "status"]);
    assert_eq!(status["record"]["status"], "idle");
    assert_eq!(status["record"]["stations"], serde_json::json!(["a", "b"]));
}

#[test]
fn test_circuit_start_without_stations_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["circuit", "start"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("stations"));
}

#[test]
fn test_circuit_watch_prints_initial_state() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) =
        run_cli(home.path(), &["circuit", "watch", "--updates", "1"]);
    assert_eq!(code, 0, "{stderr}");
    let line: serde_json::Value = serde_json::from_str(stdout.lines().next().unwrap()).unwrap();
    assert_eq!(line["reason"], "initial");
    assert_eq!(line["derived"]["phase"], "idle");
}

#[test]
fn test_circuit_simulate_completes() {
    let home = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(
        home.path(),
        &["config", "set", "circuit.stations", "a,b"],
    );
    assert_eq!(code, 0);
    run_cli(home.path(), &["config", "set", "circuit.work", "3"]);
    run_cli(home.path(), &["config", "set", "circuit.rest", "1"]);
    run_cli(home.path(), &["config", "set", "circuit.rounds", "1"]);

    let (stdout, stderr, code) = run_cli(home.path(), &["circuit", "simulate"]);
    assert_eq!(code, 0, "{stderr}");
    assert!(stdout.contains("\"SessionCompleted\""));
}

#[test]
fn test_stretch_tracks() {
    let home = tempfile::tempdir().unwrap();
    let home = home.path();

    let started = run_json(home, &["stretch", "stat", "start", "--items", "3"]);
    assert_eq!(started["type"], "SessionStarted");

    let status = run_json(home, &["stretch", "stat", "status"]);
    assert_eq!(status["track"]["status"], "running");
    assert_eq!(status["track"]["duration"], 20);
    assert_eq!(status["track"]["items"], 3);

    let dynamic = run_json(home, &["stretch", "dyn", "status"]);
    assert_eq!(dynamic["track"]["status"], "idle");

    let settings = run_json(
        home,
        &["stretch", "settings", "--dyn-duration", "40", "--stat-duration", "10"],
    );
    assert_eq!(settings["dyn"]["duration"], 40);
    assert_eq!(settings["applied"], true);
    let dynamic = run_json(home, &["stretch", "dyn", "status"]);
    assert_eq!(dynamic["track"]["duration"], 40);
    // The running track keeps the duration it started with.
    let status = run_json(home, &["stretch", "stat", "status"]);
    assert_eq!(status["track"]["duration"], 20);
}

#[test]
fn test_stretch_start_requires_items() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["stretch", "dyn", "start"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("--items"));

    run_json(home.path(), &["stretch", "dyn", "start", "--items", "4"]);
    // A second start while running is ignored and keeps the stored count.
    let (_, stderr, code) = run_cli(home.path(), &["stretch", "dyn", "start", "--items", "1"]);
    assert_eq!(code, 0);
    assert!(stderr.contains("ignored"));
    let status = run_json(home.path(), &["stretch", "dyn", "status"]);
    assert_eq!(status["track"]["items"], 4);
}

#[test]
fn test_drill_run() {
    let home = tempfile::tempdir().unwrap();
    let (stdout, stderr, code) = run_cli(home.path(), &["drill", "run", "--duration", "3"]);
    assert_eq!(code, 0, "{stderr}");
    assert!(stdout.contains("00:02"));
    assert!(stdout.contains("DrillCompleted"));
}
