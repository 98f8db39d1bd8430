//! Basic CLI E2E tests.
//!
//! Tests invoke CLI commands via cargo run and verify outputs. They run
//! against a dev data directory (FOCUSPACT_ENV=dev) to keep real data out
//! of the way.

use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(args: &[&str]) -> (String, String, i32) {
    let output = Command::new("cargo")
        .args(["run", "-p", "focuspact-cli", "--"])
        .args(args)
        .env("FOCUSPACT_ENV", "dev")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

#[test]
fn test_user_register_and_show() {
    let (stdout, _, code) = run_cli(&[
        "user",
        "register",
        "cli-test-user",
        "--identity",
        "cli-test@example.com",
        "--name",
        "CLI Test",
    ]);
    assert_eq!(code, 0, "user register failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("register output is JSON");
    assert_eq!(parsed["id"], "cli-test-user");

    let (stdout, _, code) = run_cli(&["user", "show", "cli-test-user"]);
    assert_eq!(code, 0, "user show failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("show output is JSON");
    assert_eq!(parsed["username"], "CLI Test");
}

#[test]
fn test_session_record_and_stats() {
    let _ = run_cli(&[
        "user",
        "register",
        "cli-stats-user",
        "--identity",
        "cli-stats@example.com",
        "--name",
        "Stats",
    ]);

    let (stdout, stderr, code) = run_cli(&[
        "session",
        "record",
        "--user",
        "cli-stats-user",
        "--duration",
        "1500",
    ]);
    assert_eq!(code, 0, "session record failed: {stderr}");
    assert!(!stdout.trim().is_empty(), "record should print the session id");

    let (stdout, _, code) = run_cli(&["stats", "show", "--user", "cli-stats-user"]);
    assert_eq!(code, 0, "stats show failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("stats output is JSON");
    assert!(parsed["total"].as_u64().unwrap() >= 1);
}

#[test]
fn test_anonymous_stats_are_zeroed() {
    let (stdout, _, code) = run_cli(&["stats", "show"]);
    assert_eq!(code, 0, "anonymous stats should not error");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("stats output is JSON");
    assert_eq!(parsed["total"], 0);
}

#[test]
fn test_anonymous_record_fails() {
    let (_, stderr, code) = run_cli(&["session", "record", "--duration", "1500"]);
    assert_ne!(code, 0, "anonymous record must fail");
    assert!(stderr.contains("error"), "stderr should carry the error");
}

#[test]
fn test_pact_sweep_runs() {
    let (stdout, _, code) = run_cli(&["pact", "sweep"]);
    assert_eq!(code, 0, "pact sweep failed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).expect("sweep output is JSON");
    assert!(parsed["examined"].is_u64());
}

#[test]
fn test_config_show_is_toml() {
    let (stdout, _, code) = run_cli(&["config", "show"]);
    assert_eq!(code, 0, "config show failed");
    assert!(stdout.contains("[fitness]"));
    assert!(stdout.contains("[limits]"));
}
