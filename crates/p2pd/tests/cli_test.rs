//! Integration tests for the `p2pd` binary.
//!
//! Everything runs against the simulated engine; config lookups are
//! pointed at a throwaway directory so the user's files are never read.
#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

fn p2pd_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("p2pd");
    cmd.env("HOME", "/tmp/p2pd-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/p2pd-cli-test-nonexistent")
        .env_remove("P2PD_CONFIG")
        .env_remove("P2PD_OUTPUT")
        .env_remove("P2PD_P2P__JOIN_LIMIT")
        .env_remove("RUST_LOG");
    cmd
}

fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let output = p2pd_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(text.contains("Usage"), "missing usage:\n{text}");
}

#[test]
fn help_lists_commands() {
    p2pd_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("run")
            .and(predicate::str::contains("config"))
            .and(predicate::str::contains("completions")),
    );
}

#[test]
fn completions_bash() {
    p2pd_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── run ─────────────────────────────────────────────────────────────

#[test]
fn join_scenario_as_json() {
    let output = p2pd_cmd()
        .args(["run", "--output", "json"])
        .arg(fixture("join.yaml"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let report = stdout_json(&output);
    let steps = report["steps"].as_array().unwrap();
    assert_eq!(steps.len(), 5);
    assert!(steps.iter().all(|s| s["status"] == "SUCCESS"));
    assert_eq!(steps[4]["detail"]["outcome"], "joined");
    assert!(!report["signals"].as_array().unwrap().is_empty());
}

#[test]
fn table_output_has_sections() {
    p2pd_cmd()
        .args(["run", "--color", "never"])
        .arg(fixture("join.yaml"))
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Steps")
                .and(predicate::str::contains("await_join"))
                .and(predicate::str::contains("Bus signals")),
        );
}

#[test]
fn stale_handle_mismatch_is_reported() {
    p2pd_cmd()
        .args(["run", "--output", "plain"])
        .arg(fixture("stale.json"))
        .assert()
        .success()
        .stdout(predicate::str::contains("3\top\tp2p0\tFAILURE_IFACE_INVALID"));
}

#[test]
fn strict_mode_fails_on_mismatch() {
    p2pd_cmd()
        .args(["run", "--strict", "--output", "plain"])
        .arg(fixture("stale.json"))
        .assert()
        .code(4);
}

#[test]
fn unparseable_scenario_is_a_usage_error() {
    p2pd_cmd()
        .arg("run")
        .arg(fixture("broken.yaml"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Could not read scenario"));
}

#[test]
fn invalid_join_limit_is_a_config_error() {
    p2pd_cmd()
        .env("P2PD_P2P__JOIN_LIMIT", "0")
        .arg("run")
        .arg(fixture("join.yaml"))
        .assert()
        .code(3);
}

// ── config ──────────────────────────────────────────────────────────

#[test]
fn config_init_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("p2pd.toml");

    p2pd_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(path.exists());

    p2pd_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("already exists"));

    p2pd_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("join_limit = 3"));
}

#[test]
fn config_path_honors_flag() {
    p2pd_cmd()
        .args(["--config", "/tmp/p2pd-elsewhere.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/p2pd-elsewhere.toml"));
}

#[test]
fn config_show_as_yaml() {
    p2pd_cmd()
        .args(["config", "show", "--output", "yaml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("legacy_bus: true"));
}
