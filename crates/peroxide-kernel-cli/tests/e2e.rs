//! End-to-end tests for the peroxide-kernel binary.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin for tests

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

// =============================================================================
// Test Helpers
// =============================================================================

fn kernel() -> Command {
    Command::cargo_bin("peroxide-kernel").expect("binary should be built")
}

fn read_json(path: &std::path::Path) -> serde_json::Value {
    let text = fs::read_to_string(path).expect("kernel.json should exist");
    serde_json::from_str(&text).expect("kernel.json should be valid JSON")
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_spec_prints_kernel_json() {
    let output = kernel().arg("spec").output().unwrap();
    assert!(output.status.success());

    let spec: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(spec["display_name"], "Peroxide Scheme");
    assert_eq!(spec["language"], "scheme");
    assert_eq!(spec["argv"][1], "run");
    assert_eq!(spec["argv"][2], "--connection-file");
    assert_eq!(spec["argv"][3], "{connection_file}");
}

#[test]
fn test_install_with_prefix() {
    let temp = TempDir::new().unwrap();

    kernel()
        .args(["install", "--prefix"])
        .arg(temp.path())
        .args(["--interpreter", "/opt/peroxide/bin/peroxide"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installed kernelspec peroxide"));

    let spec = read_json(
        &temp
            .path()
            .join("share/jupyter/kernels/peroxide/kernel.json"),
    );
    assert_eq!(spec["argv"][4], "--interpreter");
    assert_eq!(spec["argv"][5], "/opt/peroxide/bin/peroxide");
}

#[test]
fn test_install_user_honors_jupyter_data_dir() {
    let temp = TempDir::new().unwrap();

    kernel()
        .env("JUPYTER_DATA_DIR", temp.path())
        .args(["install", "--user", "--name", "scheme-dev"])
        .assert()
        .success();

    let spec = read_json(&temp.path().join("kernels/scheme-dev/kernel.json"));
    assert_eq!(spec["display_name"], "Peroxide Scheme");
}

#[test]
fn test_install_user_and_prefix_conflict() {
    kernel()
        .args(["install", "--user", "--prefix", "/tmp/somewhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_run_with_missing_connection_file() {
    let temp = TempDir::new().unwrap();

    kernel()
        .args(["run", "--connection-file"])
        .arg(temp.path().join("missing.json"))
        .args(["--interpreter", "/nonexistent/peroxide"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Bad connection file"));
}

#[test]
fn test_run_with_missing_interpreter() {
    let temp = TempDir::new().unwrap();
    let connection_file = temp.path().join("kernel.json");
    fs::write(
        &connection_file,
        r#"{"ip": "127.0.0.1", "transport": "tcp", "shell_port": 0, "iopub_port": 0,
            "stdin_port": 0, "control_port": 0, "hb_port": 0, "key": ""}"#,
    )
    .unwrap();

    kernel()
        .args(["run", "--connection-file"])
        .arg(&connection_file)
        .args(["--interpreter", "/nonexistent/peroxide"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("hint:"));
}
