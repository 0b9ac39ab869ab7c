//! CLI integration tests for the pretested binary.

mod common;

use common::GitFixture;
use serde_json::Value;
use std::path::Path;
use std::process::{Command, Output};

fn pretested(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_pretested"))
        .args(args)
        .current_dir(dir)
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run pretested")
}

/// Run a command with `--json`, assert success, and return the parsed
/// JSON value from stdout.
fn run_json(dir: &Path, args: &[&str]) -> Value {
    let mut full = vec!["--json"];
    full.extend_from_slice(args);
    let output = pretested(dir, &full);
    assert!(
        output.status.success(),
        "pretested {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout)
        .unwrap_or_else(|e| panic!("Failed to parse JSON from {args:?}: {e}"))
}

fn write_config(dir: &Path, fixture: &GitFixture, build: &str) -> String {
    let path = dir.join("pretested.yaml");
    let yaml = format!(
        r#"
database:
  path: {db}
jobs:
  - name: core
    workspace: {workspace}
    strategy: accumulate
    build_command: ["sh", "-c", {build:?}]
    unstable_exit_code: 3
"#,
        db = dir.join("state.db").display(),
        workspace = fixture.workspace.display(),
    );
    std::fs::write(&path, yaml).unwrap();
    path.display().to_string()
}

#[test]
fn test_init_then_status() {
    let dir = tempfile::tempdir().unwrap();

    let init = run_json(dir.path(), &["init"]);
    assert_eq!(init["success"], true);
    assert!(dir.path().join(".pretested/config.yaml").exists());

    let status = run_json(dir.path(), &["status"]);
    assert_eq!(status["jobs"].as_array().unwrap().len(), 0);

    let again = run_json(dir.path(), &["init"]);
    assert_eq!(again["success"], false);
}

#[test]
fn test_run_integrates_and_records_marker() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = GitFixture::new();
    let x = fixture.push_commit("ready", "bob", "add x", &[("x.txt", "x\n")]);
    let config = write_config(dir.path(), &fixture, "test -f x.txt");

    let candidates = run_json(dir.path(), &["--config", &config, "candidates", "--job", "core"]);
    assert_eq!(candidates["candidates"][0]["id"], x.as_str());

    let run = run_json(dir.path(), &["--config", &config, "run"]);
    assert_eq!(run["success"], true);
    let cycles = run["jobs"][0]["cycles"].as_array().unwrap();
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0]["verdict"], "success");
    assert_eq!(cycles[0]["integrated"], true);

    let status = run_json(dir.path(), &["--config", &config, "status"]);
    assert_eq!(status["jobs"][0]["last_integrated"], x.as_str());
    assert_eq!(
        status["jobs"][0]["last_pushed_head"],
        fixture.head("master").unwrap().as_str()
    );

    let idle = run_json(dir.path(), &["--config", &config, "run", "--job", "core"]);
    assert_eq!(idle["jobs"][0]["cycles"].as_array().unwrap().len(), 0);
}

#[test]
fn test_failed_build_leaves_target_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = GitFixture::new();
    let before = fixture.head("master");
    fixture.push_commit("ready", "bob", "add x", &[("x.txt", "x\n")]);
    let config = write_config(dir.path(), &fixture, "exit 1");

    let run = run_json(dir.path(), &["--config", &config, "run"]);
    let cycle = &run["jobs"][0]["cycles"][0];
    assert_eq!(cycle["verdict"], "failure");
    assert_eq!(cycle["integrated"], false);
    assert_eq!(fixture.head("master"), before);

    let status = run_json(dir.path(), &["--config", &config, "status"]);
    assert!(status["jobs"][0]["last_integrated"].is_null());
    assert!(status["jobs"][0]["rejected_head"].is_string());
}

#[test]
fn test_unknown_job_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = GitFixture::new();
    let config = write_config(dir.path(), &fixture, "true");

    let output = pretested(dir.path(), &["--json", "--config", &config, "run", "--job", "nope"]);
    assert!(!output.status.success());
    let value: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["success"], false);
    assert!(value["error"].as_str().unwrap().contains("nope"));
}

#[test]
fn test_missing_config_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let output = pretested(dir.path(), &["--config", "missing.yaml", "status"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("does not exist"));
}
