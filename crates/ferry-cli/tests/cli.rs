//! Integration tests for the `ferry` and `ferry-isolated` binaries.

use std::path::PathBuf;
use std::process::{Command, Output};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn ferry(cwd: &str, file: &str) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ferry"))
        .arg(file)
        .current_dir(fixtures_dir().join(cwd))
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to spawn ferry")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_runs_module_tree() {
    let output = ferry("app", "main.js");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "hello from util\nmain got 41\n");
}

#[test]
fn test_entry_relative_to_cwd_dependencies_relative_to_module() {
    // Started from the fixtures root, `main.js` still finds `./util.js`
    // next to itself.
    let output = ferry(".", "app/main.js");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).ends_with("main got 41\n"));
}

#[test]
fn test_missing_file_fails() {
    let output = ferry("app", "nope.js");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Cannot find module"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_syntax_error_fails_before_running() {
    let output = ferry("broken", "main.js");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("SyntaxError"));
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_cycle_reports_stack_exhaustion() {
    let output = ferry("cycle", "a.js");
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Maximum call stack size exceeded"));
}

#[test]
fn test_missing_argument_is_usage_error() {
    let output = Command::new(env!("CARGO_BIN_EXE_ferry"))
        .output()
        .expect("failed to spawn ferry");
    assert!(!output.status.success());
    assert!(stderr(&output).contains("Usage"));
}

#[test]
fn test_isolated_runner() {
    let output = Command::new(env!("CARGO_BIN_EXE_ferry-isolated"))
        .arg("main.js")
        .current_dir(fixtures_dir().join("solo"))
        .output()
        .expect("failed to spawn ferry-isolated");
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output), "alone undefined\n");
}
