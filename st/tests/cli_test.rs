//! CLI smoke tests for the `st` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `st` with every directory it touches redirected into `home`
fn st(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("st").unwrap();
    cmd.current_dir(home.path())
        .env("HOME", home.path())
        .env("XDG_DATA_HOME", home.path().join("data"))
        .env("XDG_CONFIG_HOME", home.path().join("config"))
        .env("XDG_RUNTIME_DIR", home.path().join("run"));
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let home = TempDir::new().unwrap();
    st(&home)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("daemon"))
        .stdout(predicate::str::contains("self-test"))
        .stdout(predicate::str::contains("workloads"));
}

#[test]
fn test_workloads_lists_registry() {
    let home = TempDir::new().unwrap();
    st(&home)
        .arg("workloads")
        .assert()
        .success()
        .stdout(predicate::str::contains("command_spam"))
        .stdout(predicate::str::contains("throw_exception"));
}

#[test]
fn test_self_test_without_daemon_fails() {
    let home = TempDir::new().unwrap();
    st(&home)
        .args(["self-test", "background", "stop"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Is the daemon running?"));
}

#[test]
fn test_daemon_status_when_stopped() {
    let home = TempDir::new().unwrap();
    st(&home)
        .args(["daemon", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("stopped"));
}

#[test]
fn test_explicit_missing_config_fails() {
    let home = TempDir::new().unwrap();
    st(&home)
        .args(["--config", "does-not-exist.yml", "workloads"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load configuration"));
}
