//! CLI integration tests
//!
//! Tests the command-line interface using assert_cmd

mod common;

use assert_cmd::Command;
use predicates::prelude::*;

use common::{fixture_path, valid_config_fixture};

/// Get a command for the delegate-runtime binary
fn runtime_cmd() -> Command {
    Command::cargo_bin("delegate-runtime").unwrap()
}

/// Command preloaded with the valid test configuration
fn configured_cmd() -> Command {
    let mut cmd = runtime_cmd();
    cmd.arg("--config").arg(valid_config_fixture());
    cmd
}

// ─────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_help_flag() {
    runtime_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Delegate Runtime"))
        .stdout(predicate::str::contains("backends"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("option"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_command() {
    runtime_cmd()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("delegate-runtime"))
        .stdout(predicate::str::contains("Build Information"))
        .stdout(predicate::str::contains("Git Hash"))
        .stdout(predicate::str::contains("cpu_ref"));
}

#[test]
fn test_short_version_flag() {
    runtime_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("delegate-runtime"));
}

// ─────────────────────────────────────────────────────────────────
// Backends Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_backends_lists_cpu_ref() {
    configured_cmd()
        .arg("backends")
        .assert()
        .success()
        .stdout(predicate::str::contains("cpu_ref"))
        .stdout(predicate::str::contains("yes"))
        .stdout(predicate::str::contains("1 of 4 slots used"));
}

#[test]
fn test_backends_empty_registry() {
    runtime_cmd()
        .arg("--config")
        .arg(fixture_path("cpu_ref_disabled.toml"))
        .arg("backends")
        .assert()
        .success()
        .stdout(predicate::str::contains("No backends registered."));
}

// ─────────────────────────────────────────────────────────────────
// Run Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_run_help() {
    runtime_cmd()
        .arg("run")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--backend"))
        .stdout(predicate::str::contains("--spec"))
        .stdout(predicate::str::contains("--input"))
        .stdout(predicate::str::contains("--iterations"));
}

#[test]
fn test_run_scale_relu() {
    configured_cmd()
        .arg("run")
        .arg(fixture_path("scale_relu.json"))
        .args(["-i", "1,-4,0.5", "-i", "1,1,1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("output[0] = tensor[3][4, 0, 3]"));
}

#[test]
fn test_run_repeated_iterations() {
    configured_cmd()
        .arg("run")
        .arg(fixture_path("scale_relu.json"))
        .args(["-i", "1,-4,0.5", "-i", "1,1,1", "-n", "3"])
        .args(["--option", "num_threads=1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tensor[3][4, 0, 3]"));
}

#[test]
fn test_run_with_named_data() {
    configured_cmd()
        .arg("run")
        .arg(fixture_path("add_bias.json"))
        .args(["-i", "1,2,3", "--data", "bias=0.5,0.5,0.5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tensor[3][1.5, 2.5, 3.5]"));
}

#[test]
fn test_run_missing_named_data() {
    configured_cmd()
        .arg("run")
        .arg(fixture_path("add_bias.json"))
        .args(["-i", "1,2,3"])
        .assert()
        .failure()
        .code(30)
        .stderr(predicate::str::contains("bias"));
}

#[test]
fn test_run_future_format_is_incompatible() {
    configured_cmd()
        .arg("run")
        .arg(fixture_path("future_format.json"))
        .args(["-i", "1,2,3"])
        .assert()
        .failure()
        .code(40)
        .stderr(predicate::str::contains("E030"))
        .stderr(predicate::str::contains("Recompile"));
}

#[test]
fn test_run_unknown_backend() {
    configured_cmd()
        .arg("run")
        .arg(fixture_path("scale_relu.json"))
        .args(["--backend", "npu", "-i", "1", "-i", "1"])
        .assert()
        .failure()
        .code(30)
        .stderr(predicate::str::contains("E020"))
        .stderr(predicate::str::contains("npu"));
}

#[test]
fn test_run_missing_program_file() {
    configured_cmd()
        .arg("run")
        .arg("/nonexistent/unit.json")
        .assert()
        .failure()
        .code(10);
}

#[test]
fn test_run_rejects_bad_input() {
    configured_cmd()
        .arg("run")
        .arg(fixture_path("scale_relu.json"))
        .args(["-i", "1,two", "-i", "1,1"])
        .assert()
        .failure()
        .code(20)
        .stderr(predicate::str::contains("two"));
}

// ─────────────────────────────────────────────────────────────────
// Option Command Tests
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_option_get_version() {
    configured_cmd()
        .args(["option", "get", "cpu_ref", "version", "num_threads"])
        .assert()
        .success()
        .stdout(predicate::str::contains("version=1"))
        .stdout(predicate::str::contains("num_threads=2"));
}

#[test]
fn test_option_set_known_key() {
    configured_cmd()
        .args(["option", "set", "cpu_ref", "profiling=true"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Updated 1 option(s) on 'cpu_ref'"));
}

#[test]
fn test_option_set_unknown_key_fails() {
    configured_cmd()
        .args(["option", "set", "cpu_ref", "turbo=on"])
        .assert()
        .failure()
        .code(30)
        .stderr(predicate::str::contains("turbo"));
}

#[test]
fn test_option_unknown_backend() {
    configured_cmd()
        .args(["option", "get", "dsp", "version"])
        .assert()
        .failure()
        .code(30)
        .stderr(predicate::str::contains("dsp"));
}
