//! Human-mode end-to-end tests.

use assert_cmd::Command;
use predicates::prelude::*;

use crate::common::cli::CliRunner;
use crate::common::init_test_logging;

#[test]
fn quick_start_lists_commands() {
    init_test_logging();
    let cli = CliRunner::new();
    cli.run(&[])
        .assert_success()
        .assert_stdout_contains("rdeck")
        .assert_stdout_contains("add-device")
        .assert_stdout_contains("Run 'rdeck --help'");
}

#[test]
fn devices_render_as_a_table() {
    init_test_logging();
    let cli = CliRunner::new();
    cli.run(&["devices"])
        .assert_success()
        .assert_stdout_contains("Left Device")
        .assert_stdout_contains("localhost:8002")
        .assert_stdout_contains("device_default");
}

#[test]
fn empty_device_points_at_profile_add() {
    init_test_logging();
    let cli = CliRunner::new();
    cli.run(&["profiles"])
        .assert_success()
        .assert_stdout_contains("No profiles");
}

#[test]
fn errors_carry_a_hint() {
    init_test_logging();
    let cli = CliRunner::new();
    cli.run(&["--device", "ghost", "devices"])
        .assert_failure()
        .assert_stderr_contains("Device not found: ghost")
        .assert_stderr_contains("rdeck devices");
}

#[test]
fn config_path_prints_the_settings_location() {
    init_test_logging();
    let cli = CliRunner::new();
    let expected = cli.config_path().display().to_string();
    cli.run(&["config", "--path"])
        .assert_success()
        .assert_stdout_contains(&expected);
}

#[test]
fn missing_explicit_settings_file_is_an_error() {
    init_test_logging();
    let dir = tempfile::TempDir::new().unwrap();
    Command::cargo_bin("rdeck")
        .unwrap()
        .env("RDECK_CONFIG", dir.path().join("absent.toml"))
        .env("RUST_LOG", "off")
        .arg("devices")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn completions_are_generated() {
    Command::cargo_bin("rdeck")
        .unwrap()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("rdeck"));
}

#[test]
fn unknown_subcommand_fails() {
    Command::cargo_bin("rdeck")
        .unwrap()
        .arg("teleport")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn clone_conflicts_with_template() {
    Command::cargo_bin("rdeck")
        .unwrap()
        .args(["add-device", "A", "h", "--clone", "--template", "builtin_mac"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}
