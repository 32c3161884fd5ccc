//! CLI integration tests
//!
//! Tests the torq CLI using assert_cmd. No test needs adb or a device:
//! either the command is rejected before a device is resolved, or the
//! config points adb at a path that does not exist.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn torq() -> Command {
    Command::cargo_bin("torq")
        .expect("Failed to locate torq binary - ensure it's built before running tests")
}

/// A config whose adb binary is missing, so device lookups fail cleanly
fn without_adb(dir: &Path) -> PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(
        &path,
        "[host]\nadb_path = \"/nonexistent/torq-test/adb\"\nserial_env = \"TORQ_TEST_SERIAL\"\n",
    )
    .unwrap();
    path
}

fn torq_in(dir: &TempDir) -> Command {
    let mut cmd = torq();
    cmd.current_dir(dir.path())
        .arg("--config")
        .arg(without_adb(dir.path()));
    cmd
}

#[test]
fn test_cli_help() {
    torq()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("torq"))
        .stdout(predicate::str::contains("Torq CLI tool for performance tests."));
}

#[test]
fn test_cli_version() {
    torq()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("torq"));
}

#[test]
fn test_cli_profiler_help() {
    torq()
        .args(["profiler", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--trigger-names"))
        .stdout(predicate::str::contains("--between-dur-ms"));
}

#[test]
fn test_cli_vm_configure_help() {
    torq()
        .args(["vm", "configure", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--primary-cid"));
}

#[test]
fn test_short_duration_rejected_without_subcommand() {
    let dir = TempDir::new().unwrap();
    torq_in(&dir)
        .args(["--dur-ms", "100"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Command is invalid because --dur-ms cannot be set to a value smaller than 3000.",
        ))
        .stdout(predicate::str::contains("Suggestion:"))
        .stdout(predicate::str::contains(
            "Set --dur-ms 3000 to capture a trace for 3 seconds.",
        ));
}

#[test]
fn test_app_without_app_startup_rejected() {
    let dir = TempDir::new().unwrap();
    torq_in(&dir)
        .args(["profiler", "--app", "com.example"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "--app is passed and --event is not set to app-startup",
        ));
}

#[test]
fn test_user_switch_requires_to_user() {
    let dir = TempDir::new().unwrap();
    torq_in(&dir)
        .args(["-e", "user-switch"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Command is invalid because --to-user is not passed.",
        ));
}

#[test]
fn test_trigger_event_mismatch_rejected() {
    let dir = TempDir::new().unwrap();
    torq_in(&dir)
        .args(["-e", "boot", "--trigger-names", "team.pkg.stop"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "--trigger-names is passed, but --event is set to boot.",
        ));
}

#[test]
fn test_unknown_event_is_usage_error() {
    torq().args(["-e", "reboot"]).assert().failure();
}

#[test]
fn test_profiler_without_adb() {
    let dir = TempDir::new().unwrap();
    torq_in(&dir)
        .args(["--dur-ms", "3000"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "adb could not be found on the host device.",
        ));
}

#[test]
fn test_devices_without_adb() {
    let dir = TempDir::new().unwrap();
    torq_in(&dir)
        .arg("devices")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "adb could not be found on the host device.",
        ));
}

#[test]
fn test_global_flags_before_subcommand() {
    let dir = TempDir::new().unwrap();
    torq_in(&dir)
        .args(["--serial", "emulator-5554", "devices"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "adb could not be found on the host device.",
        ));

    torq_in(&dir)
        .args(["-v", "--serial", "emulator-5554", "trigger", "team.pkg.stop"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "adb could not be found on the host device.",
        ));
}

#[test]
fn test_global_flags_after_subcommand() {
    let dir = TempDir::new().unwrap();
    torq_in(&dir)
        .args(["devices", "--serial", "emulator-5554", "-q"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "adb could not be found on the host device.",
        ));
}

#[test]
fn test_profiler_flags_rejected_before_other_subcommand() {
    let dir = TempDir::new().unwrap();
    torq_in(&dir)
        .args(["--dur-ms", "5000", "devices"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("'--dur-ms' is a profiler option"));
}

#[test]
fn test_trigger_requires_names() {
    torq().arg("trigger").assert().failure();
}

#[test]
fn test_vm_invalid_machine_format() {
    let dir = TempDir::new().unwrap();
    torq_in(&dir)
        .args(["vm", "configure", "--primary", "p1=hello=bye"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Invalid format used in either --primary or --secondary argument: 'p1=hello=bye'",
        ));
}

#[test]
fn test_vm_secondary_needs_primary_address() {
    let dir = TempDir::new().unwrap();
    torq_in(&dir)
        .args(["vm", "configure", "--secondary", "guest=s2"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Unable to resolve the network address of the primary machine",
        ));
}

#[test]
fn test_vm_conflicting_addresses() {
    torq()
        .args([
            "vm",
            "configure",
            "--secondary",
            "s2",
            "--primary-cid",
            "3",
            "--primary-ip",
            "10.0.0.2",
        ])
        .assert()
        .failure();
}

#[test]
fn test_config_init_get_set() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("torq").join("config.toml");
    let path = path.to_str().unwrap();

    torq()
        .args(["--config", path, "config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    torq()
        .args(["--config", path, "config", "get", "host.adb_path"])
        .assert()
        .success()
        .stdout(predicate::str::diff("adb\n"));

    torq()
        .args(["--config", path, "config", "set", "profiler.dur_ms", "5000"])
        .assert()
        .success();

    torq()
        .args(["--config", path, "config", "get", "profiler.dur_ms"])
        .assert()
        .success()
        .stdout(predicate::str::diff("5000\n"));

    torq()
        .args(["--config", path, "config", "set", "host.boot_timeout_secs", "soon"])
        .assert()
        .failure();
}

#[test]
fn test_config_path_honours_flag() {
    torq()
        .args(["--config", "/tmp/torq-elsewhere.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::diff("/tmp/torq-elsewhere.toml\n"));
}

#[test]
fn test_config_show_without_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.toml");
    torq()
        .args(["--config", path.to_str().unwrap(), "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("adb_path"));
}

#[test]
fn test_missing_config_file_is_fatal() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.toml");
    torq()
        .args(["--config", path.to_str().unwrap(), "devices"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
