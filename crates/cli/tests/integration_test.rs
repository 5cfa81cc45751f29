use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn driftctl() -> Command {
    Command::cargo_bin("driftctl").unwrap()
}

#[test]
fn test_help_and_version() {
    driftctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Container drift controller"))
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("chaos"))
        .stdout(predicate::str::contains("check"));

    driftctl().arg("--version").assert().success();
}

#[test]
fn test_check_accepts_valid_setpoint() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("desired_state.yaml");
    fs::write(
        &config,
        "\
app_name: critical-service
image: nginx:1.25
status: running
host_port: 8080
fallback_host_port: 8081
container_port: 80
",
    )
    .unwrap();

    driftctl()
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Setpoint OK"))
        .stdout(predicate::str::contains("critical-service"))
        .stdout(predicate::str::contains("nginx:1.25"))
        .stdout(predicate::str::contains("8081"));
}

#[test]
fn test_check_normalizes_untagged_image() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("desired_state.yaml");
    fs::write(
        &config,
        "\
app_name: critical-service
image: nginx
host_port: 8080
container_port: 80
",
    )
    .unwrap();

    driftctl()
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("nginx:latest"));
}

#[test]
fn test_check_rejects_invalid_setpoint() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("desired_state.yaml");
    fs::write(
        &config,
        "\
app_name: critical-service
image: nginx:1.25
host_port: 0
container_port: 80
",
    )
    .unwrap();

    driftctl()
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid setpoint"));
}

#[test]
fn test_check_rejects_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("does_not_exist.yaml");

    driftctl()
        .args(["check", "--config"])
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}
