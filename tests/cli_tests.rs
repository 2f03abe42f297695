//! Integration tests for the doky-deploy CLI surface.
//!
//! These exercise argument parsing and the pre-systemctl failure paths only;
//! nothing here touches apt, the network, or a live init system.

#![allow(clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;

fn doky_deploy() -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("doky-deploy"));
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("DOKY_DEPLOY_CONFIG");
    cmd
}

// --- Help and version ---

#[test]
fn no_args_shows_help_and_exits_two() {
    // clap with arg_required_else_help shows help on stderr and exits 2
    doky_deploy().assert().code(2).stderr(predicate::str::contains(
        "Host provisioning and service lifecycle",
    ));
}

#[test]
fn help_flag_lists_subcommands() {
    doky_deploy()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("provision"))
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn version_flag_shows_version() {
    doky_deploy()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("doky-deploy"));
}

#[test]
fn provision_help_shows_config_flag() {
    doky_deploy()
        .args(["provision", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn unknown_subcommand_is_rejected() {
    doky_deploy().arg("rollback").assert().code(2);
}

// --- Config handling ---

#[test]
fn explicit_missing_config_fails() {
    doky_deploy()
        .args(["deploy", "--config", "/nonexistent/doky.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}

#[test]
fn invalid_config_names_the_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = dir.path().join("broken.yaml");
    std::fs::write(&cfg, "unit_file: [not, a, path\n").expect("write config");

    doky_deploy()
        .args(["deploy", "--config"])
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot parse"));
}

// --- Deploy failure path (descriptor copy aborts before systemctl) ---

#[test]
fn deploy_with_missing_descriptor_fails_before_enable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let unit_dir = dir.path().join("system");
    std::fs::create_dir_all(&unit_dir).expect("unit dir");
    let cfg = dir.path().join("doky-deploy.yaml");
    std::fs::write(
        &cfg,
        format!(
            "unit_file: {}\nunit_dir: {}\n",
            dir.path().join("absent.service").display(),
            unit_dir.display()
        ),
    )
    .expect("write config");

    doky_deploy()
        .args(["deploy", "--config"])
        .arg(&cfg)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not register unit"));

    // Nothing was copied into the unit directory.
    let entries: Vec<_> = std::fs::read_dir(&unit_dir).expect("read unit dir").collect();
    assert!(entries.is_empty());
}

#[test]
#[serial]
fn config_path_is_taken_from_environment() {
    doky_deploy()
        .arg("deploy")
        .env("DOKY_DEPLOY_CONFIG", "/nonexistent/env-config.yaml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("env-config.yaml"));
}
