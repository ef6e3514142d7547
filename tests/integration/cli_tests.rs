//! End-to-end CLI tests using `assert_cmd`.
//!
//! These never reach DigitalOcean: commands that would are run with their
//! credentials stripped from the environment so they fail fast on config.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use assert_cmd::Command;
use predicates::prelude::*;

fn bin() -> Command {
    Command::cargo_bin("droplet-proxy").unwrap()
}

#[test]
fn no_arguments_prints_help_and_fails() {
    bin()
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn help_lists_both_switch_positions() {
    bin()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("on"))
        .stdout(predicate::str::contains("off"));
}

#[test]
fn version_flag_prints_version() {
    bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn unknown_subcommand_is_rejected() {
    bin().arg("toggle").assert().failure().code(2);
}

#[test]
fn on_without_api_token_fails_fast() {
    bin()
        .arg("on")
        .env_remove("DIGITALOCEAN_TOKEN")
        .env("SSH_KEY_ID", "12345")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DIGITALOCEAN_TOKEN"));
}

#[test]
fn on_without_ssh_key_id_fails_fast() {
    bin()
        .arg("on")
        .env("DIGITALOCEAN_TOKEN", "dop_v1_dummy")
        .env_remove("SSH_KEY_ID")
        .assert()
        .failure()
        .stderr(predicate::str::contains("SSH_KEY_ID"));
}

#[test]
fn off_without_api_token_fails_fast() {
    bin()
        .arg("off")
        .env_remove("DIGITALOCEAN_TOKEN")
        .env_remove("SSH_KEY_ID")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DIGITALOCEAN_TOKEN"));
}
