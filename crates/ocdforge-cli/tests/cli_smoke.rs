use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;

const BUILD_ENV: [&str; 7] = [
    "TARGET_PLATFORM",
    "TARGET_BITS",
    "RELEASE_VERSION",
    "WORK_FOLDER_PATH",
    "INSTALL_FOLDER_PATH",
    "CC",
    "CXX",
];

fn ocdforge() -> Command {
    let mut cmd = Command::cargo_bin("ocdforge").expect("ocdforge binary");
    for key in BUILD_ENV {
        cmd.env_remove(key);
    }
    cmd
}

#[test]
fn help_lists_subcommands() {
    ocdforge()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("build"))
        .stdout(predicate::str::contains("platforms"));
}

#[test]
fn unknown_flag_is_a_usage_error() {
    ocdforge()
        .args(["build", "--frobnicate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--frobnicate"));
}

#[test]
fn unknown_platform_fails_before_any_work() {
    let dir = tempfile::tempdir().expect("tempdir");
    ocdforge()
        .args(["build", "--platform", "plan9", "--work-dir"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("plan9"));
    assert_eq!(fs::read_dir(dir.path()).expect("read dir").count(), 0);
}

#[test]
fn platform_from_environment_is_validated_too() {
    let dir = tempfile::tempdir().expect("tempdir");
    ocdforge()
        .arg("build")
        .env("TARGET_PLATFORM", "plan9")
        .env("WORK_FOLDER_PATH", dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("plan9"));
}

#[test]
fn unsupported_release_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    ocdforge()
        .args(["build", "--platform", "linux", "--release", "0.9.0-1", "--work-dir"])
        .arg(dir.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("0.9.0-1"));
}

#[test]
fn platforms_prints_the_feature_matrix() {
    ocdforge()
        .arg("platforms")
        .assert()
        .success()
        .stdout(predicate::str::contains("parport-giveio"))
        .stdout(predicate::str::contains("win32"));
}

#[test]
fn check_rejects_a_missing_package() {
    let dir = tempfile::tempdir().expect("tempdir");
    ocdforge()
        .args(["check", "--platform", "linux", "--package"])
        .arg(dir.path().join("absent"))
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}
