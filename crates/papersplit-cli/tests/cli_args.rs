use assert_cmd::Command;
use predicates::prelude::*;

fn cmd() -> Command {
    Command::cargo_bin("papersplit").unwrap()
}

#[test]
fn help_flag_prints_usage_with_subcommands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("segment"))
        .stdout(predicate::str::contains("detect"))
        .stdout(predicate::str::contains("split"))
        .stdout(predicate::str::contains("clean"));
}

#[test]
fn segment_subcommand_help() {
    cmd()
        .args(["segment", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("FILE"))
        .stdout(predicate::str::contains("--family"))
        .stdout(predicate::str::contains("--band"))
        .stdout(predicate::str::contains("--format"));
}

#[test]
fn split_subcommand_help() {
    cmd()
        .args(["split", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-dir"))
        .stdout(predicate::str::contains("--flat"));
}

#[test]
fn version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("papersplit"));
}

#[test]
fn no_subcommand_is_an_error() {
    cmd().assert().failure();
}

#[test]
fn missing_file_fails_with_message() {
    cmd()
        .args(["segment", "/nonexistent/9709_s21_qp_12.pdf"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("file not found"));
}

#[test]
fn inverted_band_fails_validation() {
    cmd()
        .args(["segment", "paper.pdf", "--band", "90,10"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("left_band"));
}
