use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn cannon() -> Command {
    Command::cargo_bin("pr-cannon").expect("binary exists")
}

#[test]
fn help_lists_both_commands() {
    cannon()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("fire").and(predicate::str::contains("test")));
}

#[test]
fn fire_requires_paths_and_a_repository() {
    cannon().args(["fire", "only-one-arg"]).assert().failure();
}

#[test]
fn fire_rejects_a_malformed_repository_identifier() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "hello").unwrap();

    cannon()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "test-token")
        .args(["fire", "notes.txt", "not-a-repo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid repository format"));
}

#[test]
fn fire_fails_fast_without_a_token() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("notes.txt"), "hello").unwrap();

    cannon()
        .current_dir(dir.path())
        .env_remove("GITHUB_TOKEN")
        .args(["fire", "notes.txt", "acme/demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GitHub token not found"));
}

#[test]
fn fire_reports_missing_files_before_any_upload() {
    let dir = tempdir().unwrap();

    cannon()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "test-token")
        .args(["fire", "missing.txt", "acme/demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn fire_rejects_a_directory_with_no_uploadable_files() {
    let dir = tempdir().unwrap();
    let empty = dir.path().join("empty");
    fs::create_dir_all(empty.join(".git")).unwrap();
    fs::write(empty.join(".git/HEAD"), "ref").unwrap();

    cannon()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "test-token")
        .args(["fire", "empty", "acme/demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No files to send"));
}

#[test]
fn fire_rejects_duplicate_destination_paths() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::create_dir_all(dir.path().join("b")).unwrap();
    fs::write(dir.path().join("a/x.txt"), "from a").unwrap();
    fs::write(dir.path().join("b/x.txt"), "from b").unwrap();

    cannon()
        .current_dir(dir.path())
        .env("GITHUB_TOKEN", "test-token")
        .args(["fire", "a/x.txt", "b/x.txt", "acme/demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Duplicate destination path"));
}
