//! End-to-end CLI tests for the uploader binary.

// `Command::cargo_bin` is deprecated in assert_cmd >=2.0.17 in favor of
// `cargo::cargo_bin_cmd!` macro. Suppressed until migration to the new API.
#![allow(deprecated)]

mod support;

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use support::socket_guard::{socket_skip_return, start_mock_server_or_skip};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

macro_rules! require_mock_server {
    () => {{
        let Some(mock_server) = tokio_test::block_on(start_mock_server_or_skip()) else {
            return socket_skip_return();
        };
        mock_server
    }};
}

/// Command isolated from the user's config directory.
fn uploader_cmd(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("uploader").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home).env_remove("RUST_LOG");
    cmd
}

/// Test that the binary with no files exits with code 0.
#[test]
fn test_binary_without_files_returns_zero() {
    let temp = TempDir::new().unwrap();
    uploader_cmd(temp.path()).assert().success();
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let temp = TempDir::new().unwrap();
    uploader_cmd(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Upload files to an HTTP endpoint"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let temp = TempDir::new().unwrap();
    uploader_cmd(temp.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("uploader"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let temp = TempDir::new().unwrap();
    uploader_cmd(temp.path())
        .arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

#[test]
fn test_binary_requires_url_for_files() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("a.txt");
    std::fs::write(&file, "hello").unwrap();

    uploader_cmd(temp.path())
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No upload URL"));
}

#[test]
fn test_binary_rejects_invalid_config_file() {
    let temp = TempDir::new().unwrap();
    let config = temp.path().join("uploader.toml");
    std::fs::write(&config, "max_file_size_mb = 0\n").unwrap();
    let file = temp.path().join("a.txt");
    std::fs::write(&file, "hello").unwrap();

    uploader_cmd(temp.path())
        .arg("--config")
        .arg(&config)
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("max_file_size_mb"));
}

// ==================== Upload Tests ====================

#[test]
fn test_binary_uploads_files_and_prints_json_summary() {
    let mock_server = require_mock_server!();
    tokio_test::block_on(
        Mock::given(method("POST"))
            .and(path("/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(2)
            .mount(&mock_server),
    );

    let temp = TempDir::new().unwrap();
    let first = temp.path().join("first.txt");
    let second = temp.path().join("second.txt");
    std::fs::write(&first, "one").unwrap();
    std::fs::write(&second, "two").unwrap();

    let mut cmd = uploader_cmd(temp.path());
    cmd.arg("--url")
        .arg(format!("{}/upload", mock_server.uri()))
        .args(["--json", "-P", "folder=inbox"])
        .arg(&first)
        .arg(&second);
    let output = cmd.output().unwrap();

    assert!(output.status.success(), "{output:?}");
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["uploaded"], 2);
    assert_eq!(summary["failed"], 0);
    assert_eq!(summary["files"][0]["name"], "first.txt");
    assert_eq!(summary["files"][0]["status"], "uploaded");
    assert_eq!(summary["files"][1]["response_text"], "ok");

    let requests = tokio_test::block_on(mock_server.received_requests()).unwrap();
    assert!(String::from_utf8_lossy(&requests[0].body).contains("inbox"));
}

#[test]
fn test_binary_exits_non_zero_on_server_error() {
    let mock_server = require_mock_server!();
    tokio_test::block_on(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server),
    );

    let temp = TempDir::new().unwrap();
    let file = temp.path().join("a.txt");
    std::fs::write(&file, "hello").unwrap();

    let mut cmd = uploader_cmd(temp.path());
    cmd.arg("--url").arg(mock_server.uri()).arg("--json").arg(&file);
    let output = cmd.output().unwrap();

    assert!(!output.status.success());
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["files"][0]["response_code"], 500);
    assert_eq!(summary["files"][0]["response_text"], "Internal Server Error");
}

#[test]
fn test_binary_rejects_unlisted_extension_without_request() {
    let mock_server = require_mock_server!();
    tokio_test::block_on(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server),
    );

    let temp = TempDir::new().unwrap();
    let file = temp.path().join("notes.txt");
    std::fs::write(&file, "hello").unwrap();

    let mut cmd = uploader_cmd(temp.path());
    cmd.arg("--url")
        .arg(mock_server.uri())
        .args(["--accept", ".pdf", "--validate-extension"])
        .arg(&file);
    let output = cmd.output().unwrap();

    assert!(!output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Only .pdf files are allowed"), "{stdout}");
    assert!(stdout.contains("0 uploaded, 1 failed, 0 canceled"));
}

#[test]
fn test_binary_reads_url_from_config_file() {
    let mock_server = require_mock_server!();
    tokio_test::block_on(
        Mock::given(method("POST"))
            .and(path("/from-config"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server),
    );

    let temp = TempDir::new().unwrap();
    let config_dir = temp.path().join("uploader");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(
        config_dir.join("config.toml"),
        format!("url = \"{}/from-config\"\n", mock_server.uri()),
    )
    .unwrap();
    let file = temp.path().join("a.txt");
    std::fs::write(&file, "hello").unwrap();

    let mut cmd = uploader_cmd(temp.path());
    cmd.arg("-q").arg(&file);
    let output = cmd.output().unwrap();

    assert!(output.status.success(), "{output:?}");
    assert!(output.stdout.is_empty(), "quiet run prints nothing");
}

#[test]
fn test_binary_accepts_batch_offset_without_parallel_limit() {
    let mock_server = require_mock_server!();
    tokio_test::block_on(
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(2)
            .mount(&mock_server),
    );

    let temp = TempDir::new().unwrap();
    let first = temp.path().join("a.txt");
    let second = temp.path().join("b.txt");
    std::fs::write(&first, "one").unwrap();
    std::fs::write(&second, "two").unwrap();

    let mut cmd = uploader_cmd(temp.path());
    cmd.arg("--url")
        .arg(mock_server.uri())
        .args(["--json", "-p", "0", "-b", "90000"])
        .arg(&first)
        .arg(&second);
    let output = cmd.output().unwrap();

    // Without a parallel limit the window never opens, so both start at once.
    assert!(output.status.success(), "{output:?}");
    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["uploaded"], 2);
}
