//! Integration tests for the `cpectl` CLI binary.
//!
//! Argument parsing, help output, completions, and error exits run
//! without any network. The DMP-backed cases point the binary at a
//! local wiremock server.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `cpectl` binary with env isolation.
///
/// Clears all `CPECTL_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn cpectl_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("cpectl");
    cmd.env("HOME", "/tmp/cpectl-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/cpectl-test-nonexistent")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("CPECTL_PROFILE")
        .env_remove("CPECTL_API_URL")
        .env_remove("CPECTL_EMAIL")
        .env_remove("CPECTL_PASSWORD")
        .env_remove("CPECTL_CLIENT_ID")
        .env_remove("CPECTL_OUTPUT")
        .env_remove("CPECTL_INSECURE")
        .env_remove("CPECTL_TIMEOUT");
    cmd
}

/// A command with DMP credentials supplied through the environment only.
fn cpectl_with_account(api_url: &str) -> assert_cmd::Command {
    let mut cmd = cpectl_cmd();
    cmd.env("CPECTL_API_URL", api_url)
        .env("CPECTL_EMAIL", "svc@example.net")
        .env("CPECTL_PASSWORD", "hunter2");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "authorization_token": "tok-1" })),
        )
        .mount(server)
        .await;
}

/// Run a prepared command off the async runtime so the mock server keeps serving.
async fn run(mut cmd: assert_cmd::Command) -> std::process::Output {
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = cpectl_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    cpectl_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("DMP")
            .and(predicate::str::contains("restart"))
            .and(predicate::str::contains("reboot"))
            .and(predicate::str::contains("getinfo")),
    );
}

#[test]
fn test_version_flag() {
    cpectl_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("cpectl"));
}

#[test]
fn test_completions_zsh() {
    cpectl_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_exec_requires_a_command() {
    let output = cpectl_cmd().args(["exec", "SN1"]).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_config_path_prints_location() {
    cpectl_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_redacts_passwords() {
    let home = tempfile::tempdir().unwrap();
    let dir = home.path().join("cpectl");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        "default_profile = \"lab\"\n\n[profiles.lab]\nemail = \"svc@example.net\"\npassword = \"hunter2\"\nclient_id = \"client1\"\n",
    )
    .unwrap();

    let output = cpectl_cmd()
        .env("XDG_CONFIG_HOME", home.path())
        .args(["config", "show"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("client1"), "{stdout}");
    assert!(stdout.contains("********"), "{stdout}");
    assert!(!stdout.contains("hunter2"), "{stdout}");
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_getinfo_without_config() {
    let output = cpectl_cmd().args(["getinfo", "SN1"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(
        text.contains("cpectl config init"),
        "Expected setup hint in output:\n{text}"
    );
}

#[test]
fn test_unknown_profile() {
    let output = cpectl_cmd()
        .args(["--profile", "lab", "getinfo", "SN1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("Profile 'lab' not found"), "{text}");
    assert!(text.contains("Available profiles: (none)"), "{text}");
}

#[test]
fn test_restart_without_client_id() {
    // No DMP is listening here; the client ID check must fail first.
    let output = cpectl_with_account("http://127.0.0.1:9")
        .args(["restart", "SN1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("No client ID configured"));
}

#[test]
fn test_reboot_requires_yes_when_not_interactive() {
    let output = cpectl_with_account("http://127.0.0.1:9")
        .args(["reboot", "SN1"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}

// ── DMP-backed commands ─────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_reboot_with_yes() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/ngacs/cpe/SN123/reboot"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let mut cmd = cpectl_with_account(&server.uri());
    cmd.args(["-y", "reboot", "SN123"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✅ Reboot completed for SN123."), "{stdout}");
    assert!(stdout.contains("HTTP 202"), "{stdout}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reboot_failure_exits_operation_failed() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("POST"))
        .and(path("/ngacs/cpe/SN123/reboot"))
        .respond_with(ResponseTemplate::new(404).set_body_string("unknown cpe"))
        .mount(&server)
        .await;

    let mut cmd = cpectl_with_account(&server.uri());
    cmd.args(["-y", "reboot", "SN123"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(9));
    assert!(String::from_utf8_lossy(&output.stdout).contains("❌ Reboot failed for SN123."));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_getinfo_json() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/ngacs/cpe/SN123/parameter"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "EthernetWAN": { "IPv4Address": "10.0.0.5", "MACAddress": "aa:bb:cc:dd:ee:ff" }
        })))
        .mount(&server)
        .await;

    let mut cmd = cpectl_with_account(&server.uri());
    cmd.args(["--output", "json", "getinfo", "SN123"]);
    let output = run(cmd).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(info["serial"], "SN123");
    assert_eq!(info["ip"], "10.0.0.5");
    assert_eq!(info["wan_mac_clean"], "AABBCCDDEEFF");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_getinfo_login_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .mount(&server)
        .await;

    let mut cmd = cpectl_with_account(&server.uri());
    cmd.args(["getinfo", "SN123"]);
    let output = run(cmd).await;

    assert_eq!(output.status.code(), Some(3));
}
