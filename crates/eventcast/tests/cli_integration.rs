//! CLI integration tests for the eventcast command-line interface.
//!
//! These tests verify:
//! - Help text and argument parsing
//! - Auth commands against a temporary config directory
//! - Failure messages carry a remediation hint
//!
//! None of these tests reach the network or open a browser.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the eventcast binary, isolated in `dir`.
fn eventcast(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("eventcast").unwrap();
    cmd.current_dir(dir.path())
        .env("EVENTCAST_CONFIG_DIR", dir.path())
        .env_remove("EVENTCAST_CALLBACK_PORT")
        .env_remove("EVENTCAST_AUTO_REAUTH");
    cmd
}

fn write_credentials(dir: &Path) {
    std::fs::write(
        dir.join("credentials.json"),
        r#"{"installed": {
            "client_id": "cli-test-client",
            "client_secret": "cli-test-secret",
            "redirect_uris": ["http://localhost"],
            "token_uri": "http://127.0.0.1:9/token"
        }}"#,
    )
    .unwrap();
}

fn write_tokens(dir: &Path, expires_in_ms: i64) {
    let now_ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64;
    let json = format!(
        r#"{{
  "access_token": "ya29.stored-access",
  "refresh_token": "1//stored-refresh",
  "scope": "https://www.googleapis.com/auth/youtube.force-ssl",
  "token_type": "Bearer",
  "expiry_date": {}
}}"#,
        now_ms + expires_in_ms
    );
    std::fs::write(dir.join("tokens.json"), json).unwrap();
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    eventcast(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    eventcast(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("eventcast"));
}

#[test]
fn test_auth_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    eventcast(&dir)
        .args(["auth", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("token"))
        .stdout(predicate::str::contains("setup"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    let dir = TempDir::new().unwrap();
    eventcast(&dir).arg("frobnicate").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_token_without_credentials_fails_with_hint() {
    let dir = TempDir::new().unwrap();
    eventcast(&dir)
        .args(["auth", "token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("credentials not found"))
        .stderr(predicate::str::contains("hint:"));
}

#[test]
fn test_token_without_tokens_is_not_authenticated() {
    let dir = TempDir::new().unwrap();
    write_credentials(dir.path());

    eventcast(&dir)
        .args(["auth", "token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not authenticated"))
        .stderr(predicate::str::contains("eventcast auth login"));
}

#[test]
fn test_token_prints_stored_access_token() {
    let dir = TempDir::new().unwrap();
    write_credentials(dir.path());
    write_tokens(dir.path(), 60 * 60 * 1000);

    eventcast(&dir)
        .args(["auth", "token"])
        .assert()
        .success()
        .stdout(predicate::str::diff("ya29.stored-access\n"));
}

#[test]
fn test_token_refresh_failure_is_reported() {
    let dir = TempDir::new().unwrap();
    write_credentials(dir.path());
    write_tokens(dir.path(), -60 * 1000);

    // Token endpoint points at a closed port
    eventcast(&dir)
        .args(["auth", "token"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Token refresh failed"));
}

#[test]
fn test_status_json_unauthenticated() {
    let dir = TempDir::new().unwrap();
    eventcast(&dir)
        .args(["--json", "auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"authenticated\": false"))
        .stdout(predicate::str::contains("\"credentials_present\": false"));
}

#[test]
fn test_status_json_authenticated() {
    let dir = TempDir::new().unwrap();
    write_credentials(dir.path());
    write_tokens(dir.path(), 2 * 60 * 60 * 1000);

    eventcast(&dir)
        .args(["--json", "auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"authenticated\": true"))
        .stdout(predicate::str::contains("\"is_expired\": false"))
        .stdout(predicate::str::contains("\"has_refresh_token\": true"));
}

#[test]
fn test_login_without_credentials_fails_fast() {
    let dir = TempDir::new().unwrap();
    eventcast(&dir)
        .args(["auth", "login", "--no-browser"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("credentials not found"));
}

#[test]
fn test_login_with_valid_token_is_noop() {
    let dir = TempDir::new().unwrap();
    write_credentials(dir.path());
    write_tokens(dir.path(), 60 * 60 * 1000);

    eventcast(&dir)
        .args(["auth", "login", "--no-browser"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Already authenticated"));
}

#[test]
fn test_setup_prints_credentials_path() {
    let dir = TempDir::new().unwrap();
    let expected = dir.path().join("credentials.json");
    eventcast(&dir)
        .args(["auth", "setup"])
        .assert()
        .success()
        .stdout(predicate::str::contains(expected.display().to_string()));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_defaults() {
    let dir = TempDir::new().unwrap();
    eventcast(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("callback_port = 8085"))
        .stdout(predicate::str::contains("auto_reauthenticate = false"));
}

#[test]
fn test_config_show_reads_config_file() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("config.toml"),
        "[oauth]\ncallback_port = 9191\n",
    )
    .unwrap();

    eventcast(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("callback_port = 9191"));
}

#[test]
fn test_config_env_override() {
    let dir = TempDir::new().unwrap();
    eventcast(&dir)
        .env("EVENTCAST_CALLBACK_PORT", "9292")
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("callback_port = 9292"));
}

#[test]
fn test_config_path_json() {
    let dir = TempDir::new().unwrap();
    eventcast(&dir)
        .args(["--json", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tokens.json"))
        .stdout(predicate::str::contains("credentials.json"));
}

#[test]
fn test_config_dir_flag_beats_env() {
    let dir = TempDir::new().unwrap();
    let other = TempDir::new().unwrap();
    eventcast(&dir)
        .args(["--json", "config", "path", "--config-dir"])
        .arg(other.path())
        .assert()
        .success()
        .stdout(predicate::str::contains(
            other.path().join("tokens.json").display().to_string(),
        ));
}
