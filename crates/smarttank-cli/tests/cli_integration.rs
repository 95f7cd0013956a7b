//! CLI integration tests.
//!
//! These run the built binary against a temporary config and database.
//! None of them touch the Bluetooth adapter.
//!
//! ```
//! cargo test --package smarttank-cli --test cli_integration
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// A temporary config file pointing at a temporary database.
struct Sandbox {
    dir: TempDir,
    config: PathBuf,
}

impl Sandbox {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("config.toml");
        let database = dir.path().join("settings.db");
        fs::write(
            &config,
            format!("database = '{}'\n", database.display()),
        )
        .unwrap();
        Self { dir, config }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn run(&self, args: &[&str]) -> Output {
        run_smarttank(&self.config, args)
    }
}

fn run_smarttank(config: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_smarttank"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("SMARTTANK_DEVICE")
        .env_remove("SMARTTANK_TOKEN")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run smarttank binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

// =============================================================================
// Help and version
// =============================================================================

#[test]
fn test_help_command() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["--help"]);

    assert!(output.status.success(), "Help should succeed");
    let out = stdout(&output);
    for command in ["scan", "setup", "status", "pump", "reset"] {
        assert!(out.contains(command), "Help should list {command}");
    }
}

#[test]
fn test_version_command() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["--version"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_setup_help_lists_value_flags() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["setup", "--help"]);

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("--height-unit"));
    assert!(out.contains("--cost-type"));
    assert!(out.contains("--no-wifi"));
}

#[test]
fn test_invalid_subcommand() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["calibrate"]);
    assert!(!output.status.success());
}

#[test]
fn test_completions() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["completions", "bash"]);

    assert!(output.status.success());
    assert!(stdout(&output).contains("smarttank"));
}

// =============================================================================
// Config
// =============================================================================

#[test]
fn test_config_path() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["config", "path"]);

    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), sandbox.config.display().to_string());
}

#[test]
fn test_config_init_and_show() {
    let sandbox = Sandbox::new();
    let fresh = sandbox.path().join("fresh").join("config.toml");

    let output = run_smarttank(&fresh, &["config", "init"]);
    assert!(output.status.success(), "{}", stderr(&output));
    assert!(fresh.exists());

    let output = run_smarttank(&fresh, &["config", "init"]);
    assert!(!output.status.success(), "init must not overwrite");

    let output = run_smarttank(&fresh, &["config", "show"]);
    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("scan_window_ms = 5000"));
    assert!(out.contains("[connection]"));
}

// =============================================================================
// Saved values
// =============================================================================

#[test]
fn test_status_without_setup() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["status"]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stdout(&output).contains("No device set up yet"));
}

#[test]
fn test_status_json_is_empty_object() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["status", "--format", "json"]);

    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(json, serde_json::json!({}));
}

#[test]
fn test_reset_with_yes() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["reset", "--yes"]);

    assert!(output.status.success(), "{}", stderr(&output));
    assert!(stderr(&output).contains("cleared"));
}

// =============================================================================
// Errors reported before any Bluetooth access
// =============================================================================

#[test]
fn test_send_rejects_unknown_command() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["send", "--device", "AA:BB:CC:DD:EE:FF", "REBOOT"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("Unknown command"));
}

#[test]
fn test_pump_without_known_device() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["pump", "on"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("No device specified"));
}

#[test]
fn test_devices_without_server() {
    let sandbox = Sandbox::new();
    let output = sandbox.run(&["devices", "--token", "abc"]);

    assert!(!output.status.success());
    assert!(stderr(&output).contains("No backend configured"));
}
