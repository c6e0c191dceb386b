//! Runs the built `sharedstore` binary end to end

use sharedstore_core::Config;
use std::process::Command;
use std::time::Duration;
use tempfile::TempDir;

fn sharedstore() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_sharedstore"));
    command.env_remove("RUST_LOG");
    command
}

#[test]
fn test_config_prints_effective_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("sharedstore.toml");
    std::fs::write(
        &path,
        "[context]\nremove_dispatch = \"legacy_set_item\"\n\n[cli]\nsettle_timeout = \"2s\"\n",
    )
    .unwrap();

    let output = sharedstore()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .env("SHAREDSTORE_CONTEXT_LISTENER_CAPACITY", "16")
        .output()
        .unwrap();
    assert!(output.status.success());

    let printed: Config = toml::from_str(&String::from_utf8(output.stdout).unwrap()).unwrap();
    assert_eq!(
        printed.context.remove_dispatch,
        sharedstore_core::RemoveDispatch::LegacySetItem
    );
    assert_eq!(printed.context.listener_capacity, 16);
    assert_eq!(printed.cli.settle_timeout, Duration::from_secs(2));
}

#[test]
fn test_demo_reports_converged_mirrors() {
    let output = sharedstore()
        .args(["--log-level", "warn", "demo", "--workers", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.starts_with("owner (2 entries)"));
    assert_eq!(stdout.matches("(2 entries)").count(), 3);
}

#[test]
fn test_invalid_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[context]\ncommand_buffer = 0\n").unwrap();

    let output = sharedstore()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .output()
        .unwrap();
    assert!(!output.status.success());
}
