// tests/cli_smoke.rs
//! Binary-level checks that need no network access.

use assert_cmd::Command;
use tempfile::tempdir;

fn bridge_e2e(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("bridge-e2e").unwrap();
    cmd.current_dir(dir)
        .env_remove("PRIVATE_KEY")
        .env_remove("DRY_RUN")
        .env("CONFIG_PATH", dir.join("absent.toml"));
    cmd
}

#[test]
fn help_lists_subcommands() {
    let dir = tempdir().unwrap();
    let output = bridge_e2e(dir.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for command in ["run", "claims", "balances", "deploy-token", "track"] {
        assert!(stdout.contains(command), "missing {} in:\n{}", command, stdout);
    }
}

#[test]
fn run_without_private_key_exits_non_zero() {
    let dir = tempdir().unwrap();
    let output = bridge_e2e(dir.path()).args(["run", "--dry-run"]).output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("PRIVATE_KEY is not set"), "stderr:\n{}", stderr);
}

#[test]
fn invalid_config_file_is_reported() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "[settings\npacing_delay_secs = 0").unwrap();

    let output = bridge_e2e(dir.path()).arg("--config").arg(&path).arg("balances").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load configuration"));
}

#[test]
fn malformed_address_is_a_usage_error() {
    let dir = tempdir().unwrap();
    bridge_e2e(dir.path()).args(["balances", "--address", "0x1234"]).assert().failure().code(2);
}
