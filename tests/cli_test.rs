//! Process-level behavior of the `esp-logger` binary.

use std::fs;
use std::process::Command;

fn run_with_config(contents: &str) -> (std::process::Output, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let config_path = dir.path().join("esp-logger.toml");
    fs::write(&config_path, contents.replace("{dir}", &dir.path().display().to_string())).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_esp-logger"))
        .arg("--config")
        .arg(&config_path)
        .output()
        .unwrap();

    (output, dir)
}

#[test]
fn test_unopenable_device_exits_nonzero_without_log() {
    let (output, dir) = run_with_config(
        r#"
[serial]
port = "/dev/nonexistent_esp32_monitor"

[log]
path = "{dir}/logs/esp_log.jsonl"
"#,
    );

    assert!(!output.status.success());
    assert!(!dir.path().join("logs").exists());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("/dev/nonexistent_esp32_monitor"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_exits_nonzero() {
    let (output, _dir) = run_with_config(
        r#"
[serial]
baud_rate = 420000
"#,
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("baud_rate"), "stderr: {}", stderr);
}

#[test]
fn test_missing_config_file_exits_nonzero() {
    let output = Command::new(env!("CARGO_BIN_EXE_esp-logger"))
        .args(["--config", "/nonexistent/esp-logger.toml"])
        .output()
        .unwrap();

    assert!(!output.status.success());
}
