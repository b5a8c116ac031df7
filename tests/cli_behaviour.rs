//! Startup behaviour of the `tyroo-etl` binary.

use std::process::Command;
use tempfile::TempDir;

#[test]
fn rejected_configuration_is_logged_before_exit() {
    let dir = TempDir::new().unwrap();
    let log_file = dir.path().join("logs").join("process.log");

    let output = Command::new(env!("CARGO_BIN_EXE_tyroo-etl"))
        .current_dir(dir.path())
        .env_clear()
        .args(["--chunk-size", "0", "--table", "tyroo_data"])
        .arg("--log-file")
        .arg(&log_file)
        .arg("--database-url")
        .arg(dir.path().join("tyroo.sqlite"))
        .output()
        .unwrap();

    assert!(!output.status.success());
    let log = std::fs::read_to_string(&log_file).unwrap();
    let errors: Vec<&str> = log.lines().filter(|l| l.contains(" - ERROR - ")).collect();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].contains("Configuration rejected: "));
    assert!(!dir.path().join("tyroo.sqlite").exists());
}
