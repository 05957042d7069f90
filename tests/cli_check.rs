use assert_cmd::prelude::*;
use color_eyre::Result;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

fn write_config(name: &str, contents: &str) -> Result<PathBuf> {
    let path = std::env::temp_dir().join(format!("damselfly-{}-{}.json", name, std::process::id()));
    fs::write(&path, contents)?;
    Ok(path)
}

#[test]
fn test_check_accepts_valid_config() -> Result<()> {
    let config = write_config(
        "valid",
        r#"{
            "server_id": "000100011c38a5e80013726574a2",
            "listeners": [ { "name": "eth0", "address": "::1" } ],
            "pipeline": [
                { "kind": "marked-with",
                  "params": { "mark": "eth0" },
                  "children": [ { "kind": "ignore-request" } ] }
            ]
        }"#,
    )?;

    let mut cmd = Command::cargo_bin("damselfly")?;
    let output = cmd.arg("check").arg("--config").arg(&config).output()?;
    fs::remove_file(&config).ok();

    assert!(
        output.status.success(),
        "check failed. Stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout_str = String::from_utf8_lossy(&output.stdout);
    assert!(stdout_str.contains("Configuration OK"), "Missing OK message");

    Ok(())
}

#[test]
fn test_check_rejects_unknown_section_by_name() -> Result<()> {
    let config = write_config(
        "bogus",
        r#"{
            "server_id": "000100011c38a5e80013726574a2",
            "listeners": [ { "name": "eth0", "address": "::1" } ],
            "pipeline": [ { "kind": "bogus-filter" } ]
        }"#,
    )?;

    let mut cmd = Command::cargo_bin("damselfly")?;
    let output = cmd.arg("check").arg("--config").arg(&config).output()?;
    fs::remove_file(&config).ok();

    assert!(!output.status.success(), "bogus section was accepted");
    let stderr_str = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr_str.contains("bogus-filter"),
        "Error does not name the offending section. Stderr: {stderr_str}"
    );

    Ok(())
}

#[test]
fn test_help_lists_subcommands() -> Result<()> {
    let mut cmd = Command::cargo_bin("damselfly")?;
    let output = cmd.arg("--help").output()?;

    assert!(output.status.success());
    let stdout_str = String::from_utf8_lossy(&output.stdout);
    assert!(stdout_str.contains("serve"), "Missing serve command");
    assert!(stdout_str.contains("check"), "Missing check command");

    Ok(())
}
