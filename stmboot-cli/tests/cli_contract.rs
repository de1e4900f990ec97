//! Integration tests for core CLI contract behavior.

use {predicates::prelude::*, std::fs, tempfile::tempdir};

fn cli_cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("stmboot");
    // Keep ambient settings from leaking into the contract
    cmd.env_remove("STMBOOT_PORT")
        .env_remove("STMBOOT_BAUD")
        .env_remove("STMBOOT_NON_INTERACTIVE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("stmboot"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn version_exits_zero_and_writes_stdout_only() {
    let mut cmd = cli_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stmboot"))
        .stderr(predicate::str::is_empty());
}

#[test]
fn help_lists_bootloader_commands() {
    let mut cmd = cli_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("update")
                .and(predicate::str::contains("set-key"))
                .and(predicate::str::contains("check-key"))
                .and(predicate::str::contains("ob-check"))
                .and(predicate::str::contains("erase")),
        );
}

#[test]
fn list_ports_json_returns_array() {
    let dir = tempdir().expect("tempdir should be created");
    let output = cli_cmd()
        .current_dir(dir.path())
        .args(["list-ports", "--json"])
        .output()
        .expect("command should execute");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let parsed: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    assert!(parsed.is_array(), "should be a JSON array");
}

// ============================================================================
// Exit Code Tests
// ============================================================================

#[test]
fn exit_code_two_for_unknown_command() {
    let mut cmd = cli_cmd();
    cmd.arg("unknown-command-xyz")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unrecognized").or(predicate::str::contains("unknown")));
}

#[test]
fn exit_code_two_for_malformed_key() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("app.bin");
    fs::write(&input, b"firmware").expect("write firmware");

    let mut cmd = cli_cmd();
    cmd.arg("encrypt")
        .arg(&input)
        .args(["--key", "12345"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("8 hex characters"));
}

#[test]
fn exit_code_two_for_missing_key_in_non_interactive_mode() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("app.bin");
    fs::write(&input, b"firmware").expect("write firmware");

    let mut cmd = cli_cmd();
    cmd.arg("--non-interactive")
        .arg("encrypt")
        .arg(&input)
        .assert()
        .failure()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("key"));
}

#[test]
fn exit_code_two_for_menu_in_non_interactive_mode() {
    let mut cmd = cli_cmd();
    cmd.args(["--non-interactive", "menu"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn exit_code_three_for_missing_config_file() {
    let dir = tempdir().expect("tempdir should be created");
    let missing = dir.path().join("nope.toml");

    let mut cmd = cli_cmd();
    cmd.arg("--config")
        .arg(&missing)
        .arg("list-ports")
        .assert()
        .failure()
        .code(3);
}

#[test]
fn invalid_local_config_only_warns() {
    let dir = tempdir().expect("tempdir should be created");
    fs::write(dir.path().join("stmboot.toml"), "invalid toml [[[").expect("write config");

    let output = cli_cmd()
        .current_dir(dir.path())
        .arg("list-ports")
        .output()
        .expect("command should execute");

    assert!(
        output.status.success(),
        "command should succeed despite config warning"
    );
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TOML"), "should warn about invalid TOML");
}

#[test]
fn update_with_missing_firmware_fails_before_opening_port() {
    let dir = tempdir().expect("tempdir should be created");
    let missing = dir.path().join("missing.bin");

    let mut cmd = cli_cmd();
    cmd.args(["-p", "INVALID_PORT_NAME_XYZ", "update"])
        .arg(&missing)
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Cannot access").and(predicate::str::contains("not found")));
}

#[test]
fn uid_on_invalid_port_fails() {
    let output = cli_cmd()
        .args(["--non-interactive", "-p", "INVALID_PORT_NAME_XYZ", "uid"])
        .output()
        .expect("command should execute");

    assert!(
        !output.status.success(),
        "opening a missing port should not succeed"
    );
    assert!(output.stdout.is_empty());
}

// ============================================================================
// File Encryption
// ============================================================================

#[test]
fn encrypt_then_decrypt_restores_file() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("app.bin");
    let original: Vec<u8> = (0u8..=255).cycle().take(1500).collect();
    fs::write(&input, &original).expect("write firmware");

    cli_cmd()
        .arg("encrypt")
        .arg(&input)
        .args(["--key", "DEADBEEF"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let encrypted_path = dir.path().join("app_encrypted.bin");
    let encrypted = fs::read(&encrypted_path).expect("encrypted file should exist");
    assert_eq!(encrypted.len(), original.len());
    assert_ne!(encrypted, original);

    cli_cmd()
        .arg("decrypt")
        .arg(&encrypted_path)
        .args(["-k", "deadbeef"])
        .assert()
        .success();

    let decrypted = fs::read(dir.path().join("app_encrypted_decrypted.bin"))
        .expect("decrypted file should exist");
    assert_eq!(decrypted, original);
}

#[test]
fn encrypt_honours_output_path() {
    let dir = tempdir().expect("tempdir should be created");
    let input = dir.path().join("app.bin");
    let output = dir.path().join("custom.bin");
    fs::write(&input, [0u8; 8]).expect("write firmware");

    cli_cmd()
        .arg("encrypt")
        .arg(&input)
        .args(["--key", "01020304", "-o"])
        .arg(&output)
        .assert()
        .success();

    // Zero bytes expose the key bytes, low byte first
    let encrypted = fs::read(&output).expect("output should exist");
    assert_eq!(encrypted, vec![4, 3, 2, 1, 4, 3, 2, 1]);
}

// ============================================================================
// Completions
// ============================================================================

#[test]
fn completions_command_writes_to_stdout() {
    let mut cmd = cli_cmd();
    cmd.args(["completions", "bash"])
        .assert()
        .success()
        .stderr(predicate::str::is_empty())
        .stdout(predicate::str::contains("_stmboot()"));
}

#[test]
fn unknown_flag_suggests_similar() {
    let mut cmd = cli_cmd();
    cmd.arg("list-ports")
        .arg("--jason")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("json"));
}
