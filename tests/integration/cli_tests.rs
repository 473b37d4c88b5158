//! Integration tests for the CLI binary.
//!
//! Runs the `claimward` binary against a temporary database.
//!
//! This test is registered as a [[test]] in the claimward-cli crate
//! so that CARGO_BIN_EXE_claimward is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `claimward` binary.
fn claimward_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_claimward"))
}

/// Run the binary with a database in `dir` and no settings file.
fn run(dir: &Path, args: &[&str]) -> Output {
    claimward_binary()
        .arg("--config")
        .arg(dir.join("missing.toml"))
        .arg("--database")
        .arg(dir.join("claims.db"))
        .args(args)
        .output()
        .expect("failed to execute claimward")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn cli_responds_to_help() {
    let output = claimward_binary()
        .arg("--help")
        .output()
        .expect("failed to execute claimward --help");

    assert!(
        output.status.success(),
        "claimward --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let text = stdout(&output);
    assert!(
        text.contains("Usage") && text.contains("blocks"),
        "help should list commands, got: {text}"
    );
}

#[test]
fn cli_init_creates_database() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(dir.path(), &["init"]);
    assert!(output.status.success(), "{output:?}");
    assert!(stdout(&output).contains("schema version"));
    assert!(dir.path().join("claims.db").exists());

    let schema = run(dir.path(), &["--json", "schema"]);
    assert!(schema.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&schema)).unwrap();
    assert_eq!(value["stored"], value["current"]);
}

#[test]
fn cli_blocks_by_uuid() {
    let dir = tempfile::tempdir().unwrap();
    let uuid = "6f1c1b59-2f7a-4f36-9d0e-3b5c2f0c8a11";

    let add = run(dir.path(), &["blocks", uuid, "add", "25"]);
    assert!(add.status.success(), "{add:?}");
    assert!(stdout(&add).contains("125"));

    let remove = run(dir.path(), &["blocks", uuid, "REMOVE", "1000"]);
    assert!(remove.status.success());
    assert!(stdout(&remove).contains(" 0 claim blocks"));

    let show = run(dir.path(), &["blocks", uuid]);
    assert!(show.status.success());
    assert!(stdout(&show).contains("has 0 claim blocks"));
}

#[test]
fn cli_blocks_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let unknown_user = run(dir.path(), &["blocks", "Nobody"]);
    assert!(!unknown_user.status.success());
    assert!(String::from_utf8_lossy(&unknown_user.stderr).contains("Nobody"));

    let uuid = "6f1c1b59-2f7a-4f36-9d0e-3b5c2f0c8a11";
    let bad_op = run(dir.path(), &["blocks", uuid, "give", "5"]);
    assert!(!bad_op.status.success());

    let missing_amount = run(dir.path(), &["blocks", uuid, "set"]);
    assert!(!missing_amount.status.success());
}

#[test]
fn cli_listings_on_empty_database() {
    let dir = tempfile::tempdir().unwrap();
    let worlds = run(dir.path(), &["worlds", "list", "--all"]);
    assert!(worlds.status.success());
    assert!(stdout(&worlds).contains("(none)"));

    let inactive = run(dir.path(), &["--json", "users", "inactive", "--days", "7"]);
    assert!(inactive.status.success());
    let value: serde_json::Value = serde_json::from_str(&stdout(&inactive)).unwrap();
    assert_eq!(value, serde_json::json!([]));
}

#[test]
fn cli_exits_with_error_on_unknown_command() {
    let output = claimward_binary()
        .arg("frobnicate")
        .output()
        .expect("failed to execute claimward");
    assert!(!output.status.success());
}
