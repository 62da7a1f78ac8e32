//! Smoke tests for dealkit-cli
//!
//! These tests run the built binary against a temporary data directory.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use tempfile::TempDir;

fn dealkit(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_dealkit"))
        .arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env("NO_COLOR", "1")
        .env("DEALKIT_LOG_LEVEL", "warn")
        .output()
        .expect("Failed to execute command")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// Value of the first `Deal ID: <id>` line.
fn deal_id_from(output: &Output) -> String {
    let text = stdout(output);
    text.lines()
        .find(|line| line.contains("Deal ID"))
        .and_then(|line| line.rsplit(": ").next())
        .map(|id| id.trim().to_string())
        .unwrap_or_else(|| panic!("no deal id in output:\n{}", text))
}

/// Test that the CLI can show help
#[test]
fn test_cli_help() {
    let output = Command::new(env!("CARGO_BIN_EXE_dealkit"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let text = stdout(&output);
    for command in ["user", "deal", "export", "backup", "monitor", "chat"] {
        assert!(text.contains(command), "Help should mention '{}'", command);
    }
}

#[test]
fn test_create_requires_wallet() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let output = dealkit(
        temp_dir.path(),
        &["deal", "create", "--seller", "1", "--amount", "10", "--item", "box"],
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("no registered wallet"));
}

#[test]
fn test_full_deal_lifecycle() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let data = temp_dir.path().join("data");

    assert!(dealkit(&data, &["user", "wallet", "1", "UQ-seller"]).status.success());
    let created = dealkit(
        &data,
        &[
            "deal", "create", "--seller", "1", "--amount", "99,5", "--category", "nft", "--item",
            "Plush Pepe",
        ],
    );
    assert!(created.status.success(), "{}", stdout(&created));
    let id = deal_id_from(&created);

    let own_join = dealkit(&data, &["deal", "join", &id, "--user", "1"]);
    assert!(!own_join.status.success());

    let joined = dealkit(&data, &["deal", "join", &id, "--user", "2"]);
    assert!(joined.status.success());
    assert!(stdout(&joined).contains("UQ-seller"));

    assert!(dealkit(&data, &["deal", "paid", &id, "--user", "2"]).status.success());
    assert!(dealkit(&data, &["deal", "finish", &id, "--user", "1"]).status.success());

    let shown = dealkit(&data, &["deal", "show", &id]);
    let text = stdout(&shown);
    assert!(text.contains("finished"));
    assert!(text.contains("99.5"));
    assert!(text.contains("NFT"));

    let late_cancel = dealkit(&data, &["deal", "cancel", &id, "--user", "2"]);
    assert!(!late_cancel.status.success());

    let csv = temp_dir.path().join("deals.csv");
    let exported = dealkit(&data, &["export", csv.to_str().unwrap()]);
    assert!(exported.status.success());
    let body = std::fs::read_to_string(&csv).unwrap();
    assert!(body.starts_with("deal_id,seller_id,buyer_id,"));
    assert!(body.contains(&format!("{},1,2,nft,Plush Pepe,,99.5,finished,", id)));
}

#[test]
fn test_chat_creates_deal() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let mut child = Command::new(env!("CARGO_BIN_EXE_dealkit"))
        .arg("--data-dir")
        .arg(temp_dir.path())
        .args(["chat", "--user", "5", "--name", "seller"])
        .env("NO_COLOR", "1")
        .env("DEALKIT_LOG_LEVEL", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn chat");

    child
        .stdin
        .take()
        .unwrap()
        .write_all(b"/create\n/wallet\nUQ-chat\n/create\n/cat gift\nBirthday box\nabc\n12,25\nred ribbon\n/deals\n/quit\n")
        .unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());

    let text = stdout(&output);
    assert!(text.contains("Wallet saved: UQ-chat"));
    assert!(text.contains("Deal created"));
    assert!(text.contains("12.25"));
    assert!(text.contains("Birthday box"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("amount must be a number"));
}
