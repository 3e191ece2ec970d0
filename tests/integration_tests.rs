//! Integration tests for the TravelPack CLI

use std::io::Write;
use std::process::{Command, Output, Stdio};

const GOODBYE: &str = "Thanks for using TravelPack! Safe travels!";
const HELP_LINE: &str = "Ask what to pack for a trip";

/// Binary invocation without network-bound state or user config
fn command(args: &[&str], cache_dir: &tempfile::TempDir) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_travelpack"));
    command
        .args(args)
        .env("TRAVELPACK_CACHE__ENABLED", "false")
        .env("TRAVELPACK_CACHE__LOCATION", cache_dir.path())
        .env("TRAVELPACK_LLM__API_KEY_ENV", "TRAVELPACK_TEST_MISSING_KEY")
        .env_remove("RUST_LOG");
    command
}

/// Run the compiled binary
fn travelpack(args: &[&str]) -> Output {
    let cache_dir = tempfile::tempdir().expect("temp dir");
    command(args, &cache_dir)
        .output()
        .expect("Failed to execute travelpack")
}

/// Run the interactive session with `input` piped to stdin
fn travelpack_interactive(input: &str) -> Output {
    let cache_dir = tempfile::tempdir().expect("temp dir");
    let mut child = command(&["--interpreter", "heuristic"], &cache_dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn travelpack");

    let mut stdin = child.stdin.take().expect("piped stdin");
    stdin.write_all(input.as_bytes()).expect("write stdin");
    drop(stdin);

    child.wait_with_output().expect("Failed to wait for travelpack")
}

#[test]
fn test_cli_help() {
    let output = travelpack(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("travelpack"));
    assert!(stdout.contains("packing advice"));
    assert!(stdout.contains("--interpreter"));
}

#[test]
fn test_cli_version() {
    let output = travelpack(&["--version"]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_one_shot_without_destination_asks_for_one() {
    let output = travelpack(&[
        "--interpreter",
        "heuristic",
        "--date",
        "2025-10-10",
        "What should I pack for next week?",
    ]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Where are you travelling to"));
}

#[test]
fn test_missing_config_file_fails() {
    let output = travelpack(&["--config", "/nonexistent/travelpack.toml", "Chicago tomorrow"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Config file not found"));
}

#[test]
fn test_invalid_interpreter_is_rejected() {
    let output = travelpack(&["--interpreter", "oracle", "Chicago tomorrow"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("oracle"));
}

#[test]
fn test_interactive_help_then_quit() {
    let output = travelpack_interactive("help\nquit\n");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    // Once in the greeting, once for the command
    assert_eq!(stdout.matches(HELP_LINE).count(), 2);
    assert!(stdout.contains("US locations only"));
    assert!(stdout.trim_end().ends_with(GOODBYE));
}

#[test]
fn test_interactive_exit_command() {
    let output = travelpack_interactive("EXIT\nWhat should I pack for Chicago tomorrow?\n");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("TravelPack:\n"));
    assert!(stdout.contains(GOODBYE));
}

#[test]
fn test_interactive_end_of_input_exits_cleanly() {
    let output = travelpack_interactive("");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches(HELP_LINE).count(), 1);
    assert!(stdout.trim_end().ends_with(GOODBYE));
}
