//! Tests for the edit-provenance command line.

use std::io::Write;
use std::process::Command;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_edit-provenance"))
}

#[test]
fn test_help_lists_subcommands() {
    let output = binary().arg("--help").output().expect("failed to run binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("replay"), "help should mention replay: {}", stdout);
    assert!(stdout.contains("defaults"), "help should mention defaults: {}", stdout);
}

#[test]
fn test_defaults_prints_toml() {
    let output = binary().arg("defaults").output().expect("failed to run binary");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("enabled = true"));
    assert!(stdout.contains("[combiner]"));
    assert!(stdout.contains("burst_timeout_ms = 1000"));
}

/// Given a trace typing two words with a reload in between,
/// When it is replayed,
/// Then the report attributes the typed text to the user.
#[test]
fn test_replay_prints_attribution() {
    let mut trace = tempfile::NamedTempFile::new().unwrap();
    write!(
        trace,
        r#"{{
            "uri": "file:///tmp/notes.md",
            "languageId": "markdown",
            "initialText": "",
            "steps": [
                {{"kind": "edit", "replacements": [{{"start": 0, "end": 0, "text": "hello"}}],
                  "reason": {{"source": "cursor"}}}},
                {{"kind": "edit", "replacements": [{{"start": 5, "end": 5, "text": " world"}}],
                  "reason": {{"source": "cursor"}}}}
            ]
        }}"#
    )
    .unwrap();
    let mut config = tempfile::NamedTempFile::new().unwrap();
    writeln!(config, "enabled = true").unwrap();

    let output = binary()
        .arg("replay")
        .arg(trace.path())
        .arg("--config")
        .arg(config.path())
        .output()
        .expect("failed to run binary");

    assert!(
        output.status.success(),
        "replay failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["text"], "hello world");
    let ranges = report["trackedRanges"].as_array().unwrap();
    assert_eq!(ranges.len(), 1, "consecutive typing should merge: {}", report);
    assert_eq!(ranges[0]["source"], "user");
    assert_eq!(ranges[0]["text"], "hello world");
}

#[test]
fn test_replay_reports_missing_trace() {
    let output = binary()
        .arg("replay")
        .arg("/nonexistent/trace.json")
        .output()
        .expect("failed to run binary");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error"), "stderr: {}", stderr);
}
