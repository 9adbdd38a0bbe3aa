//! Integration tests for the `toml-compliance` binary.
//!
//! The fixture suite under `tests/fixtures/suite` pairs each decoder input with
//! its expected encoding on the first line (`# {...}`). Scripted decoders and
//! encoders are written to a temp dir and run through `sh`.
#![cfg(unix)]
// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const FAKE_DECODER: &str = r#"input=$(cat)
case "$input" in *INVALID*) echo "rejected" >&2; exit 1;; esac
printf '%s\n' "$input" | sed -n '1s/^# //p'
"#;

const FAKE_ENCODER: &str = r#"input=$(cat)
case "$input" in *INVALID*) exit 1;; esac
printf '# %s\n' "$(printf '%s' "$input" | tr -d '\n')"
"#;

/// Accepts everything and claims every document is empty.
const LENIENT_DECODER: &str = "cat >/dev/null; echo '{}'\n";

fn fixtures_dir() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures")
}

fn suite_dir() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/suite")
}

/// Helper: write a shell script into `dir` and return its path.
fn script(dir: &TempDir, name: &str, body: &str) -> String {
    let path: PathBuf = dir.path().join(name);
    std::fs::write(&path, body).expect("script must be writable");
    path.to_string_lossy().into_owned()
}

/// `toml-compliance decoder sh --suite <fixtures> <extra> -- <script>`
fn decoder_cmd(script_path: &str, extra: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("toml-compliance").unwrap();
    cmd.args(["decoder", "sh", "--suite", suite_dir()])
        .args(extra)
        .args(["--", script_path]);
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Decoder subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn decoder_all_pass() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "decoder.sh", FAKE_DECODER);

    decoder_cmd(&decoder, &[])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Summary: 5 passed, 0 failed, 0 errored, 5 total",
        ))
        .stdout(predicate::str::contains("PASS").not());
}

#[test]
fn decoder_verbose_lists_passing_cases() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "decoder.sh", FAKE_DECODER);

    decoder_cmd(&decoder, &["-v"])
        .assert()
        .success()
        .stdout(predicate::str::contains(" PASS  valid/integer/plus (decoder)"))
        .stdout(predicate::str::contains(" PASS  invalid/table/duplicate (decoder)"));
}

#[test]
fn decoder_failures_exit_one() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "lenient.sh", LENIENT_DECODER);

    decoder_cmd(&decoder, &[])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(" FAIL  valid/integer/plus (decoder)"))
        .stdout(predicate::str::contains("comparison mismatch"))
        .stdout(predicate::str::contains("at v: expected integer"))
        .stdout(predicate::str::contains("expected rejection"))
        .stdout(predicate::str::contains(
            "Summary: 0 passed, 5 failed, 0 errored, 5 total",
        ));
}

#[test]
fn decoder_malformed_output_is_errored() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "garbage.sh", "cat >/dev/null; echo 'v = 42'\n");

    decoder_cmd(&decoder, &["-m", "valid"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains(" ERROR valid/integer/plus (decoder)"))
        .stdout(predicate::str::contains("malformed encoding"))
        .stdout(predicate::str::contains("3 errored"));
}

#[test]
fn decoder_timeout_is_errored() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "slow.sh", "exec sleep 30\n");

    decoder_cmd(&decoder, &["-m", "unclosed", "--timeout", "0.2"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("timeout"))
        .stdout(predicate::str::contains("1 errored, 1 total"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Markers and suite selection
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn markers_narrow_the_run() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "lenient.sh", LENIENT_DECODER);

    // Only the string case; the lenient decoder fails it but nothing else runs.
    decoder_cmd(&decoder, &["-m", "valid", "-m", "string"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("1 total"))
        .stdout(predicate::str::contains("valid/string/basic"));
}

#[test]
fn comma_separated_markers_are_alternatives() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "decoder.sh", FAKE_DECODER);

    decoder_cmd(&decoder, &["-m", "integer,string"])
        .assert()
        .success()
        .stdout(predicate::str::contains("2 passed, 0 failed, 0 errored, 2 total"));
}

#[test]
fn no_selected_tests_is_not_a_failure() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "decoder.sh", FAKE_DECODER);

    decoder_cmd(&decoder, &["-m", "no-such-marker"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No tests were selected!"));
}

#[test]
fn toml_version_selects_subdirectory() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "decoder.sh", FAKE_DECODER);

    Command::cargo_bin("toml-compliance")
        .unwrap()
        .args(["decoder", "sh", "--suite", fixtures_dir(), "--toml-version", "suite"])
        .args(["--", &decoder])
        .assert()
        .success()
        .stdout(predicate::str::contains("5 total"));
}

#[test]
fn json_report() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "decoder.sh", FAKE_DECODER);

    let output = decoder_cmd(&decoder, &["--format", "json", "-j", "2"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["summary"]["total"], 5);
    assert_eq!(report["summary"]["passed"], 5);

    let results = report["results"].as_array().unwrap();
    // Sorted by path: `invalid/...` first.
    assert_eq!(results[0]["case"]["category"], "invalid");
    assert_eq!(results[0]["case"]["subcategory"], "array");
    assert_eq!(results[0]["case"]["name"], "unclosed");
    assert_eq!(results[0]["outcome"]["status"], "passed");
    assert_eq!(results[4]["case"]["category"], "valid");
    assert_eq!(results[4]["case"]["name"], "basic");
    assert!(results[0]["duration_ms"].is_u64());
}

// ─────────────────────────────────────────────────────────────────────────────
// Encoder subcommand
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn encoder_roundtrip_passes() {
    let dir = TempDir::new().unwrap();
    let encoder = script(&dir, "encoder.sh", FAKE_ENCODER);
    let decoder = script(&dir, "decoder.sh", FAKE_DECODER);

    Command::cargo_bin("toml-compliance")
        .unwrap()
        .args(["encoder", "sh", "--suite", suite_dir()])
        .args(["--decoder", "sh", "--decoder-arg", &decoder])
        .args(["--", &encoder])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Summary: 4 passed, 0 failed, 0 errored, 4 total",
        ));
}

#[test]
fn encoder_requires_decoder() {
    Command::cargo_bin("toml-compliance")
        .unwrap()
        .args(["encoder", "sh", "--suite", suite_dir()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--decoder"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration errors
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn missing_suite_exits_two() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "decoder.sh", FAKE_DECODER);
    let missing = dir.path().join("no-suite");

    Command::cargo_bin("toml-compliance")
        .unwrap()
        .args(["decoder", "sh", "--suite"])
        .arg(&missing)
        .args(["--", &decoder])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to load test cases"));
}

#[test]
fn non_executable_target_exits_two() {
    let dir = TempDir::new().unwrap();
    let decoder = script(&dir, "decoder.sh", FAKE_DECODER);

    Command::cargo_bin("toml-compliance")
        .unwrap()
        .args(["decoder", &decoder, "--suite", suite_dir()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Cannot run decoder"))
        .stderr(predicate::str::contains("not an executable file"));
}

#[test]
fn missing_target_exits_two() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope");

    Command::cargo_bin("toml-compliance")
        .unwrap()
        .arg("decoder")
        .arg(&missing)
        .args(["--suite", suite_dir()])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("could not find file"));
}

#[test]
fn zero_timeout_is_rejected() {
    Command::cargo_bin("toml-compliance")
        .unwrap()
        .args(["decoder", "sh", "--timeout", "0"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("timeout must be positive"));
}

#[test]
fn help_lists_subcommands() {
    Command::cargo_bin("toml-compliance")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("decoder"))
        .stdout(predicate::str::contains("encoder"));
}
