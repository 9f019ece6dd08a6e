//! Exit code integration tests
//!
//! ## Exit Code Contract
//!
//! | Exit Code | Meaning |
//! |-----------|---------|
//! | 0 | Success: workbook written |
//! | 1 | Failure: malformed JSON, bad config, unwritable output |
//! | 2 | Usage: missing OUTPUT argument |

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

const SAMPLE: &str = r#"{"proposals": [
    {"id": 0, "status": "vendida", "createdAt": "2024-03-01", "value": "100,00", "clientName": "ACME"},
    {"id": 1, "status": "pendente", "createdAt": "2024-04-01T10:00:00Z", "value": "50,00", "clientName": "Beta"},
    {"id": 2, "status": "cancelada", "createdAt": "not-a-date", "value": "abc", "clientName": "Gama"}
]}"#;

fn fechou_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_fechou-report"))
}

/// Run the generator with `stdin` piped in
fn run(args: &[&str], stdin: &str) -> Output {
    let mut child = Command::new(fechou_binary())
        .args(args)
        .env_remove("RUST_LOG")
        .env_remove("FECHOU_CONFIG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to execute fechou-report");

    // Usage errors exit before reading stdin; a broken pipe is expected then
    if let Some(mut pipe) = child.stdin.take() {
        pipe.write_all(stdin.as_bytes()).ok();
    }

    child.wait_with_output().expect("failed to wait for fechou-report")
}

fn output_path(dir: &TempDir) -> PathBuf {
    dir.path().join("dashboard.xlsx")
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

fn is_xlsx(path: &Path) -> bool {
    std::fs::read(path).map(|bytes| bytes.starts_with(b"PK")).unwrap_or(false)
}

// =============================================================================
// Success
// =============================================================================

#[test]
fn exit_0_writes_workbook() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);

    let result = run(&[arg(&out)], SAMPLE);

    assert_eq!(result.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&result.stderr));
    assert!(is_xlsx(&out));
}

#[test]
fn exit_0_on_empty_stdin() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);

    let result = run(&[arg(&out)], "");

    assert_eq!(result.status.code(), Some(0));
    assert!(is_xlsx(&out));
}

#[test]
fn exit_0_on_null_proposals() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);

    let result = run(&[arg(&out)], r#"{"proposals": null}"#);

    assert_eq!(result.status.code(), Some(0));
    assert!(is_xlsx(&out));
}

#[test]
fn exit_0_with_static_values() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);

    let result = run(&["--static-values", arg(&out)], SAMPLE);

    assert_eq!(result.status.code(), Some(0));
    assert!(is_xlsx(&out));
}

#[test]
fn exit_0_with_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);
    let config = dir.path().join("report.toml");
    std::fs::write(&config, "period_months = 6\n\n[lookups]\nsellers = [\"Ana\", \"Bea\"]\n").unwrap();

    let result = run(&["--config", arg(&config), arg(&out)], SAMPLE);

    assert_eq!(result.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&result.stderr));
    assert!(is_xlsx(&out));
}

#[test]
fn logs_go_to_stderr_only() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);

    let result = run(&["-vv", arg(&out)], SAMPLE);

    assert_eq!(result.status.code(), Some(0));
    assert!(result.stdout.is_empty());
    assert!(!result.stderr.is_empty());
}

#[test]
fn exit_0_on_oversized_values() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);
    let huge = "79.228.162.514.264.337.593.543.950.335";
    let input = format!(
        r#"{{"proposals": [
            {{"id": 0, "status": "vendida", "value": "{huge}", "clientName": "ACME"}},
            {{"id": 1, "status": "vendida", "value": "{huge}", "clientName": "ACME"}}
        ]}}"#
    );

    let result = run(&[arg(&out)], &input);

    assert_eq!(result.status.code(), Some(0), "stderr: {}", String::from_utf8_lossy(&result.stderr));
    assert!(!String::from_utf8_lossy(&result.stderr).contains("panicked"));
    assert!(is_xlsx(&out));
}

// =============================================================================
// Failure
// =============================================================================

#[test]
fn exit_1_on_malformed_json() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);

    let result = run(&[arg(&out)], "{\"proposals\": [");

    assert_eq!(result.status.code(), Some(1));
    assert!(!result.stderr.is_empty());
    assert!(!out.exists(), "no output on failure");
}

#[test]
fn exit_1_on_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);
    let config = dir.path().join("report.toml");
    std::fs::write(&config, "[lookups]\nchannels = []\n").unwrap();

    let result = run(&["-c", arg(&config), arg(&out)], SAMPLE);

    assert_eq!(result.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&result.stderr).contains("channels"));
    assert!(!out.exists());
}

#[test]
fn exit_1_on_missing_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);
    let config = dir.path().join("absent.toml");

    let result = run(&["-c", arg(&config), arg(&out)], SAMPLE);

    assert_eq!(result.status.code(), Some(1));
    assert!(!out.exists());
}

#[test]
fn exit_1_on_unwritable_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("missing").join("dashboard.xlsx");

    let result = run(&[arg(&out)], SAMPLE);

    assert_eq!(result.status.code(), Some(1));
    assert!(!out.exists());
}

#[test]
fn failure_keeps_previous_output() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);
    std::fs::write(&out, b"previous").unwrap();

    let result = run(&[arg(&out)], "not json");

    assert_eq!(result.status.code(), Some(1));
    assert_eq!(std::fs::read(&out).unwrap(), b"previous");
}

// =============================================================================
// Usage
// =============================================================================

#[test]
fn exit_2_without_output_argument() {
    let result = run(&[], SAMPLE);

    assert_eq!(result.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&result.stderr).to_lowercase().contains("usage"));
}

#[test]
fn exit_2_on_unknown_flag() {
    let dir = tempfile::tempdir().unwrap();
    let out = output_path(&dir);

    let result = run(&["--no-such-flag", arg(&out)], SAMPLE);

    assert_eq!(result.status.code(), Some(2));
    assert!(!out.exists());
}
