// crates/osql-cli/tests/cli.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests running the osql binary.
// Purpose: Validate end-to-end query, column, and table output.
// Dependencies: osql-cli binary
// ============================================================================
//! ## Overview
//! Runs the `osql` binary against the built-in tables with and without a
//! config file.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use serde_json::Value;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn osql_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_osql"))
}

fn run_osql(args: &[&str], config: Option<&Path>) -> Output {
    let mut command = Command::new(osql_bin());
    command.env_remove("OSQL_CONFIG").env_remove("OSQL_LOG");
    if let Some(config) = config {
        command.arg("--config").arg(config);
    }
    command.args(args).output().expect("run osql")
}

fn write_config(dir: &TempDir, content: &str) -> PathBuf {
    let path = dir.path().join("osql.toml");
    fs::write(&path, content).expect("write config");
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn query_prints_rows_as_json() {
    let output = run_osql(&["query", "SELECT 1 AS one, 'a' AS letter"], None);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let rows: Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(rows, serde_json::json!([{"one": 1, "letter": "a"}]));
}

#[test]
fn query_reads_builtin_tables() {
    let output = run_osql(&["query", "--format", "lines", "SELECT pid FROM osql_info"], None);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let row: Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert!(row["pid"].as_i64().unwrap() > 0);
}

#[test]
fn columns_prints_inferred_types() {
    let output =
        run_osql(&["columns", "SELECT key, upper(value) AS shouted, NULL AS nothing FROM env"], None);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let lines: Vec<String> = stdout(&output).lines().map(str::to_string).collect();
    assert_eq!(lines, vec![
        "key\tTEXT".to_string(),
        "shouted\tTEXT".to_string(),
        "nothing\tTEXT".to_string()
    ]);

    let output = run_osql(&["columns", "SELECT count(*) AS n FROM env"], None);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "n\tINTEGER");
}

#[test]
fn columns_json_keeps_unresolved_status() {
    let output = run_osql(&["columns", "--json", "SELECT NULL AS nothing"], None);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    let resolution: Value = serde_json::from_str(stdout(&output).trim()).unwrap();
    assert_eq!(resolution["columns"][0]["column_type"], "UNKNOWN");
    assert_eq!(resolution["status"]["status"], "partial");
    assert_eq!(resolution["status"]["unresolved"], serde_json::json!([0]));
}

#[test]
fn disabled_tables_are_reported_and_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, "[sqlite]\ndisabled_tables = \"env\"\n");

    let tables = run_osql(&["tables"], Some(&config));
    assert!(tables.status.success(), "stderr: {}", stderr(&tables));
    let listing = stdout(&tables);
    assert!(listing.contains("env\tdisabled"));
    assert!(listing.contains("osql_info\tattached"));

    let query = run_osql(&["query", "SELECT * FROM env"], Some(&config));
    assert!(!query.status.success());
    assert!(stderr(&query).contains("table_disabled"));
}

#[test]
fn syntax_errors_fail_with_query_kind() {
    let output = run_osql(&["query", "SELEC 1"], None);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("query_execution"));
}

#[test]
fn config_validate_reports_source() {
    let defaults = run_osql(&["config", "validate"], None);
    assert!(defaults.status.success());
    assert!(stdout(&defaults).contains("built-in defaults"));

    let dir = tempfile::tempdir().unwrap();
    let valid = write_config(&dir, "[logging]\nfilter = \"info\"\n");
    let output = run_osql(&["config", "validate"], Some(&valid));
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).contains("osql.toml"));
}

#[test]
fn config_validate_rejects_invalid_config() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, "[sqlite]\nsoft_heap_limit_bytes = 0\n");
    let output = run_osql(&["config", "validate"], Some(&config));
    assert!(!output.status.success());
    assert!(stderr(&output).contains("failed to load config"));
}
