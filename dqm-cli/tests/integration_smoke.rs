//! Smoke tests to verify command wiring
//!
//! None of these reach a database: they cover help output, argument
//! validation and dry runs, which only read the input file.

use std::io::Write;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::NamedTempFile;

fn dqmctl() -> Command {
    let mut cmd = Command::cargo_bin("dqmctl").unwrap();
    cmd.env("DQMCTL_QUIET", "1")
        .env_remove("DATABASE_URL")
        .env_remove("DJANGO_DATABASE_NAME");
    cmd
}

fn csv_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// === Help Output ===

#[test]
fn test_top_level_help_lists_commands() {
    dqmctl()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("extract-lumisections-histos2d"))
        .stdout(predicate::str::contains("load-ml-bad-lumis"))
        .stdout(predicate::str::contains("migrate"));
}

#[test]
fn test_extract_help() {
    dqmctl()
        .args(["extract-lumisections-histos2d", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--all-runs"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_histos_list_help() {
    dqmctl()
        .args(["histos", "list", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("LOOKUP=VALUE"));
}

#[test]
fn test_migrate_status_help() {
    dqmctl()
        .args(["migrate", "status", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Output format"));
}

#[test]
fn test_completions_bash() {
    dqmctl()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("dqmctl"));
}

// === Dry Runs ===

#[test]
fn test_extract_dry_run_counts_selected_rows() {
    let file = csv_file(
        "fromrun,fromlumi,hname,entries,histo\n\
         297057,1,Tracking/hits,10.0,\"[[1,2]]\"\n\
         297057,2,Tracking/hits,11.0,\"[[3,4]]\"\n\
         297100,1,Tracking/hits,12.0,\"[[5,6]]\"\n",
    );

    dqmctl()
        .arg("extract-lumisections-histos2d")
        .arg(file.path())
        .args(["--dry-run", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"rows_read\": 3"))
        .stdout(predicate::str::contains("\"rows_selected\": 2"));
}

#[test]
fn test_load_dry_run() {
    let file = csv_file(
        "model_name,dataset_id,file_id,run_number,ls_number,me_id\n\
         ae-v1,12,301,297057,10,88\n",
    );

    dqmctl()
        .arg("load-ml-bad-lumis")
        .arg(file.path())
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 rows read"));
}

// === Errors ===

#[test]
fn test_missing_file_fails() {
    dqmctl()
        .args(["load-ml-bad-lumis", "/nonexistent/bad_lumis.csv", "--dry-run"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/bad_lumis.csv"));
}

#[test]
fn test_malformed_row_names_line() {
    let file = csv_file(
        "model_name,dataset_id,file_id,run_number,ls_number,me_id\n\
         ae-v1,12,301,297057,10,88\n\
         ae-v1,twelve,301,297057,11,88\n",
    );

    dqmctl()
        .arg("load-ml-bad-lumis")
        .arg(file.path())
        .arg("--dry-run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 3"));
}

#[test]
fn test_histos_without_database_config_fails() {
    dqmctl()
        .current_dir(std::env::temp_dir())
        .env("HOME", std::env::temp_dir())
        .args(["histos", "titles"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No database configured"));
}
