use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::TempDir;

fn write_dump(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("dump.ndjson");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, r#"{{"name":"x","dependencies":["a","b"]}}"#).unwrap();
    writeln!(file, r#"{{"name":"y","dependencies":["b"]}}"#).unwrap();
    path
}

#[test]
fn cli_writes_ranked_json() {
    let dir = TempDir::new().unwrap();
    let input = write_dump(&dir);
    let out_dir = dir.path().join("out");

    Command::cargo_bin("deptally")
        .unwrap()
        .args([
            "--input-path",
            input.to_str().unwrap(),
            "--output-dir",
            out_dir.to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Ranking completed successfully"));

    let report = std::fs::read_to_string(out_dir.join("ranked.json")).unwrap();
    let parsed: Vec<serde_json::Value> = serde_json::from_str(&report).unwrap();
    assert_eq!(parsed[0]["name"], "b");
    assert_eq!(parsed[0]["count"], 2);
}

#[test]
fn cli_missing_input_fails_with_guidance() {
    let dir = TempDir::new().unwrap();

    Command::cargo_bin("deptally")
        .unwrap()
        .args([
            "--input-path",
            dir.path().join("absent.json").to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn cli_rejects_sub_sentinel_limit() {
    let dir = TempDir::new().unwrap();
    let input = write_dump(&dir);

    Command::cargo_bin("deptally")
        .unwrap()
        .args(["--input-path", input.to_str().unwrap(), "--limit", "-2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("-1 (unlimited) or any non-negative"));
}

#[test]
fn cli_requires_an_input_path() {
    Command::cargo_bin("deptally")
        .unwrap()
        .assert()
        .failure()
        .stderr(predicate::str::contains("input_path"));
}

#[test]
fn cli_markdown_format() {
    let dir = TempDir::new().unwrap();
    let input = write_dump(&dir);
    let out_dir = dir.path().join("out");

    Command::cargo_bin("deptally")
        .unwrap()
        .args([
            "--input-path",
            input.to_str().unwrap(),
            "--output-dir",
            out_dir.to_str().unwrap(),
            "--format",
            "markdown",
            "--limit",
            "1",
        ])
        .assert()
        .success();

    let report = std::fs::read_to_string(out_dir.join("ranked.md")).unwrap();
    assert_eq!(report.lines().count(), 3, "header, divider, one row");
    assert!(report.contains("| 1 | b | 2 |"));
}
