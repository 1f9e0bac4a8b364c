use std::fs;

use assert_cmd::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

fn write_observations(dir: &TempDir, name: &str, json: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, json).unwrap();
    path
}

#[test]
fn cli_report_first_run_writes_artifacts() {
    let dir = TempDir::new().unwrap();
    let input = write_observations(
        &dir,
        "observations.json",
        r#"[
            {"library":"Movies","title":"Alpha","value":10.0},
            {"library":"TV","title":"Beta","value":5.0,"count":12}
        ]"#,
    );
    let snapshot = dir.path().join("library-sizes.json");
    let out = dir.path().join("out");

    let mut cmd = cargo_bin_cmd!("mediadrift");
    cmd.args([
        "report",
        "--input",
        input.to_str().unwrap(),
        "--snapshot",
        snapshot.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("changes=0 batches=1 truncated=false"));

    assert!(out.join("batches.json").exists());
    assert!(out.join("report.md").exists());
    assert!(snapshot.exists());
}

#[test]
fn cli_report_second_run_reports_changes() {
    let dir = TempDir::new().unwrap();
    let snapshot = dir.path().join("library-sizes.json");
    let out = dir.path().join("out");

    let first = write_observations(
        &dir,
        "first.json",
        r#"[
            {"library":"Movies","title":"Alpha","value":10.0},
            {"library":"TV","title":"Beta","value":5.0,"count":12}
        ]"#,
    );
    let mut cmd = cargo_bin_cmd!("mediadrift");
    cmd.args([
        "report",
        "--input",
        first.to_str().unwrap(),
        "--snapshot",
        snapshot.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
    ]);
    cmd.assert().success();

    let second = write_observations(
        &dir,
        "second.json",
        r#"[
            {"library":"Movies","title":"Alpha","value":12.5},
            {"library":"TV","title":"Beta","value":5.4,"count":13}
        ]"#,
    );
    let mut cmd = cargo_bin_cmd!("mediadrift");
    cmd.args([
        "report",
        "--input",
        second.to_str().unwrap(),
        "--snapshot",
        snapshot.to_str().unwrap(),
        "--out",
        out.to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("changes=2 batches=1 truncated=false"));

    let batches = fs::read_to_string(out.join("batches.json")).unwrap();
    assert!(batches.contains("NEW EPISODES: Beta"));
    assert!(batches.contains("QUALITY CHANGE: Alpha"));
}

#[test]
fn cli_report_suppress_first_run_emits_no_batches() {
    let dir = TempDir::new().unwrap();
    let input = write_observations(
        &dir,
        "observations.json",
        r#"[{"library":"Movies","title":"Alpha","value":10.0}]"#,
    );
    let snapshot = dir.path().join("library-sizes.json");
    let out = dir.path().join("out");

    let mut cmd = cargo_bin_cmd!("mediadrift");
    cmd.args([
        "report",
        "--input",
        input.to_str().unwrap(),
        "--snapshot",
        snapshot.to_str().unwrap(),
        "--first-run",
        "suppress",
        "--out",
        out.to_str().unwrap(),
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("changes=0 batches=0 truncated=false"));
    assert!(snapshot.exists());
}

#[test]
fn cli_report_errors_on_missing_input() {
    let dir = TempDir::new().unwrap();
    let mut cmd = cargo_bin_cmd!("mediadrift");
    cmd.args([
        "report",
        "--input",
        "does-not-exist.json",
        "--out",
        dir.path().join("out").to_str().unwrap(),
        "--snapshot",
        dir.path().join("snap.json").to_str().unwrap(),
    ]);
    cmd.assert().failure().code(1);
}

#[test]
fn cli_report_errors_on_malformed_observations() {
    let dir = TempDir::new().unwrap();
    let input = write_observations(&dir, "bad.json", "{ not an array ]");
    let mut cmd = cargo_bin_cmd!("mediadrift");
    cmd.args([
        "report",
        "--input",
        input.to_str().unwrap(),
        "--snapshot",
        dir.path().join("snap.json").to_str().unwrap(),
        "--out",
        dir.path().join("out").to_str().unwrap(),
    ]);
    cmd.assert().failure().code(1);
}
