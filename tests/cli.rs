//! End-to-end CLI tests: bundle loading, context application, output
//! formats, and exit codes.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn write_bundle(dir: &TempDir) -> PathBuf {
    let bundle = serde_json::json!({
        "resources": [
            {
                "id": "platform.login.title",
                "resource_type_name": "json",
                "candidates": [
                    { "value": { "msg": "Welcome" } },
                    {
                        "value": { "msg": "Bienvenue" },
                        "conditions": [
                            { "qualifier_name": "language", "value": "fr" }
                        ]
                    }
                ]
            },
            {
                "id": "platform.login.subtitle",
                "resource_type_name": "json",
                "candidates": [
                    {
                        "value": { "msg": "Sign in" },
                        "conditions": [
                            { "qualifier_name": "language", "value": "en" }
                        ]
                    }
                ]
            }
        ]
    });
    let path = dir.path().join("bundle.json");
    std::fs::write(&path, serde_json::to_string_pretty(&bundle).unwrap()).unwrap();
    path
}

fn ruql() -> Command {
    Command::cargo_bin("ruql").unwrap()
}

#[test]
fn list_shows_resources_and_counts() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);

    ruql()
        .args(["--bundle", bundle.to_str().unwrap(), "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("platform.login.title  candidates=2"))
        .stdout(predicate::str::contains("platform.login.subtitle  candidates=1"));
}

#[test]
fn resolve_picks_contextual_candidate() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);

    ruql()
        .args([
            "--bundle",
            bundle.to_str().unwrap(),
            "resolve",
            "platform.login.title",
            "--context",
            "language=fr",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Bienvenue"));
}

#[test]
fn resolve_json_reports_success_and_source() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);

    let output = ruql()
        .args([
            "--bundle",
            bundle.to_str().unwrap(),
            "--format",
            "json",
            "resolve",
            "platform.login.title",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["success"], serde_json::json!(true));
    assert_eq!(report["source"], serde_json::json!("base"));
    assert_eq!(report["value"]["msg"], serde_json::json!("Welcome"));
}

#[test]
fn resolve_unknown_id_exits_with_data_error() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);

    ruql()
        .args(["--bundle", bundle.to_str().unwrap(), "resolve", "platform.ghost"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn resolve_malformed_id_exits_with_data_error() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);

    ruql()
        .args(["--bundle", bundle.to_str().unwrap(), "resolve", "bad..id"])
        .assert()
        .failure()
        .code(3)
        .stderr(predicate::str::contains("invalid resource id"));
}

#[test]
fn filter_counts_surviving_candidates() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);

    // Empty context: everything survives under partial matching.
    ruql()
        .args(["--bundle", bundle.to_str().unwrap(), "filter"])
        .assert()
        .success()
        .stdout(predicate::str::contains("platform.login.title  kept 2/2"));

    // language=fr contradicts the subtitle's only candidate.
    ruql()
        .args([
            "--bundle",
            bundle.to_str().unwrap(),
            "filter",
            "--context",
            "language=fr",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("platform.login.title  kept 2/2"))
        .stdout(predicate::str::contains(
            "platform.login.subtitle  kept 0/1  (unresolvable)",
        ));
}

#[test]
fn filter_reduce_strips_guaranteed_conditions() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);

    let output = ruql()
        .args([
            "--bundle",
            bundle.to_str().unwrap(),
            "--format",
            "json",
            "filter",
            "--context",
            "language=fr",
            "--reduce",
        ])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let resources = report["collection"]["resources"].as_array().unwrap();
    assert_eq!(resources.len(), 1);
    let title = &resources[0];
    assert_eq!(title["id"], serde_json::json!("platform.login.title"));
    for candidate in title["candidates"].as_array().unwrap() {
        assert!(candidate["conditions"].as_array().unwrap().is_empty());
    }
    assert_eq!(
        report["warnings"],
        serde_json::json!(["platform.login.subtitle"])
    );
}

#[test]
fn tree_prints_folder_hierarchy() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);

    ruql()
        .args(["--bundle", bundle.to_str().unwrap(), "tree"])
        .assert()
        .success()
        .stdout(predicate::str::contains("platform/"))
        .stdout(predicate::str::contains("  login/"))
        .stdout(predicate::str::contains("    title"));
}

#[test]
fn missing_bundle_is_a_usage_error() {
    ruql().arg("list").assert().failure().code(2);
}

#[test]
fn records_format_emits_line_records() {
    let dir = TempDir::new().unwrap();
    let bundle = write_bundle(&dir);

    ruql()
        .args([
            "--bundle",
            bundle.to_str().unwrap(),
            "--format",
            "records",
            "list",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("R platform.login.title candidates=2"));
}
