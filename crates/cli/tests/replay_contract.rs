use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

fn write_script(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("script.json");
    fs::write(&path, body).expect("script should be written");
    path
}

fn replay(script: &Path, extra: &[&str]) -> Value {
    let output = cargo_bin_cmd!("markup-cli")
        .arg("replay")
        .arg(script)
        .args(extra)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

#[test]
fn replay_draws_and_reports_document_coordinates() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(
        temp.path(),
        r#"{
            "container": [2000, 2000],
            "author": "qa",
            "steps": [
                { "op": "zoom", "zoom": 2.0 },
                { "op": "tool", "tool": "rectangle" },
                { "op": "drag", "from": [40, 60], "to": [240, 160] }
            ]
        }"#,
    );

    let value = replay(&script, &[]);
    assert_eq!(value["page"], 1);
    assert_eq!(value["scale"], 2.0);
    assert_eq!(value["undo_depth"], 1);
    assert_eq!(value["errors"].as_array().map(Vec::len), Some(0));

    let annotation = &value["annotations"][0];
    assert_eq!(annotation["type"], "rectangle");
    assert_eq!(annotation["author"], "qa");
    assert_eq!(annotation["position"]["x"], 20.0);
    assert_eq!(annotation["size"]["width"], 100.0);
}

#[test]
fn replay_undo_removes_last_annotation() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(
        temp.path(),
        r#"{
            "steps": [
                { "op": "tool", "tool": "arrow" },
                { "op": "drag", "from": [10, 10], "to": [110, 10] },
                { "op": "tool", "tool": "circle" },
                { "op": "drag", "from": [200, 200], "to": [260, 200] },
                { "op": "key", "key": "undo" }
            ]
        }"#,
    );

    let value = replay(&script, &[]);
    let annotations = value["annotations"].as_array().expect("annotations array");
    assert_eq!(annotations.len(), 1);
    assert_eq!(annotations[0]["type"], "arrow");
    assert_eq!(value["redo_depth"], 1);
}

#[test]
fn replay_writes_journal_and_sidecar() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let journal = temp.path().join("changes.jsonl");
    let sidecar = temp.path().join("doc.pdf.markup.json");
    let script = write_script(
        temp.path(),
        r#"{
            "steps": [
                { "op": "tool", "tool": "text" },
                { "op": "down", "x": 50, "y": 50 },
                { "op": "type", "text": "Check this" },
                { "op": "finish_text" }
            ]
        }"#,
    );

    let value = replay(
        &script,
        &[
            "--journal",
            journal.to_str().expect("utf-8 path"),
            "--save",
            sidecar.to_str().expect("utf-8 path"),
        ],
    );
    assert_eq!(value["annotations"][0]["text"]["text"], "Check this");

    let lines = fs::read_to_string(&journal).expect("journal should exist");
    let changes: Vec<Value> = lines
        .lines()
        .map(|line| serde_json::from_str(line).expect("journal line should be json"))
        .collect();
    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0]["change"], "added");
    assert_eq!(changes[1]["change"], "updated");

    let reloaded = write_script(temp.path(), r#"{ "steps": [] }"#);
    let value = replay(&reloaded, &["--load", sidecar.to_str().expect("utf-8 path")]);
    assert_eq!(value["annotations"][0]["text"]["text"], "Check this");
}

#[test]
fn config_prints_effective_values() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let path = temp.path().join("engine.json");
    fs::write(&path, r#"{ "history_limit": 10 }"#).expect("config should be written");

    cargo_bin_cmd!("markup-cli")
        .arg("config")
        .arg("--config")
        .arg(&path)
        .env("MARKUP_PASTE_OFFSET", "35")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"history_limit\": 10"))
        .stdout(predicate::str::contains("\"paste_offset\": 35"));
}

#[test]
fn replay_fails_for_missing_script() {
    cargo_bin_cmd!("markup-cli")
        .arg("replay")
        .arg("does-not-exist.json")
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read script"));
}

#[test]
fn replay_rejects_unknown_steps() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(temp.path(), r#"{ "steps": [ { "op": "explode" } ] }"#);

    cargo_bin_cmd!("markup-cli")
        .arg("replay")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid script"));
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("markup-cli")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}
