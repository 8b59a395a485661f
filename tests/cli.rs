use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

const DOC: &str = r#"{"version": 1, "blocks": [
    {"type": "heading", "data": {"content": "Intro", "level": 1}},
    {"type": "paragraph", "data": {"content": "Hello <b>world</b>"}},
    {"type": "heading", "data": {"content": "Intro", "level": 2}}
]}"#;

#[test]
#[allow(deprecated)]
fn test_check_clean_document() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.json");
    fs::write(&path, DOC).unwrap();

    let mut cmd = Command::cargo_bin("blockwright").unwrap();
    cmd.arg("check").arg(&path);
    cmd.assert()
        .success()
        .code(0)
        .stdout(predicate::str::contains("3 blocks"));
}

#[test]
#[allow(deprecated)]
fn test_check_flags_bad_embed_as_json() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.json");
    fs::write(
        &path,
        r#"[{"type": "image", "data": {"url": "javascript:alert(1)"}}]"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("blockwright").unwrap();
    cmd.arg("check").arg("--json").arg(&path);
    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(1));

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json.get("blocks").unwrap(), 1);
    let flagged = json.get("flagged").unwrap().as_array().unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].get("type").unwrap(), "image");
}

#[test]
#[allow(deprecated)]
fn test_normalize_writes_canonical_payload() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("doc.json");
    let output = dir.path().join("out.json");
    fs::write(&input, r#"[{"type": "paragraph", "data": {"content": "<strong>x</strong>"}}]"#)
        .unwrap();

    let mut cmd = Command::cargo_bin("blockwright").unwrap();
    cmd.arg("normalize").arg(&input).arg("-o").arg(&output);
    cmd.assert().success().code(0);

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written.get("version").unwrap(), 1);
    let block = &written.get("blocks").unwrap()[0];
    assert_eq!(block.get("data").unwrap().get("content").unwrap(), "<b>x</b>");
    assert!(block.get("id").unwrap().is_string());
}

#[test]
#[allow(deprecated)]
fn test_text_and_outline() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.json");
    fs::write(&path, DOC).unwrap();

    let mut cmd = Command::cargo_bin("blockwright").unwrap();
    cmd.arg("text").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello world"));

    let mut cmd = Command::cargo_bin("blockwright").unwrap();
    cmd.arg("outline").arg(&path);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Intro #intro\n  Intro #intro-1"));
}

#[test]
#[allow(deprecated)]
fn test_unreadable_input_exits_with_two() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("doc.json");
    fs::write(&path, "not json").unwrap();

    let mut cmd = Command::cargo_bin("blockwright").unwrap();
    cmd.arg("check").arg(&path);
    cmd.assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("Error:"));

    let mut cmd = Command::cargo_bin("blockwright").unwrap();
    cmd.arg("text").arg(dir.path().join("missing.json"));
    cmd.assert().failure().code(2);
}
