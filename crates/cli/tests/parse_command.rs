use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn codedoc(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("codedoc").expect("binary");
    cmd.current_dir(workdir)
        .arg("--quiet")
        // Point the engine somewhere empty so JS/TS behaviour does not depend on the host
        .arg("--engine-dir")
        .arg(workdir.join("no-engine"))
        .arg("--node")
        .arg("codedoc-test-missing-node");
    cmd
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("valid json on stdout")
}

#[test]
fn parse_python_file_prints_module_json() {
    let temp = tempdir().unwrap();
    fs::write(
        temp.path().join("math_utils.py"),
        "def add(a: int, b: int) -> int:\n    \"\"\"Add two numbers.\"\"\"\n    return a + b\n\ndef _hidden():\n    pass\n",
    )
    .unwrap();

    let output = codedoc(temp.path())
        .arg("parse")
        .arg("math_utils.py")
        .output()
        .expect("run");
    assert!(output.status.success(), "{output:?}");

    let module = stdout_json(&output);
    assert_eq!(module["language"], "python");
    assert_eq!(module["total_functions"], 1);
    assert_eq!(module["functions"][0]["name"], "add");
    assert_eq!(module["functions"][0]["return_type_annotation"], "int");
    assert_eq!(module["functions"][0]["doc_comment"], "Add two numbers.");
}

#[test]
fn include_private_keeps_underscore_names() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("m.py"), "def _hidden():\n    pass\n").unwrap();

    let output = codedoc(temp.path())
        .args(["parse", "m.py", "--include-private", "--pretty"])
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["functions"][0]["name"], "_hidden");
}

#[test]
fn parse_directory_reports_skipped_files() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("a.py"), "def a():\n    pass\n").unwrap();
    fs::write(src.join("b.py"), "def b(:\n").unwrap();
    fs::write(src.join("c.py"), "class C:\n    pass\n").unwrap();
    fs::write(src.join("d.js"), "export function d() {}\n").unwrap();

    let output = codedoc(temp.path())
        .arg("parse")
        .arg("src")
        .output()
        .expect("run");
    assert!(output.status.success(), "batch never fails on a bad file");

    let report = stdout_json(&output);
    assert_eq!(report["results"].as_array().map(Vec::len), Some(2));

    let skipped = report["skipped"].as_array().expect("skipped list");
    let kinds: Vec<_> = skipped
        .iter()
        .map(|s| s["reason"]["kind"].as_str().unwrap_or_default())
        .collect();
    assert_eq!(kinds, vec!["syntax_failure", "tooling_unavailable"]);
}

#[test]
fn js_file_without_engine_fails() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("app.js"), "function f() {}\n").unwrap();

    codedoc(temp.path())
        .args(["parse", "app.js"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("engine"));
}

#[test]
fn unsupported_extension_fails() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("main.rb"), "puts 1\n").unwrap();

    codedoc(temp.path())
        .args(["parse", "main.rb"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported language"));
}

#[test]
fn syntax_error_in_single_file_fails() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("bad.py"), "def broken(:\n    pass\n").unwrap();

    codedoc(temp.path())
        .args(["parse", "bad.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Syntax error"));
}

#[test]
fn config_file_with_unknown_key_is_rejected() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("codedoc.toml"), "unknown_key = true\n").unwrap();
    fs::write(temp.path().join("m.py"), "x = 1\n").unwrap();

    codedoc(temp.path())
        .args(["--config", "codedoc.toml", "parse", "m.py"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("codedoc.toml"));
}

#[test]
fn config_file_sets_privacy() {
    let temp = tempdir().unwrap();
    fs::write(
        temp.path().join("codedoc.toml"),
        "include_private = true\n\n[engine]\ntimeout_ms = 5000\n",
    )
    .unwrap();
    fs::write(temp.path().join("m.py"), "def _a():\n    pass\n").unwrap();

    let output = codedoc(temp.path())
        .args(["--config", "codedoc.toml", "parse", "m.py"])
        .output()
        .expect("run");
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["total_functions"], 1);
}

#[test]
fn language_flag_forces_python_on_any_extension() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("tasks.txt"), "def build():\n    pass\n").unwrap();

    let output = codedoc(temp.path())
        .args(["parse", "tasks.txt", "--language", "python"])
        .output()
        .expect("run");
    assert!(output.status.success(), "{output:?}");

    let module = stdout_json(&output);
    assert_eq!(module["language"], "python");
    assert_eq!(module["functions"][0]["name"], "build");
}

#[test]
fn language_flag_filters_directory_scan() {
    let temp = tempdir().unwrap();
    let src = temp.path().join("src");
    fs::create_dir_all(&src).unwrap();
    fs::write(src.join("a.py"), "def a():\n    pass\n").unwrap();
    fs::write(src.join("b.js"), "export function b() {}\n").unwrap();

    let output = codedoc(temp.path())
        .args(["parse", "src", "--language", "py"])
        .output()
        .expect("run");
    assert!(output.status.success(), "{output:?}");

    let report = stdout_json(&output);
    assert_eq!(report["results"].as_array().map(Vec::len), Some(1));
    assert_eq!(report["skipped"].as_array().map(Vec::len), Some(0));
}

#[test]
fn unknown_language_name_is_rejected() {
    let temp = tempdir().unwrap();
    fs::write(temp.path().join("m.py"), "x = 1\n").unwrap();

    codedoc(temp.path())
        .args(["parse", "m.py", "--language", "cobol"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cobol"));
}
