// End-to-end tests for the chewdoc binary

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn chewdoc() -> Command {
    Command::cargo_bin("chewdoc").unwrap()
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn sample_package(dir: &TempDir) -> PathBuf {
    let root = dir.path().join("project");
    write(&root, "pyproject.toml", "[project]\nname = \"geometry\"\nversion = \"0.3.0\"\n");
    write(&root, "geometry/__init__.py", "from .shapes import Circle\n");
    write(
        &root,
        "geometry/shapes.py",
        "class Circle:\n    \"\"\"A circle.\"\"\"\n\n    def area(self) -> float:\n        return 3.14\n",
    );
    root
}

#[test]
fn test_analyze_prints_model_to_stdout() {
    let dir = TempDir::new().unwrap();
    let root = sample_package(&dir);

    let output = chewdoc().arg("analyze").arg(&root).output().unwrap();
    assert!(output.status.success());

    let model: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(model["metadata"]["name"], "geometry");
    assert_eq!(model["metadata"]["version"], "0.3.0");
    assert!(model["symbols"]["geometry.shapes.Circle.area"].is_object());
}

#[test]
fn test_analyze_writes_output_file() {
    let dir = TempDir::new().unwrap();
    let root = sample_package(&dir);
    let out = dir.path().join("build/model.json");

    chewdoc()
        .arg("analyze")
        .arg(&root)
        .arg("--compact")
        .arg("-o")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let text = fs::read_to_string(&out).unwrap();
    assert_eq!(text.lines().count(), 1);
    assert!(text.contains("\"geometry.shapes.Circle\""));
}

#[test]
fn test_package_version_override() {
    let dir = TempDir::new().unwrap();
    let root = sample_package(&dir);

    chewdoc()
        .args(["analyze", "--package-version", "9.9.9"])
        .arg(&root)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"9.9.9\""));
}

#[test]
fn test_config_file_aliases() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("project");
    write(&root, "ids/lookup.py", "def find(key: UserId) -> None:\n    pass\n");
    let config = dir.path().join("chewdoc.toml");
    fs::write(&config, "[analysis.known_types]\nUserId = \"int\"\n").unwrap();

    chewdoc()
        .arg("analyze")
        .arg(&root)
        .arg("-c")
        .arg(&config)
        .assert()
        .success()
        .stderr(predicate::str::contains("unresolved-type").not());
}

#[test]
fn test_diagnostics_go_to_stderr() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("project");
    write(&root, "pkg/good.py", "X = 1\n");
    write(&root, "pkg/bad.py", "def broken(:\n");

    chewdoc()
        .arg("analyze")
        .arg(&root)
        .assert()
        .success()
        .stderr(predicate::str::contains("error[parse-failure]"))
        .stdout(predicate::str::contains("pkg.good.X"));
}

#[test]
fn test_duplicate_module_exits_with_no_model() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("project");
    write(&root, "pkg/a.py", "X = 1\n");
    write(&root, "pkg/a/__init__.py", "Y = 2\n");

    chewdoc()
        .arg("analyze")
        .arg(&root)
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("structural-violation"));
}

#[test]
fn test_missing_path_fails() {
    chewdoc()
        .args(["analyze", "/nonexistent/path/to/package"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Path not found"));
}

#[test]
fn test_invalid_line_limit_fails() {
    let dir = TempDir::new().unwrap();
    let root = sample_package(&dir);

    chewdoc()
        .arg("analyze")
        .arg(&root)
        .args(["--max-example-lines", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Config validation error"));
}

#[test]
fn test_version_command() {
    chewdoc()
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("chewdoc "));
}
