use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/compose")
        .join(name)
}

fn compose2k8s() -> Command {
    Command::cargo_bin("compose2k8s").unwrap()
}

#[test]
fn test_convert_then_validate() {
    let out = TempDir::new().unwrap();

    compose2k8s()
        .arg("convert")
        .arg("-f")
        .arg(fixture("cache-gated").join("compose.yaml"))
        .arg("-o")
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("manifests from"));

    assert!(out.path().join("worker-deployment.yaml").is_file());
    assert!(out.path().join("cache-statefulset.yaml").is_file());
    assert!(out.path().join("README.md").is_file());

    compose2k8s()
        .arg("validate")
        .arg(out.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("are valid"));
}

#[test]
fn test_detects_compose_file_in_current_dir() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("docker-compose.yml"),
        "services:\n  web:\n    image: nginx:1.27\n    ports: [\"80:80\"]\n",
    )
    .unwrap();

    compose2k8s()
        .current_dir(dir.path())
        .args(["-q", "convert", "--format", "single-file", "-n", "staging"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let all = fs::read_to_string(dir.path().join("k8s/all-resources.yaml")).unwrap();
    assert!(all.contains("namespace: staging"));
}

#[test]
fn test_missing_compose_file_fails() {
    let dir = TempDir::new().unwrap();
    compose2k8s()
        .current_dir(dir.path())
        .arg("convert")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No compose file found"));
}

#[test]
fn test_schema_errors_are_reported() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("compose.yaml");
    fs::write(&file, "services:\n  web:\n    image: [nginx]\n").unwrap();

    compose2k8s()
        .arg("convert")
        .arg("-f")
        .arg(&file)
        .arg("-o")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("services.web.image"));
}

#[test]
fn test_warnings_go_to_stderr() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("compose.yaml");
    fs::write(
        &file,
        "services:\n  api:\n    image: myorg/api\n    depends_on: [ghost]\n",
    )
    .unwrap();

    compose2k8s()
        .arg("convert")
        .arg("-f")
        .arg(&file)
        .arg("-o")
        .arg(dir.path().join("out"))
        .assert()
        .success()
        .stderr(predicate::str::contains("ghost"));
}

#[test]
fn test_validate_flags_incomplete_documents() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("bad.yaml"), "kind: Service\nmetadata:\n  name: web\n").unwrap();

    compose2k8s()
        .arg("validate")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("missing apiVersion"));
}

#[test]
fn test_json_report() {
    let out = TempDir::new().unwrap();
    let assert = compose2k8s()
        .arg("convert")
        .arg("--json")
        .arg("-f")
        .arg(fixture("web-api-db").join("docker-compose.yml"))
        .arg("-o")
        .arg(out.path())
        .assert()
        .success();

    let report: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    let kinds: Vec<&str> = report["manifests"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["kind"].as_str().unwrap())
        .collect();
    assert!(kinds.contains(&"StatefulSet"));
    assert!(kinds.contains(&"Secret"));
    assert_eq!(report["migrationScripts"][0], "migrate-db.sh");
    assert!(report["warnings"].as_array().unwrap().is_empty());
}
