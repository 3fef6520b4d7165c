use std::fs;

use assert_cmd::Command;
use shipyard::git::Git;
use tempfile::tempdir;

fn shipyard(dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("shipyard").expect("binary present");
    cmd.current_dir(dir)
        .env("HOME", dir)
        .env_remove("GITHUB_TOKEN")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn list_stages_prints_pipeline_and_publishers() {
    let temp = tempdir().unwrap();
    let assert = shipyard(temp.path()).arg("list-stages").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();
    for name in ["env", "git", "snapshot", "artifacts", "publish", "put", "release", "scoop"] {
        assert!(stdout.contains(name), "missing {name} in:\n{stdout}");
    }
    assert!(stdout.find("release").unwrap() < stdout.rfind("scoop").unwrap());
}

#[test]
fn init_then_check_succeeds() {
    let temp = tempdir().unwrap();
    shipyard(temp.path())
        .args(["init", "--project-name", "tool"])
        .assert()
        .success();
    assert!(temp.path().join(".shipyard.yml").is_file());

    shipyard(temp.path()).arg("check").assert().success();
    shipyard(temp.path())
        .args(["init", "--project-name", "tool"])
        .assert()
        .failure();
}

#[test]
fn check_rejects_invalid_config() {
    let temp = tempdir().unwrap();
    fs::write(
        temp.path().join("bad.yml"),
        "project_name: tool\nrelease:\n  prerelease: sometimes\n",
    )
    .unwrap();
    let assert = shipyard(temp.path())
        .args(["check", "-f", "bad.yml"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("release.prerelease"), "stderr:\n{stderr}");
}

#[test]
fn snapshot_release_outside_repository_succeeds() {
    if !Git::available() {
        return;
    }
    let temp = tempdir().unwrap();
    let metrics = temp.path().join("out").join("metrics.json");
    shipyard(temp.path())
        .args(["release", "--snapshot", "--metrics-json"])
        .arg(&metrics)
        .assert()
        .success();

    let snapshot: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&metrics).unwrap()).unwrap();
    assert_eq!(snapshot["failed"], 0);
    assert_eq!(snapshot["succeeded"], 2);
    assert_eq!(snapshot["skipped"], 3);
}

#[test]
fn release_outside_repository_fails() {
    if !Git::available() {
        return;
    }
    let temp = tempdir().unwrap();
    let assert = shipyard(temp.path())
        .env("GITHUB_TOKEN", "test-token")
        .arg("release")
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("not a git repository"), "stderr:\n{stderr}");
}

#[test]
fn release_without_token_fails() {
    let temp = tempdir().unwrap();
    let assert = shipyard(temp.path()).arg("release").assert().failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("missing GITHUB_TOKEN"), "stderr:\n{stderr}");
}

#[test]
fn metrics_failure_does_not_hide_release_error() {
    let temp = tempdir().unwrap();
    let blocker = temp.path().join("blocker");
    fs::write(&blocker, "not a directory").unwrap();

    let assert = shipyard(temp.path())
        .args(["release", "--metrics-json"])
        .arg(blocker.join("metrics.json"))
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&assert.get_output().stderr).to_string();
    assert!(stderr.contains("missing GITHUB_TOKEN"), "stderr:\n{stderr}");
    assert!(stderr.contains("env.Run"), "stderr:\n{stderr}");
    assert!(stderr.contains("Failed to create metrics directory"), "stderr:\n{stderr}");
}
