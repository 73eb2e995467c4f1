//! End-to-end CLI tests against a throwaway config dir.

use assert_cmd::Command;
use predicates::prelude::*;

fn emdx(config_dir: &std::path::Path) -> Command {
    let mut cmd = Command::cargo_bin("emdx").unwrap();
    cmd.env("EMDX_CONFIG_DIR", config_dir);
    cmd.env_remove("EMDX_VCS_TOKEN");
    cmd
}

#[test]
fn save_then_find() {
    let dir = tempfile::tempdir().unwrap();

    emdx(dir.path())
        .args([
            "save",
            "Async Patterns",
            "--content",
            "async programming guide for workers",
            "--tags",
            "gameplan",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Async Patterns"));

    emdx(dir.path())
        .args(["find", "async"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Async Patterns"));

    // A tag filter that matches nothing empties the result set.
    emdx(dir.path())
        .args(["find", "async", "--tags", "missing"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No matches"));
}

#[test]
fn empty_title_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    emdx(dir.path())
        .args(["save", "   ", "--content", "content long enough"])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn short_content_exits_2() {
    let dir = tempfile::tempdir().unwrap();
    emdx(dir.path())
        .args(["save", "Title", "--content", ""])
        .assert()
        .failure()
        .code(2);
}

#[test]
fn trash_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let output = emdx(dir.path())
        .args([
            "--json",
            "save",
            "Disposable",
            "--content",
            "about to be trashed",
        ])
        .output()
        .unwrap();
    let saved: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let id = saved["id"].as_i64().unwrap().to_string();

    emdx(dir.path()).args(["delete", &id]).assert().success();

    emdx(dir.path())
        .args(["find", "*"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Disposable").not());

    emdx(dir.path())
        .args(["list", "--include-deleted"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Disposable"));

    emdx(dir.path()).args(["restore", &id]).assert().success();
    emdx(dir.path())
        .args(["find", "trashed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Disposable"));

    emdx(dir.path()).args(["delete", &id]).assert().success();
    emdx(dir.path()).args(["purge", &id]).assert().success();
    emdx(dir.path())
        .args(["view", &id])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn include_archived_toggle_changes_results() {
    let dir = tempfile::tempdir().unwrap();
    emdx(dir.path())
        .args(["save", "Keeper", "--content", "stays in listings"])
        .assert()
        .success();
    emdx(dir.path())
        .args(["save", "Shelved", "--content", "moves to the archive"])
        .assert()
        .success();
    emdx(dir.path()).args(["archive", "Shelved"]).assert().success();

    emdx(dir.path())
        .args(["find", "*"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Shelved").not());

    emdx(dir.path())
        .args(["find", "*", "--include-archived"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Shelved"));
}

#[test]
fn task_readiness_flow() {
    let dir = tempfile::tempdir().unwrap();
    for title in ["T1", "T2", "T3"] {
        emdx(dir.path())
            .args(["task", "add", title])
            .assert()
            .success();
    }
    emdx(dir.path())
        .args(["task", "depend", "2", "1"])
        .assert()
        .success();
    emdx(dir.path())
        .args(["task", "depend", "3", "1"])
        .assert()
        .success();

    emdx(dir.path())
        .args(["task", "ready"])
        .assert()
        .success()
        .stdout(predicate::str::contains("T1"))
        .stdout(predicate::str::contains("T2").not());

    emdx(dir.path())
        .args(["task", "done", "1", "--note", "shipped"])
        .assert()
        .success();

    emdx(dir.path())
        .args(["task", "ready"])
        .assert()
        .success()
        .stdout(predicate::str::contains("T2"))
        .stdout(predicate::str::contains("T3"));

    // The transition note landed in the log.
    emdx(dir.path())
        .args(["task", "view", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("open -> done: shipped"));
}

#[test]
fn dependency_cycle_refused() {
    let dir = tempfile::tempdir().unwrap();
    for title in ["A", "B"] {
        emdx(dir.path())
            .args(["task", "add", title])
            .assert()
            .success();
    }
    emdx(dir.path())
        .args(["task", "depend", "1", "2"])
        .assert()
        .success();
    emdx(dir.path())
        .args(["task", "depend", "2", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cycle"));
}

#[test]
fn tag_rename_merges() {
    let dir = tempfile::tempdir().unwrap();
    emdx(dir.path())
        .args(["save", "One", "--content", "first tagged doc", "--tags", "a"])
        .assert()
        .success();
    emdx(dir.path())
        .args(["save", "Two", "--content", "second tagged doc", "--tags", "alpha"])
        .assert()
        .success();

    emdx(dir.path())
        .args(["tag", "rename", "a", "alpha"])
        .assert()
        .success();

    emdx(dir.path())
        .args(["tag", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha"))
        .stdout(predicate::str::is_match(r"(?m)^a\s").unwrap().not());
}

#[test]
fn maintain_migrate_reports_head() {
    let dir = tempfile::tempdir().unwrap();
    emdx(dir.path())
        .args(["--json", "maintain", "migrate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("schema_version"));
}

#[test]
fn exec_health_with_empty_db() {
    let dir = tempfile::tempdir().unwrap();
    emdx(dir.path())
        .args(["exec", "health"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No running executions"));
}

#[test]
fn semantic_find_after_embed_backfill() {
    let dir = tempfile::tempdir().unwrap();
    emdx(dir.path())
        .args([
            "save",
            "Storage Tuning",
            "--content",
            "database storage engine tuning checklist",
        ])
        .assert()
        .success();

    emdx(dir.path())
        .args(["maintain", "embed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Embedded 1"));

    emdx(dir.path())
        .args(["find", "database tuning", "--mode", "semantic"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Storage Tuning"));
}
