#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::PathBuf;
use tempfile::TempDir;

fn flowm(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("flowm").unwrap();
    cmd.current_dir(dir.path()).env("FLOWM_ROOT", dir.path());
    cmd
}

fn project_path(dir: &TempDir, rel: &str) -> PathBuf {
    dir.path().join(".flow-maestro/projects/demo").join(rel)
}

/// `init` + `projects add demo` + `changes init chg-expenses -c expenses`.
fn seed_change(dir: &TempDir) {
    flowm(dir).arg("init").assert().success();
    flowm(dir).args(["projects", "add", "demo"]).assert().success();
    flowm(dir)
        .args(["changes", "init", "chg-expenses", "-c", "expenses"])
        .assert()
        .success();
}

fn write_delta(dir: &TempDir, capability: &str, text: &str) {
    let path = project_path(dir, &format!("changes/chg-expenses/specs/{capability}/spec.md"));
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, text).unwrap();
}

fn json_stdout(cmd: &mut Command) -> serde_json::Value {
    let output = cmd.arg("--json").output().unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    serde_json::from_slice(&output.stdout).unwrap()
}

// ---------------------------------------------------------------------------
// flowm init
// ---------------------------------------------------------------------------

#[test]
fn init_creates_flow_dir_and_config() {
    let dir = TempDir::new().unwrap();
    flowm(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("created"));

    assert!(dir.path().join(".flow-maestro/state").is_dir());
    assert!(dir.path().join(".flow-maestro/projects").is_dir());
    let config = std::fs::read_to_string(dir.path().join(".flow-maestro/config.yaml")).unwrap();
    assert!(config.contains("diff_context: 3"));
}

#[test]
fn init_is_idempotent() {
    let dir = TempDir::new().unwrap();
    flowm(&dir).arg("init").assert().success();
    flowm(&dir)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("exists"));
}

#[test]
fn commands_require_init() {
    let dir = TempDir::new().unwrap();
    flowm(&dir)
        .args(["projects", "add", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

// ---------------------------------------------------------------------------
// flowm projects
// ---------------------------------------------------------------------------

#[test]
fn projects_add_list_use() {
    let dir = TempDir::new().unwrap();
    flowm(&dir).arg("init").assert().success();
    flowm(&dir)
        .args(["projects", "add", "demo", "--name", "Demo App"])
        .assert()
        .success();
    flowm(&dir).args(["projects", "add", "other"]).assert().success();
    assert!(project_path(&dir, "constitution.md").exists());

    let list = json_stdout(flowm(&dir).args(["projects", "list"]));
    let items = list.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["slug"], "demo");
    assert_eq!(items[0]["name"], "Demo App");
    assert_eq!(items[1]["active"], true);

    flowm(&dir)
        .args(["projects", "use", "demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Active project: demo"));

    flowm(&dir)
        .args(["projects", "add", "demo"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    flowm(&dir)
        .args(["projects", "use", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown project 'missing'"));
}

// ---------------------------------------------------------------------------
// flowm changes
// ---------------------------------------------------------------------------

#[test]
fn changes_init_list_show() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);

    for file in ["spec.md", "plan.md", "tasks.md", "qa.md", "timeline.jsonl"] {
        assert!(project_path(&dir, &format!("changes/chg-expenses/{file}")).exists());
    }
    let delta =
        std::fs::read_to_string(project_path(&dir, "changes/chg-expenses/specs/expenses/spec.md"))
            .unwrap();
    assert!(delta.starts_with("## ADDED Requirements\n### Requirement: Placeholder\n"));

    flowm(&dir)
        .args(["changes", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("chg-expenses"));

    let shown = json_stdout(flowm(&dir).args(["changes", "show"]));
    assert_eq!(shown["change_id"], "chg-expenses");
    assert_eq!(shown["deltas"][0]["capability"], "expenses");
    assert_eq!(shown["timeline"][0]["command"], "changes.init");
}

#[test]
fn changes_init_rejects_bad_slug() {
    let dir = TempDir::new().unwrap();
    flowm(&dir).arg("init").assert().success();
    flowm(&dir).args(["projects", "add", "demo"]).assert().success();
    flowm(&dir)
        .args(["changes", "init", "Bad_Change"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid slug"));
}

#[test]
fn changes_archive_moves_directory() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);
    flowm(&dir)
        .args(["changes", "archive", "chg-expenses"])
        .assert()
        .success()
        .stdout(predicate::str::contains("changes/archive/"));
    assert!(!project_path(&dir, "changes/chg-expenses").exists());
    flowm(&dir)
        .args(["changes", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No active changes"));
}

// ---------------------------------------------------------------------------
// flowm specs
// ---------------------------------------------------------------------------

#[test]
fn specs_validate_accepts_placeholder_delta() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);
    flowm(&dir)
        .args(["specs", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("valid"));
}

#[test]
fn specs_validate_aggregates_errors() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);
    write_delta(&dir, "alpha", "## ADDED Requirements\n### Requirement: Bare\nNo scenario.\n");
    write_delta(&dir, "beta", "## REMOVED Requirements\n### Requirement:\n");

    flowm(&dir)
        .args(["specs", "validate", "chg-expenses"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "alpha: Requirement 'Bare' missing scenario in ADDED",
        ))
        .stderr(predicate::str::contains("beta: REMOVED requirement missing title"));
}

#[test]
fn specs_prepare_writes_manifest_and_diff() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);

    let manifest = json_stdout(flowm(&dir).args(["specs", "prepare"]));
    assert_eq!(manifest["version"], 1);
    assert_eq!(manifest["stats"]["requirements"], 1);
    let cap = &manifest["capabilities"][0];
    assert_eq!(cap["would_create"], true);
    assert_eq!(cap["requirements"][0]["requirement_id"], "expenses.placeholder");
    assert_eq!(cap["requirements"][0]["operation"], "ADDED");

    assert!(project_path(&dir, "changes/chg-expenses/specs_manifest.json").exists());
    let diff = std::fs::read_to_string(project_path(
        &dir,
        "changes/chg-expenses/specs/expenses/merge.diff",
    ))
    .unwrap();
    assert!(diff.starts_with("--- a/.flow-maestro/projects/demo/specs/expenses/spec.md\n"));
    assert!(diff.contains("+### Requirement: Placeholder"));
    // Preview leaves canonical specs alone.
    assert!(!project_path(&dir, "specs/expenses/spec.md").exists());
}

#[test]
fn specs_prepare_no_diff() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);
    let manifest = json_stdout(flowm(&dir).args(["specs", "prepare", "--no-diff"]));
    assert!(manifest["capabilities"][0]["diff_path"].is_null());
    assert!(!project_path(&dir, "changes/chg-expenses/specs/expenses/merge.diff").exists());
}

#[test]
fn specs_merge_dry_run_writes_nothing() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);

    let out = json_stdout(flowm(&dir).args(["specs", "merge", "--dry-run"]));
    assert_eq!(out["report"]["dry_run"], true);
    assert_eq!(out["report"]["finalized"], false);

    assert!(!project_path(&dir, "specs/expenses/spec.md").exists());
    assert!(!project_path(&dir, "state/spec_index.json").exists());
    assert!(!project_path(&dir, "changes/chg-expenses/specs_manifest.json").exists());
    assert!(!project_path(&dir, "changes/chg-expenses/specs_merge_report.json").exists());
    assert!(project_path(&dir, "changes/chg-expenses").is_dir());
}

#[test]
fn specs_merge_writes_canonical_and_index() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);

    flowm(&dir)
        .args(["specs", "merge", "--no-archive"])
        .assert()
        .success()
        .stdout(predicate::str::contains("create"));

    let canonical = std::fs::read_to_string(project_path(&dir, "specs/expenses/spec.md")).unwrap();
    assert!(canonical.starts_with("# Expenses Specification\n\n## Requirements\n\n"));
    assert!(canonical.contains("### Requirement: Placeholder"));

    let index: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(project_path(&dir, "state/spec_index.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(index["expenses.placeholder"]["capability"], "expenses");
    assert_eq!(index["expenses.placeholder"]["change_id"], "chg-expenses");

    let report = std::fs::read_to_string(project_path(
        &dir,
        "changes/chg-expenses/specs_merge_report.json",
    ))
    .unwrap();
    assert!(report.contains("\"finalized\": false"));
    let timeline =
        std::fs::read_to_string(project_path(&dir, "changes/chg-expenses/timeline.jsonl")).unwrap();
    assert!(timeline.contains("specs.merge"));
}

#[test]
fn specs_merge_archives_by_default() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);
    flowm(&dir)
        .args(["specs", "merge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("archived change 'chg-expenses'"));
    assert!(!project_path(&dir, "changes/chg-expenses").exists());
    assert!(project_path(&dir, "specs/expenses/spec.md").exists());
}

#[test]
fn specs_merge_missing_target_fails_without_writes() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);
    write_delta(
        &dir,
        "expenses",
        "## MODIFIED Requirements\n### Requirement: Ghost\n#### Scenario: s\n- x\n",
    );
    flowm(&dir)
        .args(["specs", "merge"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expenses: Requirement 'Ghost' not found"));
    assert!(!project_path(&dir, "specs/expenses/spec.md").exists());
    assert!(project_path(&dir, "changes/chg-expenses").is_dir());
}

// ---------------------------------------------------------------------------
// flowm config
// ---------------------------------------------------------------------------

#[test]
fn config_show_and_validate() {
    let dir = TempDir::new().unwrap();
    flowm(&dir).arg("init").assert().success();

    let config = json_stdout(flowm(&dir).args(["config", "show"]));
    assert_eq!(config["specs"]["archive_on_merge"], true);

    flowm(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));

    std::fs::write(
        dir.path().join(".flow-maestro/config.yaml"),
        "version: 9\nspecs:\n  diff_context: 0\n",
    )
    .unwrap();
    flowm(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[warning] specs.diff_context is 0"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn change_ids_outside_the_project_are_rejected() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);
    for id in ["../../other/changes/chg", "archive"] {
        flowm(&dir)
            .args(["changes", "show", id])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid slug"));
    }
}

// ---------------------------------------------------------------------------
// flowm quality / timeline / constitution
// ---------------------------------------------------------------------------

#[test]
fn quality_check_flags_template_markers() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);

    flowm(&dir)
        .args(["quality", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("spec: spec overview placeholder"))
        .stderr(predicate::str::contains("quality check found 2 issue(s)"));

    flowm(&dir)
        .args(["quality", "check", "-i", "tasks"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No placeholder markers detected for tasks"));

    flowm(&dir)
        .args(["quality", "check", "-i", "readme"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown quality target(s): readme"));
}

#[test]
fn timeline_log_then_show_with_limit() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);
    flowm(&dir)
        .args(["timeline", "log", "Reviewed plan", "-m", "review.plan"])
        .assert()
        .success();
    flowm(&dir)
        .args(["timeline", "log", "Signed off", "-c", "chg-expenses"])
        .assert()
        .success();

    let out = json_stdout(flowm(&dir).args(["timeline", "show", "-n", "2"]));
    let events = out["events"].as_array().unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["command"], "review.plan");
    assert_eq!(events[1]["command"], "timeline.log");
    assert_eq!(events[1]["summary"], "Signed off");

    let all = json_stdout(flowm(&dir).args(["timeline", "show"]));
    assert_eq!(all["events"][0]["command"], "changes.init");
}

#[test]
fn constitution_record_upserts_entries() {
    let dir = TempDir::new().unwrap();
    seed_change(&dir);

    flowm(&dir)
        .args([
            "projects", "constitution", "record", "Ledger", "-s", "Append only.", "-S",
            "chg-expenses/spec.md:3", "-v", "2026-01-02",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Appended 'Ledger'"));

    let out = json_stdout(flowm(&dir).args([
        "projects", "constitution", "record", "ledger", "-s", "Never rewritten.", "-S", "x:1",
    ]));
    assert_eq!(out["replaced"], true);

    let text = std::fs::read_to_string(project_path(&dir, "constitution.md")).unwrap();
    assert_eq!(text.matches("- Title: ").count(), 1);
    assert!(text.contains("## Core Architecture\n\n- Title: ledger\n  - Summary: Never rewritten.\n"));

    flowm(&dir)
        .args([
            "projects", "constitution", "record", "Rates", "-s", "FX drift.", "-S", "x:1", "-c",
            "watchlist",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("non-empty owner"));
}
