//! Safety net against a real git repository in a temp dir.
//!
//! Skipped (with a note on stderr) when no `git` binary is available.

use hearth_os::{GitCli, SafetyNet, VersionControl};
use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

fn git(repo: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
        .args(args)
        .output()
        .unwrap();
    assert!(out.status.success(), "git {:?}: {}", args, String::from_utf8_lossy(&out.stderr));
    String::from_utf8_lossy(&out.stdout).trim().to_string()
}

fn commit_count(repo: &Path) -> usize {
    git(repo, &["rev-list", "--count", "HEAD"]).parse().unwrap()
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "-q"]);
    std::fs::write(dir.path().join("notes.md"), "v1\n").unwrap();
    git(dir.path(), &["add", "-A"]);
    git(dir.path(), &["commit", "-q", "-m", "initial"]);
    dir
}

#[tokio::test]
async fn scenario_b_dirty_tree_gets_exactly_one_snapshot() {
    if !GitCli::available().await {
        eprintln!("git not available; skipping");
        return;
    }
    let repo = init_repo();
    let state = TempDir::new().unwrap();
    let net = SafetyNet::new(
        Arc::new(GitCli::new()),
        state.path().join("snapshots").join("history.jsonl"),
        "[hearth-safety-net]",
    );

    std::fs::write(repo.path().join("notes.md"), "v2 uncommitted\n").unwrap();
    let before = commit_count(repo.path());

    let snap = net
        .prepare("act-42", &repo.path().join("notes.md"))
        .await
        .unwrap()
        .expect("dirty tree must be snapshotted");

    assert_eq!(commit_count(repo.path()), before + 1);
    assert_eq!(git(repo.path(), &["rev-parse", "HEAD"]), snap.commit_ref);
    let subject = git(repo.path(), &["log", "-1", "--format=%s"]);
    assert!(subject.starts_with("[hearth-safety-net] "));
    assert!(subject.ends_with("action=act-42"));

    // Now clean: a second action takes no further snapshot
    assert!(net
        .prepare("act-43", &repo.path().join("notes.md"))
        .await
        .unwrap()
        .is_none());
    assert_eq!(commit_count(repo.path()), before + 1);

    let history = net.list_snapshots().await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action_id, "act-42");
}

#[tokio::test]
async fn rollback_restores_snapshot_and_keeps_undone_work() {
    if !GitCli::available().await {
        eprintln!("git not available; skipping");
        return;
    }
    let repo = init_repo();
    let state = TempDir::new().unwrap();
    let net = SafetyNet::new(
        Arc::new(GitCli::new()),
        state.path().join("history.jsonl"),
        "[hearth-safety-net]",
    );
    let notes = repo.path().join("notes.md");

    // User work, snapshotted before the action
    std::fs::write(&notes, "v2 user work\n").unwrap();
    let snap = net.prepare("act-1", &notes).await.unwrap().unwrap();
    // The action itself, left uncommitted, plus a file it created
    std::fs::write(&notes, "v3 action\n").unwrap();
    std::fs::write(repo.path().join("extra.md"), "new\n").unwrap();

    let outcome = net.rollback("act-2", &snap.repo, &snap.commit_ref).await.unwrap();

    assert_eq!(std::fs::read_to_string(&notes).unwrap(), "v2 user work\n");
    assert!(!repo.path().join("extra.md").exists());
    assert_eq!(git(repo.path(), &["status", "--porcelain"]), "");
    assert_eq!(git(repo.path(), &["rev-parse", "HEAD"]), outcome.head);

    // The undone state was checkpointed and is still in history
    let checkpoint = outcome.checkpoint.expect("uncommitted action must be checkpointed");
    assert_eq!(
        git(repo.path(), &["show", format!("{}:notes.md", checkpoint.commit_ref).as_str()]),
        "v3 action"
    );
    // snapshot, checkpoint, compensating commit on top of the initial one
    assert_eq!(commit_count(repo.path()), 4);

    // A rollback can be rolled back
    net.rollback("act-3", &snap.repo, &checkpoint.commit_ref).await.unwrap();
    assert_eq!(std::fs::read_to_string(&notes).unwrap(), "v3 action\n");
}

#[tokio::test]
async fn rollback_to_unknown_commit_fails_cleanly() {
    if !GitCli::available().await {
        eprintln!("git not available; skipping");
        return;
    }
    let repo = init_repo();
    let state = TempDir::new().unwrap();
    let net = SafetyNet::new(Arc::new(GitCli::new()), state.path().join("h.jsonl"), "[m]");
    let before = commit_count(repo.path());

    let err = net.rollback("a", repo.path(), "deadbeef").await.unwrap_err();
    assert!(matches!(err, hearth_core::HearthError::ToolExecution { .. }), "{err}");
    assert_eq!(commit_count(repo.path()), before);
    assert_eq!(std::fs::read_to_string(repo.path().join("notes.md")).unwrap(), "v1\n");
}

#[tokio::test]
async fn new_file_target_resolves_enclosing_repo() {
    if !GitCli::available().await {
        eprintln!("git not available; skipping");
        return;
    }
    let repo = init_repo();
    let root = GitCli::new()
        .repo_root(&repo.path().join("drafts").join("new.md"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        std::fs::canonicalize(root).unwrap(),
        std::fs::canonicalize(repo.path()).unwrap()
    );

    let outside = TempDir::new().unwrap();
    // Temp dirs are not normally inside a repository
    if GitCli::new().repo_root(outside.path()).await.unwrap().is_none() {
        let net = SafetyNet::new(Arc::new(GitCli::new()), outside.path().join("h.jsonl"), "[m]");
        assert!(net.prepare("x", outside.path()).await.unwrap().is_none());
    }
}
