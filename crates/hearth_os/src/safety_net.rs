//! Safety net & rollback.
//!
//! Before a risky action touches a repository with uncommitted work, that
//! work is committed as a snapshot so the action can be undone. Rollback
//! brings the tree back to a snapshot with a compensating commit; history is
//! never rewritten, so a rollback can itself be rolled back.

use crate::jsonl;
use crate::vcs::{validate_ref, VersionControl};
use anyhow::Result;
use chrono::{DateTime, Utc};
use hearth_core::{HearthError, HearthResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetySnapshot {
    pub commit_ref: String,
    pub timestamp: DateTime<Utc>,
    pub action_id: String,
    pub repo: PathBuf,
}

/// Result of a successful rollback.
#[derive(Debug, Clone, PartialEq)]
pub struct RollbackOutcome {
    /// The compensating commit.
    pub head: String,
    /// Snapshot of the work that was uncommitted when the rollback ran.
    pub checkpoint: Option<SafetySnapshot>,
}

pub struct SafetyNet {
    vcs: Arc<dyn VersionControl>,
    history_path: PathBuf,
    marker: String,
}

impl SafetyNet {
    pub fn new(
        vcs: Arc<dyn VersionControl>,
        history_path: impl Into<PathBuf>,
        marker: impl Into<String>,
    ) -> Self {
        Self {
            vcs,
            history_path: history_path.into(),
            marker: marker.into(),
        }
    }

    /// Snapshot the repository enclosing `target` if it has uncommitted
    /// changes.
    ///
    /// `Ok(None)` when the tree is clean or `target` is outside any
    /// repository. An `Err` means the action must not proceed.
    pub async fn prepare(&self, action_id: &str, target: &Path) -> HearthResult<Option<SafetySnapshot>> {
        let repo = match self.vcs.repo_root(target).await {
            Ok(Some(repo)) => repo,
            Ok(None) => {
                tracing::warn!(
                    action_id,
                    "No repository encloses {}; proceeding without snapshot",
                    target.display()
                );
                return Ok(None);
            }
            Err(e) => return Err(HearthError::dependency("version control", format!("{e:#}"))),
        };

        let clean = self
            .vcs
            .is_clean(&repo)
            .await
            .map_err(|e| HearthError::dependency("version control", format!("{e:#}")))?;
        if clean {
            tracing::debug!(action_id, "Working tree clean at {}; no snapshot needed", repo.display());
            return Ok(None);
        }

        let timestamp = Utc::now();
        let message = format!("{} {} action={}", self.marker, timestamp.to_rfc3339(), action_id);
        let commit_ref = self
            .vcs
            .snapshot(&repo, &message)
            .await
            .map_err(|e| HearthError::dependency("version control", format!("snapshot failed: {e:#}")))?;

        let snapshot = SafetySnapshot {
            commit_ref,
            timestamp,
            action_id: action_id.to_string(),
            repo,
        };
        tracing::info!(
            action_id,
            commit = %snapshot.commit_ref,
            "Safety snapshot taken in {}",
            snapshot.repo.display()
        );
        // The commit exists either way; a lost history line only costs the listing
        if let Err(e) = jsonl::append(&self.history_path, &snapshot).await {
            tracing::error!("Failed to record snapshot history: {e:#}");
        }
        Ok(Some(snapshot))
    }

    /// Bring the tree of `repo` back to `commit_ref` with a compensating
    /// commit.
    ///
    /// Uncommitted work present at rollback time is snapshotted first (as
    /// `action_id`), so the state being undone stays reachable.
    pub async fn rollback(
        &self,
        action_id: &str,
        repo: &Path,
        commit_ref: &str,
    ) -> HearthResult<RollbackOutcome> {
        validate_ref(commit_ref).map_err(|e| HearthError::Validation(e.to_string()))?;
        let checkpoint = self.prepare(action_id, repo).await?;

        let message = format!("Roll back to {commit_ref} action={action_id}");
        let head = self
            .vcs
            .restore(repo, commit_ref, &message)
            .await
            .map_err(|e| HearthError::ToolExecution {
                message: format!("rollback to {commit_ref} failed: {e:#}"),
                snapshot_ref: checkpoint.as_ref().map(|s| s.commit_ref.clone()),
            })?;
        tracing::info!(action_id, commit = commit_ref, head = %head, "Rolled back in {}", repo.display());
        Ok(RollbackOutcome { head, checkpoint })
    }

    /// Every recorded snapshot, oldest first.
    pub async fn list_snapshots(&self) -> Result<Vec<SafetySnapshot>> {
        jsonl::read_all(&self.history_path).await
    }
}
