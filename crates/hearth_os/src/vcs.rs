//! Version-control collaborator used by the safety net.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Root of the repository enclosing `path`, or `None` outside any repo.
    async fn repo_root(&self, path: &Path) -> Result<Option<PathBuf>>;
    async fn is_clean(&self, repo: &Path) -> Result<bool>;
    /// Commit every change in the working tree (an empty commit when there
    /// is nothing to add); returns the new commit id.
    async fn snapshot(&self, repo: &Path, message: &str) -> Result<String>;
    /// Make the tree match `commit_ref` again and record that as a new
    /// commit with `message`; returns the new HEAD. Uncommitted changes are
    /// discarded, so callers snapshot them first.
    async fn restore(&self, repo: &Path, commit_ref: &str, message: &str) -> Result<String>;
    async fn head(&self, repo: &Path) -> Result<String>;
}

/// Identity used when the repository has none configured.
const FALLBACK_NAME: &str = "hearth";
const FALLBACK_EMAIL: &str = "hearth@localhost";

/// The `git` binary on PATH.
#[derive(Debug, Default, Clone)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    /// Whether a usable `git` binary exists.
    pub async fn available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    async fn run(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .arg("-C")
            .arg(repo)
            .args(args)
            .output()
            .await
            .context("Failed to run git")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("git {} failed: {}", args.join(" "), stderr.trim());
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// `-c user.*` overrides when the repo has no committer identity.
    async fn identity_args(&self, repo: &Path) -> Vec<String> {
        match self.run(repo, &["config", "user.email"]).await {
            Ok(email) if !email.is_empty() => Vec::new(),
            _ => vec![
                "-c".to_string(),
                format!("user.name={FALLBACK_NAME}"),
                "-c".to_string(),
                format!("user.email={FALLBACK_EMAIL}"),
            ],
        }
    }

    async fn run_with_identity(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let identity = self.identity_args(repo).await;
        let mut full: Vec<&str> = identity.iter().map(String::as_str).collect();
        full.extend_from_slice(args);
        self.run(repo, &full).await
    }
}

/// Deepest existing directory at or above `path`.
fn existing_dir(path: &Path) -> Option<PathBuf> {
    let mut cur = Some(path);
    while let Some(p) = cur {
        if p.is_dir() {
            return Some(p.to_path_buf());
        }
        cur = p.parent();
    }
    None
}

pub(crate) fn validate_ref(commit_ref: &str) -> Result<()> {
    if commit_ref.is_empty()
        || commit_ref.starts_with('-')
        || commit_ref.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        bail!("invalid commit reference: {commit_ref:?}");
    }
    Ok(())
}

#[async_trait]
impl VersionControl for GitCli {
    async fn repo_root(&self, path: &Path) -> Result<Option<PathBuf>> {
        let Some(dir) = existing_dir(path) else {
            return Ok(None);
        };
        let output = Command::new("git")
            .arg("-C")
            .arg(&dir)
            .args(["rev-parse", "--show-toplevel"])
            .output()
            .await
            .context("Failed to run git")?;
        if !output.status.success() {
            return Ok(None);
        }
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!root.is_empty()).then(|| PathBuf::from(root)))
    }

    async fn is_clean(&self, repo: &Path) -> Result<bool> {
        Ok(self.run(repo, &["status", "--porcelain"]).await?.is_empty())
    }

    async fn snapshot(&self, repo: &Path, message: &str) -> Result<String> {
        self.run(repo, &["add", "-A"]).await?;
        self.run_with_identity(repo, &["commit", "--no-verify", "--allow-empty", "-m", message])
            .await?;
        self.head(repo).await
    }

    async fn restore(&self, repo: &Path, commit_ref: &str, message: &str) -> Result<String> {
        validate_ref(commit_ref)?;
        let spec = format!("{commit_ref}^{{commit}}");
        let target = self
            .run(repo, &["rev-parse", "--verify", "--quiet", spec.as_str()])
            .await
            .with_context(|| format!("unknown commit {commit_ref}"))?;
        let source = format!("--source={target}");

        self.run(repo, &["add", "-A"]).await?;
        self.run(repo, &["restore", source.as_str(), "--staged", "--worktree", "--", "."])
            .await?;
        if let Err(e) = self
            .run_with_identity(repo, &["commit", "--no-verify", "--allow-empty", "-m", message])
            .await
        {
            if let Err(undo) = self
                .run(repo, &["restore", "--source=HEAD", "--staged", "--worktree", "--", "."])
                .await
            {
                tracing::warn!("Failed to put the tree back after a failed restore: {undo:#}");
            }
            return Err(e);
        }
        self.head(repo).await
    }

    async fn head(&self, repo: &Path) -> Result<String> {
        self.run(repo, &["rev-parse", "HEAD"]).await
    }
}
