use crate::Executor;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;

pub struct LocalExecutor {
    timeout: Duration,
}

impl Default for LocalExecutor {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl LocalExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Executor for LocalExecutor {
    async fn execute(&self, command: &str, cwd: &Path) -> Result<String> {
        // sh -c for pipes and redirects
        let exec_future = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(cwd)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, exec_future).await {
            Ok(res) => res.context("Failed to execute command locally")?,
            Err(_) => anyhow::bail!(
                "Command execution timed out after {} ms",
                self.timeout.as_millis()
            ),
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            anyhow::bail!(
                "Command failed with status {}:\nStderr: {}",
                output.status,
                stderr
            );
        } else if !stderr.is_empty() {
            tracing::debug!("Command stderr (success): {}", stderr);
        }

        Ok(stdout.to_string())
    }

    fn name(&self) -> &str {
        "LocalExecutor"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_runs_in_working_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "x").unwrap();
        let out = LocalExecutor::default().execute("ls", dir.path()).await.unwrap();
        assert!(out.contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_failure_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let err = LocalExecutor::default()
            .execute("echo boom >&2; exit 3", dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_timeout() {
        let dir = TempDir::new().unwrap();
        let exec = LocalExecutor::new(Duration::from_millis(100));
        let err = exec.execute("sleep 5", dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
