//! Durable single-record store for the limbic state.

use anyhow::{Context, Result};
use chrono::Utc;
use hearth_core::{HearthError, HearthResult, LimbicState};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

/// JSON file holding exactly one [`LimbicState`].
///
/// Writes go to `<path>.tmp`, are fsynced, then renamed over the live file,
/// so a crash mid-write leaves the previous record intact.
#[derive(Debug, Clone)]
pub struct LimbicStore {
    path: PathBuf,
}

impl LimbicStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn corrupt_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".corrupt");
        PathBuf::from(name)
    }

    /// Read the record. `Ok(None)` when no record exists yet.
    pub async fn load_checked(&self) -> HearthResult<Option<LimbicState>> {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(HearthError::CorruptedState(format!(
                    "unreadable {}: {e}",
                    self.path.display()
                )))
            }
        };
        let mut state: LimbicState = serde_json::from_str(&raw)
            .map_err(|e| HearthError::CorruptedState(format!("{}: {e}", self.path.display())))?;
        state.normalize();
        Ok(Some(state))
    }

    /// Read the record, never failing.
    ///
    /// A missing record bootstraps defaults. A corrupted one is moved aside
    /// to `<path>.corrupt` for inspection and defaults are used.
    pub async fn load(&self) -> LimbicState {
        match self.load_checked().await {
            Ok(Some(state)) => {
                tracing::debug!("Loaded limbic state from {}", self.path.display());
                state
            }
            Ok(None) => {
                tracing::info!("No limbic state at {}, bootstrapping defaults", self.path.display());
                LimbicState::bootstrap(Utc::now())
            }
            Err(e) => {
                tracing::error!("{e}; falling back to defaults");
                if let Err(rename_err) = tokio::fs::rename(&self.path, self.corrupt_path()).await {
                    tracing::warn!("Could not preserve corrupted state file: {rename_err}");
                }
                LimbicState::bootstrap(Utc::now())
            }
        }
    }

    /// Atomically replace the record.
    pub async fn save(&self, state: &LimbicState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let json = serde_json::to_vec_pretty(state).context("Failed to serialize limbic state")?;
        let tmp = self.tmp_path();

        let mut file = tokio::fs::File::create(&tmp)
            .await
            .with_context(|| format!("Failed to create {}", tmp.display()))?;
        file.write_all(&json).await.context("Failed to write limbic state")?;
        file.sync_all().await.context("Failed to fsync limbic state")?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
        Ok(())
    }
}
