//! Shared harness: a `Brain` over a temp data dir, an in-memory vector
//! index and whatever LLM / VCS the test scripts.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use hearth_core::{HearthConfig, LimbicDelta};
use hearth_limbic::{LimbicDynamics, LimbicStore, LimbicSystem};
use hearth_memory::{HashingEmbedder, MemoryStore, SqliteVectorIndex};
use hearth_os::{GitCli, VersionControl};
use hearth_reasoning::llm::{CompletionParams, LlmClient};
use hearth_reasoning::Brain;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Scripted LLM
// ============================================================================

/// Answers candidate requests with `divergent` and everything else with
/// `synthesis`. `None` means fail that call.
pub struct ScriptedLlm {
    pub divergent: Option<String>,
    pub synthesis: Option<String>,
    pub delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedLlm {
    pub fn new(divergent: Option<&str>, synthesis: Option<&str>) -> Self {
        Self {
            divergent: divergent.map(str::to_string),
            synthesis: synthesis.map(str::to_string),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, system: &str, _prompt: &str, _params: CompletionParams) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let answer = if system.contains("JSON array") {
            &self.divergent
        } else {
            &self.synthesis
        };
        match answer {
            Some(text) => Ok(text.clone()),
            None => bail!("scripted failure"),
        }
    }
}

// ============================================================================
// Fake VCS
// ============================================================================

/// Every path is inside `/repo`, which is always dirty.
#[derive(Default)]
pub struct FakeVcs {
    pub fail_snapshot: bool,
    pub fail_restore: bool,
    pub snapshots: Mutex<Vec<String>>,
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn repo_root(&self, _path: &Path) -> Result<Option<PathBuf>> {
        Ok(Some(PathBuf::from("/repo")))
    }
    async fn is_clean(&self, _repo: &Path) -> Result<bool> {
        Ok(false)
    }
    async fn snapshot(&self, _repo: &Path, message: &str) -> Result<String> {
        if self.fail_snapshot {
            bail!("index.lock exists");
        }
        let mut snapshots = self.snapshots.lock().unwrap();
        snapshots.push(message.to_string());
        Ok(format!("snap{}", snapshots.len()))
    }
    async fn restore(&self, _repo: &Path, commit_ref: &str, _message: &str) -> Result<String> {
        if self.fail_restore {
            bail!("pathspec did not match");
        }
        Ok(format!("restore-to-{commit_ref}"))
    }
    async fn head(&self, _repo: &Path) -> Result<String> {
        Ok("head".into())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub brain: Brain,
    pub config: HearthConfig,
    pub dir: TempDir,
}

impl Harness {
    pub fn workspace(&self) -> PathBuf {
        self.config.safety.workspace_root.clone()
    }
}

pub fn test_config(dir: &Path) -> HearthConfig {
    let mut config = HearthConfig::default();
    config.data_dir = dir.join("data");
    config.safety.workspace_root = dir.join("workspace");
    config.safety.write_whitelist = vec![PathBuf::from("notes")];
    config.safety.sandbox_dir = PathBuf::from("sandbox");
    config.safety.shell_timeout_secs = 5;
    config.pipeline.turn_deadline_ms = 2_000;
    config
}

pub async fn harness_with(llm: Arc<dyn LlmClient>, vcs: Arc<dyn VersionControl>) -> Harness {
    harness_configured(llm, vcs, |_| {}).await
}

pub async fn harness_configured(
    llm: Arc<dyn LlmClient>,
    vcs: Arc<dyn VersionControl>,
    configure: impl FnOnce(&mut HearthConfig),
) -> Harness {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(dir.path());
    configure(&mut config);
    std::fs::create_dir_all(config.safety.workspace_root.join("sandbox")).unwrap();
    std::fs::create_dir_all(config.safety.workspace_root.join("notes")).unwrap();

    let limbic = Arc::new(LimbicSystem::open(LimbicStore::new(config.state_path()), LimbicDynamics::default()).await);
    let index = SqliteVectorIndex::in_memory("memories").await.unwrap();
    let memory = MemoryStore::new(Arc::new(HashingEmbedder::new(64)), Arc::new(index));
    let brain = Brain::assemble(&config, limbic, memory, llm, vcs);
    Harness { brain, config, dir }
}

pub async fn harness(llm: Arc<dyn LlmClient>) -> Harness {
    harness_with(llm, Arc::new(GitCli::new())).await
}

/// Raise trust from the 0.5 default to `target` with one update.
pub async fn set_trust(brain: &Brain, target: f32) {
    let current = brain.limbic_state().await.trust;
    let delta = (target - current) / (1.0 - current);
    brain
        .update_limbic(LimbicDelta {
            trust: delta,
            ..Default::default()
        })
        .await;
    let reached = brain.limbic_state().await.trust;
    assert!((reached - target).abs() < 1e-4, "trust {reached} != {target}");
}
