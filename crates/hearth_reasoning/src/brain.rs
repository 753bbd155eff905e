//! The `Brain`: one context object owning every component of the core.
//!
//! Hosts build it once (from config, or piece by piece in tests) and then
//! drive it through turns, tool calls and direct state operations.

use crate::convergent::ConvergentSelector;
use crate::llm::{create_client, CompletionParams, LlmClient};
use crate::perception::DeepAnalyzer;
use crate::proactive::{Notifier, ProactiveEvaluator};
use crate::tools::{ToolResult, ToolRunner};
use crate::trace::{PipelineTrace, TraceStore};
use anyhow::{Context, Result};
use hearth_core::config::PipelineConfig;
use hearth_core::{
    ActionType, Capability, CapabilitySet, HearthConfig, HearthResult, LimbicDelta, LimbicState,
    PermissionDecision, PermissionMatrix, TrustTier,
};
use hearth_limbic::{DecayConfig, LimbicDynamics, LimbicStore, LimbicSystem};
use hearth_memory::{MemoryMetadata, MemoryStore, ScoredMemory};
use hearth_os::{
    AuditTrail, GitCli, LocalExecutor, SafetyNet, SafetySnapshot, ToolAuditEntry, VersionControl,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;

pub struct Brain {
    pub(crate) pipeline: PipelineConfig,
    pub(crate) retrieval_limit: usize,
    pub(crate) params: CompletionParams,
    pub(crate) limbic: Arc<LimbicSystem>,
    pub(crate) memory: MemoryStore,
    pub(crate) llm: Arc<dyn LlmClient>,
    pub(crate) deep: Option<Arc<dyn DeepAnalyzer>>,
    pub(crate) notifier: Option<Arc<dyn Notifier>>,
    pub(crate) capabilities: CapabilitySet,
    pub(crate) selector: ConvergentSelector,
    pub(crate) proactive: ProactiveEvaluator,
    pub(crate) tools: ToolRunner,
    pub(crate) safety_net: Arc<SafetyNet>,
    pub(crate) traces: TraceStore,
    pub(crate) background: Mutex<JoinSet<()>>,
}

impl Brain {
    /// Assemble every component from `config`: state file, memory database,
    /// configured LLM provider, git safety net and local shell.
    pub async fn open(config: &HearthConfig) -> Result<Self> {
        let dynamics = LimbicDynamics::new(DecayConfig::from(&config.limbic));
        let limbic = Arc::new(LimbicSystem::open(LimbicStore::new(config.state_path()), dynamics).await);
        let memory = MemoryStore::open(config.memory_db_path(), &config.memory)
            .await
            .context("Failed to open memory store")?;
        let llm = create_client(&config.llm)?;
        Ok(Self::assemble(config, limbic, memory, llm, Arc::new(GitCli::new())))
    }

    /// Wire the given collaborators together using `config` for everything else.
    pub fn assemble(
        config: &HearthConfig,
        limbic: Arc<LimbicSystem>,
        memory: MemoryStore,
        llm: Arc<dyn LlmClient>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        let safety_net = Arc::new(SafetyNet::new(
            vcs.clone(),
            config.snapshot_history_path(),
            config.safety.snapshot_marker.clone(),
        ));
        let executor = Arc::new(LocalExecutor::new(Duration::from_secs(config.safety.shell_timeout_secs)));
        let tools = ToolRunner::new(
            PermissionMatrix::new(&config.safety),
            safety_net.clone(),
            AuditTrail::new(config.audit_log_path()),
            executor,
            vcs,
        );
        Self {
            pipeline: config.pipeline.clone(),
            retrieval_limit: config.memory.retrieval_limit,
            params: CompletionParams::from(&config.llm),
            limbic,
            memory,
            llm,
            deep: None,
            notifier: None,
            capabilities: CapabilitySet::new(),
            selector: ConvergentSelector::with_defaults(config.pipeline.synthesis_margin),
            proactive: ProactiveEvaluator::default(),
            tools,
            safety_net,
            traces: TraceStore::new(config.trace_log_path()),
            background: Mutex::new(JoinSet::new()),
        }
    }

    /// Enable deep perception through `analyzer`.
    pub fn with_deep_analyzer(mut self, analyzer: Arc<dyn DeepAnalyzer>) -> Self {
        self.deep = Some(analyzer);
        self.capabilities.insert(Capability::DeepPerception);
        self
    }

    /// Enable proactive check-ins delivered through `notifier`.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self.capabilities.insert(Capability::ProactiveNotifications);
        self
    }

    pub fn with_capability(mut self, capability: Capability) -> Self {
        self.capabilities.insert(capability);
        self
    }

    pub fn with_selector(mut self, selector: ConvergentSelector) -> Self {
        self.selector = selector;
        self
    }

    // --- Limbic ---

    pub fn limbic(&self) -> &Arc<LimbicSystem> {
        &self.limbic
    }

    pub async fn limbic_state(&self) -> LimbicState {
        self.limbic.snapshot().await
    }

    pub async fn update_limbic(&self, delta: LimbicDelta) -> LimbicState {
        self.limbic.update(delta).await
    }

    pub async fn get_tier(&self) -> TrustTier {
        self.limbic.tier().await
    }

    pub async fn set_elastic_mode(&self, enabled: bool) -> LimbicState {
        self.limbic.set_elastic_mode(enabled).await
    }

    pub fn subscribe(&self) -> watch::Receiver<LimbicState> {
        self.limbic.subscribe()
    }

    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    // --- Permissions & tools ---

    /// Check `action` on `target` against the live trust value.
    pub async fn check_permission(&self, action: ActionType, target: &Path) -> HearthResult<PermissionDecision> {
        let trust = self.limbic.trust().await;
        self.tools.matrix().check(trust, action, target)
    }

    /// Like [`check_permission`](Self::check_permission) with an action name.
    pub async fn check_permission_raw(&self, action: &str, target: &str) -> HearthResult<PermissionDecision> {
        let trust = self.limbic.trust().await;
        self.tools.matrix().check_raw(trust, action, target)
    }

    pub async fn execute_tool(&self, name: &str, args: serde_json::Value) -> ToolResult {
        self.tools.execute(&self.limbic, name, args).await
    }

    /// Undo `commit_ref` in `repo` with a compensating commit. Gated and
    /// audited like any other commit.
    pub async fn rollback(&self, repo: &Path, commit_ref: &str) -> ToolResult {
        let args = json!({ "repo": repo.to_string_lossy(), "commit_ref": commit_ref });
        self.tools.execute(&self.limbic, "rollback", args).await
    }

    pub async fn snapshots(&self) -> Result<Vec<SafetySnapshot>> {
        self.safety_net.list_snapshots().await
    }

    pub async fn audit_entries(&self) -> Result<Vec<ToolAuditEntry>> {
        self.tools.audit().entries().await
    }

    // --- Memory ---

    pub async fn retrieve(&self, query: &str, limit: usize) -> Vec<ScoredMemory> {
        self.memory.retrieve(query, limit).await
    }

    pub async fn add_memory(&self, text: &str, metadata: MemoryMetadata) -> Option<String> {
        self.memory.add(text, metadata).await
    }

    /// Irreversibly clear every stored memory.
    pub async fn wipe_memory(&self) -> HearthResult<()> {
        tracing::warn!("Wiping all memories");
        self.memory.wipe().await
    }

    // --- Traces & background ---

    pub async fn recent_traces(&self, n: usize) -> Result<Vec<PipelineTrace>> {
        self.traces.recent(n).await
    }

    /// Wait for every scheduled background effect to finish.
    pub async fn drain_background(&self) {
        let mut set = self.background.lock().await;
        while let Some(res) = set.join_next().await {
            if let Err(e) = res {
                tracing::error!("Background task failed: {e}");
            }
        }
    }
}
