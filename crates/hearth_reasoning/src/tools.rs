//! Tool execution behind the permission matrix.
//!
//! Every call runs under one lock: parse, permission check against live
//! trust, safety snapshot when required, the effect itself, then an audit
//! line. Outcomes are always a [`ToolResult`]; nothing here raises.

use chrono::Utc;
use hearth_core::{ActionType, HearthError, HearthResult, PermissionMatrix, TrustTier};
use hearth_limbic::LimbicSystem;
use hearth_os::{AuditTrail, Executor, SafetyNet, ToolAuditEntry, ToolStatus, VersionControl};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Audit detail excerpt length.
const DETAIL_CHARS: usize = 240;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub action_id: String,
    pub tool: String,
    pub status: ToolStatus,
    /// Tool output on success, otherwise the reason.
    pub output: String,
    pub tier: TrustTier,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_ref: Option<String>,
}

impl ToolResult {
    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }
}

/// A parsed tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolCall {
    ReadFile { path: PathBuf },
    WriteFile { path: PathBuf, content: String },
    Commit { repo: PathBuf, message: String },
    Shell { command: String, cwd: Option<PathBuf> },
    Rollback { repo: PathBuf, commit_ref: String },
}

fn str_arg<'a>(args: &'a Value, key: &str) -> HearthResult<&'a str> {
    args.get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| HearthError::Validation(format!("missing string argument \"{key}\"")))
}

fn non_empty<'a>(args: &'a Value, key: &str) -> HearthResult<&'a str> {
    let v = str_arg(args, key)?;
    if v.trim().is_empty() {
        return Err(HearthError::Validation(format!("argument \"{key}\" is empty")));
    }
    Ok(v)
}

impl ToolCall {
    pub fn parse(name: &str, args: &Value) -> HearthResult<Self> {
        match name {
            "read_file" => Ok(Self::ReadFile {
                path: non_empty(args, "path")?.into(),
            }),
            "write_file" => Ok(Self::WriteFile {
                path: non_empty(args, "path")?.into(),
                content: str_arg(args, "content")?.to_string(),
            }),
            "commit" => Ok(Self::Commit {
                repo: non_empty(args, "repo")?.into(),
                message: non_empty(args, "message")?.to_string(),
            }),
            "shell" => Ok(Self::Shell {
                command: non_empty(args, "command")?.to_string(),
                cwd: args.get("cwd").and_then(Value::as_str).map(PathBuf::from),
            }),
            "rollback" => Ok(Self::Rollback {
                repo: non_empty(args, "repo")?.into(),
                commit_ref: non_empty(args, "commit_ref")?.to_string(),
            }),
            other => Err(HearthError::Validation(format!("unknown tool '{other}'"))),
        }
    }

    pub fn action(&self) -> ActionType {
        match self {
            Self::ReadFile { .. } => ActionType::Read,
            Self::WriteFile { .. } => ActionType::Write,
            Self::Commit { .. } | Self::Rollback { .. } => ActionType::Commit,
            Self::Shell { .. } => ActionType::ShellExec,
        }
    }

    /// Rollback checkpoints uncommitted work itself, at every tier.
    fn checkpoints_itself(&self) -> bool {
        matches!(self, Self::Rollback { .. })
    }

    /// Path the permission check runs against. Shell defaults to the sandbox.
    fn target<'a>(&'a self, sandbox: &'a Path) -> &'a Path {
        match self {
            Self::ReadFile { path } | Self::WriteFile { path, .. } => path,
            Self::Commit { repo, .. } | Self::Rollback { repo, .. } => repo,
            Self::Shell { cwd, .. } => cwd.as_deref().unwrap_or(sandbox),
        }
    }
}

pub struct ToolRunner {
    matrix: PermissionMatrix,
    safety_net: Arc<SafetyNet>,
    audit: AuditTrail,
    executor: Arc<dyn Executor>,
    vcs: Arc<dyn VersionControl>,
    lock: Mutex<()>,
}

impl ToolRunner {
    pub fn new(
        matrix: PermissionMatrix,
        safety_net: Arc<SafetyNet>,
        audit: AuditTrail,
        executor: Arc<dyn Executor>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        Self {
            matrix,
            safety_net,
            audit,
            executor,
            vcs,
            lock: Mutex::new(()),
        }
    }

    pub fn matrix(&self) -> &PermissionMatrix {
        &self.matrix
    }

    pub fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub async fn execute(&self, limbic: &LimbicSystem, name: &str, args: Value) -> ToolResult {
        let _guard = self.lock.lock().await;
        let action_id = uuid::Uuid::new_v4().to_string();
        let trust = limbic.trust().await;
        let tier = TrustTier::from_trust(trust);

        let (status, output, snapshot_ref) = self.run(&action_id, trust, name, &args).await;
        match status {
            ToolStatus::Success => tracing::info!(action_id = %action_id, tool = name, tier = %tier, "Tool succeeded"),
            _ => tracing::warn!(action_id = %action_id, tool = name, tier = %tier, status = %status, "Tool {status}: {output}"),
        }

        let entry = ToolAuditEntry {
            action_id: action_id.clone(),
            tool: name.to_string(),
            args,
            tier,
            outcome: status,
            detail: output.chars().take(DETAIL_CHARS).collect(),
            snapshot_ref: snapshot_ref.clone(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.audit.record(&entry).await {
            tracing::error!(action_id = %action_id, "Failed to write audit entry: {e:#}");
        }

        ToolResult {
            action_id,
            tool: name.to_string(),
            status,
            output,
            tier,
            snapshot_ref,
        }
    }

    async fn run(
        &self,
        action_id: &str,
        trust: f32,
        name: &str,
        args: &Value,
    ) -> (ToolStatus, String, Option<String>) {
        let call = match ToolCall::parse(name, args) {
            Ok(call) => call,
            Err(e) => return (ToolStatus::Invalid, e.to_string(), None),
        };
        let decision = match self.matrix.check(trust, call.action(), call.target(self.matrix.sandbox_dir())) {
            Ok(d) => d,
            Err(e) => return (ToolStatus::Invalid, e.to_string(), None),
        };
        if !decision.allowed {
            return (ToolStatus::Denied, decision.reason, None);
        }

        let snapshot_ref = if decision.requires_snapshot && !call.checkpoints_itself() {
            match self.safety_net.prepare(action_id, &decision.target_path).await {
                Ok(snapshot) => snapshot.map(|s| s.commit_ref),
                Err(e) => return (ToolStatus::Failed, format!("aborted: {e}"), None),
            }
        } else {
            None
        };

        match self.apply(action_id, &call, &decision.target_path).await {
            Ok((output, taken)) => (ToolStatus::Success, output, snapshot_ref.or(taken)),
            Err(HearthError::ToolExecution { message, snapshot_ref: taken }) => {
                let snapshot_ref = snapshot_ref.or(taken);
                let err = HearthError::ToolExecution {
                    message,
                    snapshot_ref: snapshot_ref.clone(),
                };
                (ToolStatus::Failed, err.to_string(), snapshot_ref)
            }
            Err(e) => (ToolStatus::Failed, e.to_string(), snapshot_ref),
        }
    }

    /// Run the effect. Returns the output and any snapshot the effect took.
    async fn apply(
        &self,
        action_id: &str,
        call: &ToolCall,
        target: &Path,
    ) -> HearthResult<(String, Option<String>)> {
        match call {
            ToolCall::ReadFile { .. } => tokio::fs::read_to_string(target)
                .await
                .map(|text| (text, None))
                .map_err(|e| failed(format!("cannot read {}: {e}", target.display()))),
            ToolCall::WriteFile { content, .. } => {
                if let Some(parent) = target.parent() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|e| failed(format!("cannot create {}: {e}", parent.display())))?;
                }
                tokio::fs::write(target, content)
                    .await
                    .map_err(|e| failed(format!("cannot write {}: {e}", target.display())))?;
                Ok((format!("wrote {} bytes to {}", content.len(), target.display()), None))
            }
            ToolCall::Commit { message, .. } => {
                let repo = self.enclosing_repo(target).await?;
                self.vcs
                    .snapshot(&repo, message)
                    .await
                    .map(|commit| (commit, None))
                    .map_err(|e| failed(format!("{e:#}")))
            }
            ToolCall::Shell { command, .. } => self
                .executor
                .execute(command, target)
                .await
                .map(|out| (out, None))
                .map_err(|e| failed(format!("{e:#}"))),
            ToolCall::Rollback { commit_ref, .. } => {
                let repo = self.enclosing_repo(target).await?;
                let outcome = self.safety_net.rollback(action_id, &repo, commit_ref).await?;
                Ok((outcome.head, outcome.checkpoint.map(|s| s.commit_ref)))
            }
        }
    }

    async fn enclosing_repo(&self, target: &Path) -> HearthResult<PathBuf> {
        match self.vcs.repo_root(target).await {
            Ok(Some(repo)) => Ok(repo),
            Ok(None) => Err(failed(format!("{} is not inside a repository", target.display()))),
            Err(e) => Err(failed(format!("{e:#}"))),
        }
    }
}

fn failed(message: String) -> HearthError {
    HearthError::ToolExecution {
        message,
        snapshot_ref: None,
    }
}
