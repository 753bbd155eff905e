//! Tool audit trail.
//!
//! One JSON line per tool execution, kept apart from diagnostic logs so it
//! can be read back and shown to the user.

use crate::jsonl;
use anyhow::Result;
use chrono::{DateTime, Utc};
use hearth_core::TrustTier;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Denied,
    Failed,
    Invalid,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Success => "success",
            ToolStatus::Denied => "denied",
            ToolStatus::Failed => "failed",
            ToolStatus::Invalid => "invalid",
        }
    }
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolAuditEntry {
    pub action_id: String,
    pub tool: String,
    pub args: serde_json::Value,
    pub tier: TrustTier,
    pub outcome: ToolStatus,
    /// Output excerpt or error message.
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_ref: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AuditTrail {
    path: PathBuf,
}

impl AuditTrail {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, entry: &ToolAuditEntry) -> Result<()> {
        jsonl::append(&self.path, entry).await
    }

    pub async fn entries(&self) -> Result<Vec<ToolAuditEntry>> {
        jsonl::read_all(&self.path).await
    }
}
