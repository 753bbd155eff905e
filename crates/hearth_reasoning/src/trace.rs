//! Per-turn pipeline traces, one JSON line each.

use crate::convergent::Decision;
use crate::divergent::Candidate;
use crate::perception::Perception;
use crate::synthesis::ResponseSource;
use anyhow::Result;
use chrono::{DateTime, Utc};
use hearth_core::{LimbicState, Posture};
use hearth_os::jsonl;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTrace {
    pub turn_id: String,
    pub timestamp: DateTime<Utc>,
    pub input: String,
    pub perception: Perception,
    pub posture: Posture,
    pub retrieved_ids: Vec<String>,
    pub candidates: Vec<Candidate>,
    pub decision: Decision,
    pub response: String,
    pub response_source: ResponseSource,
    /// True when any stage degraded (no candidates, generation fallback).
    pub fallback: bool,
    pub resulting_limbic_state: LimbicState,
}

#[derive(Debug, Clone)]
pub struct TraceStore {
    path: PathBuf,
}

impl TraceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, trace: &PipelineTrace) -> Result<()> {
        jsonl::append(&self.path, trace).await
    }

    /// The last `n` traces, oldest first.
    pub async fn recent(&self, n: usize) -> Result<Vec<PipelineTrace>> {
        let mut all: Vec<PipelineTrace> = jsonl::read_all(&self.path).await?;
        let skip = all.len().saturating_sub(n);
        Ok(all.split_off(skip))
    }
}
