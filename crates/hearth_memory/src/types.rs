use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata attached to a memory.
///
/// `timestamp` and `salience` are optional on the way in; the store fills
/// in "now" and leaves a missing salience to the ranker's default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub salience: Option<f32>,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_source")]
    pub source: String,
}

fn default_kind() -> String {
    "episode".to_string()
}

fn default_source() -> String {
    "conversation".to_string()
}

impl Default for MemoryMetadata {
    fn default() -> Self {
        Self {
            timestamp: None,
            salience: None,
            kind: default_kind(),
            source: default_source(),
        }
    }
}

impl MemoryMetadata {
    pub fn new(kind: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_salience(mut self, salience: f32) -> Self {
        self.salience = Some(salience);
        self
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemoryRecord {
    pub id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub metadata: MemoryMetadata,
}

/// A retrieved memory with its ranking components.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMemory {
    pub id: String,
    pub text: String,
    pub metadata: MemoryMetadata,
    pub similarity: f32,
    pub freshness: f32,
    pub score: f32,
}
