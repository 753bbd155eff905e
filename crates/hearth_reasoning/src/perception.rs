//! Perception: what kind of turn is this?
//!
//! A synchronous heuristic scan always runs. When a deep analyzer is
//! available it is raced against a timeout; if it answers in time its
//! fields override the heuristic ones, except that a heuristic `delegation`
//! or `crisis` detection is never downgraded.

use crate::llm::{CompletionParams, LlmClient};
use anyhow::{Context, Result};
use async_trait::async_trait;
use hearth_core::sentiment::analyze_sentiment;
use hearth_core::{LimbicDelta, Posture};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static RE_URGENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(urgent|asap|right now|immediately|emergency|hurry|deadline|quick(ly)?)\b").unwrap()
});
static RE_LOAD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(overwhelmed|swamped|stressed|too much|so much|too many|juggling|can'?t keep up|exhausted|busy)\b").unwrap()
});
static RE_DELEGATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(take the wheel|take over|you decide|your call|handle (it|this|that)|you handle|do it for me|just do it)\b").unwrap()
});
static RE_CRISIS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(kill myself|suicid\w*|end it all|self[- ]harm|hurt myself|want to die|no reason to live)\b").unwrap()
});
static RE_WITHDRAWAL_ONLY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(fine|whatever|forget it|never\s?mind|k|ok)\s*[.!]*\s*$").unwrap()
});
static RE_WITHDRAWAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(leave me alone|stop talking|go away|i don'?t want to talk|not in the mood)\b").unwrap()
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Perception {
    /// 0.0 - 1.0
    pub urgency: f32,
    /// 0.0 - 1.0
    pub cognitive_load: f32,
    /// -1.0 - 1.0
    pub sentiment: f32,
    /// 0.1 - 1.0
    pub intensity: f32,
    pub delegation: bool,
    pub crisis: bool,
    pub withdrawal: bool,
    pub question_count: usize,
    /// Whether a deep analysis was merged in.
    pub deep: bool,
}

impl Default for Perception {
    fn default() -> Self {
        Self {
            urgency: 0.0,
            cognitive_load: 0.0,
            sentiment: 0.0,
            intensity: 0.1,
            delegation: false,
            crisis: false,
            withdrawal: false,
            question_count: 0,
            deep: false,
        }
    }
}

impl Perception {
    /// Posture this turn asks for: delegation wins, then crisis, else load.
    pub fn suggested_posture(&self) -> Posture {
        if self.delegation {
            Posture::CoPilot
        } else if self.crisis {
            Posture::Companion
        } else {
            Posture::from_load(self.cognitive_load)
        }
    }

    /// How this turn nudges the limbic state.
    pub fn limbic_nudge(&self) -> LimbicDelta {
        LimbicDelta {
            valence: self.sentiment * 0.3 * (0.5 + self.intensity / 2.0),
            arousal: (self.urgency - 0.3) * 0.3,
            warmth: if self.sentiment > 0.0 { self.sentiment * 0.1 } else { 0.0 },
            ..Default::default()
        }
    }
}

/// Cheap lexical scan. Always available.
pub fn scan(input: &str) -> Perception {
    let exclamations = input.matches('!').count().min(3) as f32;
    let urgent_words = RE_URGENT.find_iter(input).count() as f32;
    let letters: Vec<char> = input.chars().filter(|c| c.is_alphabetic()).collect();
    let upper = letters.iter().filter(|c| c.is_uppercase()).count();
    let shouting = letters.len() >= 8 && upper as f32 / letters.len() as f32 > 0.6;

    let urgency = exclamations * 0.15 + urgent_words * 0.25 + if shouting { 0.3 } else { 0.0 };

    let question_count = input.matches('?').count();
    let length_load = (input.chars().count() as f32 / 600.0).min(0.5);
    let load = length_load
        + (question_count as f32 * 0.1).min(0.3)
        + RE_LOAD.find_iter(input).count() as f32 * 0.2;

    let (sentiment, intensity) = analyze_sentiment(input);
    let withdrawal = RE_WITHDRAWAL_ONLY.is_match(input) || RE_WITHDRAWAL.is_match(input);

    Perception {
        urgency: urgency.clamp(0.0, 1.0),
        cognitive_load: load.clamp(0.0, 1.0),
        sentiment,
        intensity,
        delegation: RE_DELEGATION.is_match(input),
        crisis: RE_CRISIS.is_match(input),
        withdrawal,
        question_count,
        deep: false,
    }
}

// ============================================================================
// Deep analysis
// ============================================================================

/// Partial perception from a deeper analyzer. Absent fields keep the
/// heuristic value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct DeepPerception {
    pub urgency: Option<f32>,
    pub cognitive_load: Option<f32>,
    pub sentiment: Option<f32>,
    pub delegation: Option<bool>,
    pub crisis: Option<bool>,
    pub withdrawal: Option<bool>,
}

#[async_trait]
pub trait DeepAnalyzer: Send + Sync {
    async fn analyze(&self, input: &str) -> Result<DeepPerception>;
}

fn finite_or(v: Option<f32>, fallback: f32) -> f32 {
    v.filter(|x| x.is_finite()).unwrap_or(fallback)
}

pub fn merge(heuristic: Perception, deep: DeepPerception) -> Perception {
    Perception {
        urgency: finite_or(deep.urgency, heuristic.urgency).clamp(0.0, 1.0),
        cognitive_load: finite_or(deep.cognitive_load, heuristic.cognitive_load).clamp(0.0, 1.0),
        sentiment: finite_or(deep.sentiment, heuristic.sentiment).clamp(-1.0, 1.0),
        delegation: heuristic.delegation || deep.delegation.unwrap_or(false),
        crisis: heuristic.crisis || deep.crisis.unwrap_or(false),
        withdrawal: deep.withdrawal.unwrap_or(heuristic.withdrawal),
        deep: true,
        ..heuristic
    }
}

/// Heuristic scan, refined by `deep` when it answers within `timeout`.
pub async fn perceive(input: &str, deep: Option<&dyn DeepAnalyzer>, timeout: Duration) -> Perception {
    let heuristic = scan(input);
    let Some(analyzer) = deep else {
        return heuristic;
    };
    match tokio::time::timeout(timeout, analyzer.analyze(input)).await {
        Ok(Ok(d)) => merge(heuristic, d),
        Ok(Err(e)) => {
            tracing::warn!("Deep perception failed, using heuristics: {e:#}");
            heuristic
        }
        Err(_) => {
            tracing::debug!("Deep perception timed out after {} ms", timeout.as_millis());
            heuristic
        }
    }
}

/// Deep analyzer backed by the generation collaborator.
pub struct LlmDeepAnalyzer {
    client: Arc<dyn LlmClient>,
}

const DEEP_SYSTEM_PROMPT: &str = "Assess the user's message. Reply with a JSON object only, using \
any of: urgency (0-1), cognitive_load (0-1), sentiment (-1 to 1), delegation (bool: are they \
handing you control), crisis (bool: any sign of self-harm risk), withdrawal (bool: are they \
shutting the conversation down).";

impl LlmDeepAnalyzer {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl DeepAnalyzer for LlmDeepAnalyzer {
    async fn analyze(&self, input: &str) -> Result<DeepPerception> {
        let params = CompletionParams {
            max_tokens: 200,
            temperature: 0.0,
        };
        let raw = self
            .client
            .complete(DEEP_SYSTEM_PROMPT, &format!("User: {input}"), params)
            .await?;
        let start = raw.find('{').context("no JSON object in deep perception output")?;
        let end = raw.rfind('}').context("no JSON object in deep perception output")?;
        if end < start {
            anyhow::bail!("malformed deep perception output");
        }
        serde_json::from_str(&raw[start..=end]).context("Failed to parse deep perception")
    }
}
