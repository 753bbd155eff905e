//! Convergent stage: score candidates and pick one.
//!
//! Scoring rules each look at a candidate in the light of the current
//! limbic state and perception, and either abstain or add to its score.
//! Every contribution is written into the rationale.

use crate::divergent::Candidate;
use crate::perception::Perception;
use hearth_core::LimbicState;
use serde::{Deserialize, Serialize};

/// `selected_option_id` when there was nothing to choose from.
pub const NO_SELECTION: &str = "None";

// ============================================================================
// Decision
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    pub id: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub selected_option_id: String,
    /// Non-empty when the top two were close enough to blend.
    #[serde(default)]
    pub synthesized_from: Vec<String>,
    #[serde(default)]
    pub scores: Vec<CandidateScore>,
    pub rationale: String,
}

impl Decision {
    pub fn none(reason: &str) -> Self {
        Self {
            selected_option_id: NO_SELECTION.to_string(),
            synthesized_from: Vec::new(),
            scores: Vec::new(),
            rationale: reason.to_string(),
        }
    }

    pub fn has_selection(&self) -> bool {
        self.selected_option_id != NO_SELECTION
    }

    pub fn selected<'a>(&self, candidates: &'a [Candidate]) -> Option<&'a Candidate> {
        candidates.iter().find(|c| c.id == self.selected_option_id)
    }
}

// ============================================================================
// ScoringRule trait
// ============================================================================

pub struct ScoringContext<'a> {
    pub perception: &'a Perception,
    pub limbic: &'a LimbicState,
}

pub trait ScoringRule: Send + Sync {
    /// Score contribution for `candidate`, or None when the rule does not apply.
    fn score(&self, candidate: &Candidate, ctx: &ScoringContext<'_>) -> Option<f32>;

    /// Name for logging.
    fn name(&self) -> &str;
}

fn style_is(candidate: &Candidate, styles: &[&str]) -> bool {
    styles.iter().any(|s| candidate.style.contains(s))
}

fn brevity(candidate: &Candidate, ideal_chars: f32) -> f32 {
    let len = candidate.content.chars().count() as f32;
    (1.0 - len / (ideal_chars * 4.0)).clamp(0.0, 1.0)
}

// ============================================================================
// Built-in rules
// ============================================================================

/// Every candidate gets a base score; empty-ish or rambling ones lose some.
pub struct BaselineRule;

impl ScoringRule for BaselineRule {
    fn score(&self, candidate: &Candidate, _ctx: &ScoringContext<'_>) -> Option<f32> {
        let len = candidate.content.chars().count();
        let penalty = if len < 2 {
            0.3
        } else if len > 1200 {
            0.2
        } else {
            0.0
        };
        Some(0.5 - penalty)
    }

    fn name(&self) -> &str { "baseline" }
}

/// Under high urgency or load, favour direct and short replies.
pub struct DecisivenessRule;

impl ScoringRule for DecisivenessRule {
    fn score(&self, candidate: &Candidate, ctx: &ScoringContext<'_>) -> Option<f32> {
        let p = ctx.perception;
        if p.urgency < 0.6 && p.cognitive_load < 0.7 {
            return None;
        }
        let style = if style_is(candidate, &["direct", "decisive", "practical", "action"]) { 0.3 } else { 0.0 };
        Some(style + 0.2 * brevity(candidate, 120.0))
    }

    fn name(&self) -> &str { "decisiveness" }
}

/// Under negative valence or crisis, favour warmth.
pub struct WarmthRule;

impl ScoringRule for WarmthRule {
    fn score(&self, candidate: &Candidate, ctx: &ScoringContext<'_>) -> Option<f32> {
        if ctx.limbic.valence >= -0.2 && !ctx.perception.crisis && ctx.perception.sentiment >= -0.2 {
            return None;
        }
        let style = if style_is(candidate, &["warm", "empathetic", "supportive", "gentle"]) { 0.4 } else { 0.0 };
        let playful = if style_is(candidate, &["playful", "witty", "joke"]) { -0.2 } else { 0.0 };
        Some(style + playful)
    }

    fn name(&self) -> &str { "warmth" }
}

/// After a door-slam, less is more.
pub struct BrevityRule;

impl ScoringRule for BrevityRule {
    fn score(&self, candidate: &Candidate, ctx: &ScoringContext<'_>) -> Option<f32> {
        if !ctx.limbic.flags.door_slam_active && !ctx.perception.withdrawal {
            return None;
        }
        let question = if candidate.content.contains('?') { -0.1 } else { 0.0 };
        Some(0.4 * brevity(candidate, 60.0) + question)
    }

    fn name(&self) -> &str { "brevity" }
}

// ============================================================================
// ConvergentSelector
// ============================================================================

pub struct ConvergentSelector {
    rules: Vec<Box<dyn ScoringRule>>,
    /// Top-2 closer than this blend (under low urgency).
    margin: f32,
}

impl ConvergentSelector {
    pub fn new(margin: f32) -> Self {
        Self {
            rules: Vec::new(),
            margin: margin.max(0.0),
        }
    }

    /// Selector with the built-in rules.
    pub fn with_defaults(margin: f32) -> Self {
        let mut selector = Self::new(margin);
        selector.add_rule(Box::new(BaselineRule));
        selector.add_rule(Box::new(DecisivenessRule));
        selector.add_rule(Box::new(WarmthRule));
        selector.add_rule(Box::new(BrevityRule));
        selector
    }

    pub fn add_rule(&mut self, rule: Box<dyn ScoringRule>) {
        self.rules.push(rule);
    }

    pub fn select(&self, candidates: &[Candidate], ctx: &ScoringContext<'_>) -> Decision {
        if candidates.is_empty() {
            return Decision::none("no candidates");
        }

        let mut notes = Vec::new();
        let mut scores: Vec<CandidateScore> = candidates
            .iter()
            .map(|c| {
                let mut total = 0.0;
                for rule in &self.rules {
                    if let Some(s) = rule.score(c, ctx) {
                        total += s;
                        if rule.name() != "baseline" && s != 0.0 {
                            notes.push(format!("{}: {} {:+.2}", rule.name(), c.id, s));
                        }
                    }
                }
                CandidateScore {
                    id: c.id.clone(),
                    score: total,
                }
            })
            .collect();

        // Stable sort keeps generation order on ties
        scores.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

        let top = &scores[0];
        let mut rationale = format!("selected {} ({:.2})", top.id, top.score);
        let mut synthesized_from = Vec::new();
        if let Some(second) = scores.get(1) {
            let gap = top.score - second.score;
            if gap < self.margin && ctx.perception.urgency < 0.5 {
                synthesized_from = vec![top.id.clone(), second.id.clone()];
                rationale.push_str(&format!("; blending with {} (gap {:.2})", second.id, gap));
            }
        }
        if !notes.is_empty() {
            rationale.push_str("; ");
            rationale.push_str(&notes.join(", "));
        }
        tracing::debug!("Convergent: {rationale}");

        Decision {
            selected_option_id: top.id.clone(),
            synthesized_from,
            scores,
            rationale,
        }
    }
}
