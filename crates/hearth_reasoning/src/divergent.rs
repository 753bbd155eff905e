//! Divergent stage: ask for several candidate replies.

use crate::llm::{CompletionParams, LlmClient};
use crate::perception::Perception;
use hearth_core::LimbicState;
use hearth_memory::ScoredMemory;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub style: String,
    pub content: String,
}

#[derive(Deserialize)]
struct RawCandidate {
    #[serde(default)]
    style: Option<String>,
    content: String,
}

const DIRECT_STYLE: &str = "direct";

/// Parse the collaborator's output into at most `max` candidates.
///
/// A JSON array of `{style, content}` objects is the expected shape (code
/// fences and surrounding chatter are tolerated). Plain prose becomes one
/// `direct` candidate. Malformed JSON yields nothing.
pub fn parse_candidates(raw: &str, max: usize) -> Vec<Candidate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || max == 0 {
        return Vec::new();
    }

    let parsed: Option<Vec<RawCandidate>> = match (trimmed.find('['), trimmed.rfind(']')) {
        (Some(start), Some(end)) if end > start => serde_json::from_str(&trimmed[start..=end]).ok(),
        _ => None,
    };

    let contents: Vec<(String, String)> = match parsed {
        Some(list) => list
            .into_iter()
            .filter(|c| !c.content.trim().is_empty())
            .map(|c| {
                let style = c
                    .style
                    .map(|s| s.trim().to_lowercase())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DIRECT_STYLE.to_string());
                (style, c.content.trim().to_string())
            })
            .collect(),
        None if looks_structured(trimmed) => {
            tracing::warn!("Divergent output looked like JSON but did not parse; no candidates");
            Vec::new()
        }
        None => vec![(DIRECT_STYLE.to_string(), trimmed.to_string())],
    };

    contents
        .into_iter()
        .take(max)
        .enumerate()
        .map(|(i, (style, content))| Candidate {
            id: format!("opt-{}", i + 1),
            style,
            content,
        })
        .collect()
}

fn looks_structured(text: &str) -> bool {
    let body = text.trim_start_matches("```json").trim_start_matches("```").trim_start();
    body.starts_with('[') || body.starts_with('{')
}

pub(crate) const DIVERGENT_SYSTEM_PROMPT: &str = "You are drafting possible replies for a personal \
companion. Reply with a JSON array only: [{\"style\": \"...\", \"content\": \"...\"}]. Use \
different styles (for example warm, direct, playful, practical). Keep each reply short.";

pub fn build_prompt(
    input: &str,
    perception: &Perception,
    limbic: &LimbicState,
    memories: &[ScoredMemory],
    max: usize,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Write up to {max} candidate replies.\n"));
    prompt.push_str(&format!("{}\n", limbic.describe()));
    prompt.push_str(&format!(
        "Perception: urgency={:.2} load={:.2} sentiment={:+.2}{}{}\n",
        perception.urgency,
        perception.cognitive_load,
        perception.sentiment,
        if perception.crisis { " crisis" } else { "" },
        if perception.withdrawal { " withdrawal" } else { "" },
    ));
    if !memories.is_empty() {
        prompt.push_str("Relevant memories:\n");
        for m in memories {
            prompt.push_str(&format!("- {}\n", m.text));
        }
    }
    prompt.push_str(&format!("User: {input}\n"));
    prompt
}

/// Ask for candidates before `deadline`. Failure, timeout and empty output
/// all yield an empty list.
pub async fn generate(
    client: &dyn LlmClient,
    prompt: &str,
    max: usize,
    params: CompletionParams,
    deadline: Instant,
) -> Vec<Candidate> {
    if max == 0 {
        return Vec::new();
    }
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        tracing::warn!("Turn deadline already passed; skipping divergent stage");
        return Vec::new();
    }
    match tokio::time::timeout(remaining, client.complete(DIVERGENT_SYSTEM_PROMPT, prompt, params)).await {
        Ok(Ok(raw)) => {
            let candidates = parse_candidates(&raw, max);
            tracing::debug!("Divergent produced {} candidates", candidates.len());
            candidates
        }
        Ok(Err(e)) => {
            tracing::warn!("Divergent generation failed: {e:#}");
            Vec::new()
        }
        Err(_) => {
            tracing::warn!("Divergent generation timed out");
            Vec::new()
        }
    }
}
