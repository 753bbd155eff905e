//! Synthesis: render the chosen candidate in the current voice.

use crate::convergent::Decision;
use crate::divergent::Candidate;
use crate::llm::{CompletionParams, LlmClient};
use hearth_core::{LimbicFlags, LimbicState, Posture};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tokio::time::Instant;

static RE_BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static RE_ITALIC: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*\n]+)\*").unwrap());
static RE_HEADER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static RE_BULLET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-*][ \t]+").unwrap());
static RE_CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^```[a-zA-Z]*[ \t]*$").unwrap());
static RE_MULTI_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
/// A sentence and its terminator (or the unterminated tail).
static RE_SENTENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^.!?]+(?:[.!?]+|$)").unwrap());

/// Said when nothing better is available.
pub const CANNED_ACKNOWLEDGMENT: &str = "I'm here, and I'm listening.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tone {
    pub affect: String,
    pub energy: String,
    pub max_sentences: usize,
    pub max_questions: usize,
}

pub fn tone_for(state: &LimbicState) -> Tone {
    let flags = state.flags;
    let affect = if flags.crisis_active || state.warmth > 0.65 {
        "warm"
    } else if state.warmth < 0.35 {
        "reserved"
    } else {
        "friendly"
    };
    let (energy, max_sentences) = if flags.crisis_active {
        ("calm", 4)
    } else if state.arousal > 0.7 {
        ("lively", 5)
    } else if state.arousal < 0.3 {
        ("calm", 3)
    } else {
        ("steady", 4)
    };
    let (max_sentences, max_questions) = if flags.door_slam_active {
        (2, 0)
    } else {
        (max_sentences, 1)
    };
    Tone {
        affect: affect.to_string(),
        energy: energy.to_string(),
        max_sentences,
        max_questions,
    }
}

/// Strip markdown the conversational surface cannot render.
pub fn clean_markdown(text: &str) -> String {
    let text = RE_CODE_FENCE.replace_all(text, "");
    let text = RE_BOLD.replace_all(&text, "$1");
    let text = RE_ITALIC.replace_all(&text, "$1");
    let text = RE_HEADER.replace_all(&text, "");
    let text = RE_BULLET.replace_all(&text, "");
    let text = RE_MULTI_NEWLINE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// A sentence is a question when any mark in its terminator is `?`, so
/// `?!` and `!?` count too.
fn is_question(sentence: &str) -> bool {
    sentence
        .trim_end()
        .chars()
        .rev()
        .take_while(|c| matches!(c, '.' | '!' | '?'))
        .any(|c| c == '?')
}

fn sentences(text: &str) -> Vec<&str> {
    RE_SENTENCE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|s| !s.trim().is_empty())
        .collect()
}

/// Keep at most `max_questions` questions and `max_sentences` sentences.
///
/// Extra questions are dropped. If that would leave nothing, the first
/// question is kept as a statement.
pub fn shape(text: &str, max_sentences: usize, max_questions: usize) -> String {
    let parts = sentences(text);
    let mut out: Vec<String> = Vec::new();
    let mut questions = 0;
    for part in &parts {
        if out.len() >= max_sentences.max(1) {
            break;
        }
        if is_question(part) {
            if questions >= max_questions {
                continue;
            }
            questions += 1;
        }
        out.push(part.to_string());
    }
    if out.is_empty() {
        if let Some(first) = parts.first() {
            let statement = first.trim_end().trim_end_matches(['?', '!', '.']);
            out.push(format!("{statement}."));
        }
    }
    out.concat().trim().to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Generated,
    CandidateFallback,
    Canned,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Synthesis {
    pub text: String,
    pub source: ResponseSource,
}

pub(crate) const SYNTHESIS_SYSTEM_PROMPT: &str = "Rewrite the draft as the companion's final \
reply. Keep its meaning. Plain text, no markdown. Follow the posture and tone given.";

fn posture_guidance(posture: Posture) -> &'static str {
    match posture {
        Posture::Companion => "companion: present, attentive, emotionally attuned",
        Posture::CoPilot => "co-pilot: take initiative, propose concrete next steps",
        Posture::Peer => "peer: relaxed, conversational, on equal footing",
        Posture::Expert => "expert: precise, informative, confident",
    }
}

pub fn build_prompt(
    input: &str,
    draft: &str,
    blend_with: Option<&str>,
    posture: Posture,
    tone: &Tone,
    flags: LimbicFlags,
) -> String {
    let mut prompt = format!(
        "Posture: {}\nTone: {} affect, {} energy, at most {} sentences, at most {} question(s).\n",
        posture_guidance(posture),
        tone.affect,
        tone.energy,
        tone.max_sentences,
        tone.max_questions,
    );
    if flags.crisis_active {
        prompt.push_str("The user may be in crisis: be gentle, stay with them, encourage reaching out for support.\n");
    }
    if flags.door_slam_active {
        prompt.push_str("The user is withdrawing: be brief, do not push, ask nothing.\n");
    }
    if let Some(other) = blend_with {
        prompt.push_str(&format!("Also fold in: {other}\n"));
    }
    prompt.push_str(&format!("User: {input}\nDraft: {draft}\n"));
    prompt
}

/// Render the selected candidate. Never fails: a generation failure falls
/// back to the candidate's own text, no candidate falls back to a canned
/// acknowledgment.
#[allow(clippy::too_many_arguments)]
pub async fn synthesize(
    client: &dyn LlmClient,
    input: &str,
    decision: &Decision,
    candidates: &[Candidate],
    posture: Posture,
    state: &LimbicState,
    params: CompletionParams,
    deadline: Instant,
) -> Synthesis {
    let tone = tone_for(state);
    let Some(selected) = decision.selected(candidates) else {
        return Synthesis {
            text: CANNED_ACKNOWLEDGMENT.to_string(),
            source: ResponseSource::Canned,
        };
    };
    let blend_with = decision
        .synthesized_from
        .iter()
        .find(|id| **id != selected.id)
        .and_then(|id| candidates.iter().find(|c| &c.id == id))
        .map(|c| c.content.as_str());

    let prompt = build_prompt(input, &selected.content, blend_with, posture, &tone, state.flags);
    let remaining = deadline.saturating_duration_since(Instant::now());
    let generated = if remaining.is_zero() {
        tracing::warn!("Turn deadline passed before synthesis");
        None
    } else {
        match tokio::time::timeout(remaining, client.complete(SYNTHESIS_SYSTEM_PROMPT, &prompt, params)).await {
            Ok(Ok(text)) => Some(text),
            Ok(Err(e)) => {
                tracing::warn!("Synthesis generation failed: {e:#}");
                None
            }
            Err(_) => {
                tracing::warn!("Synthesis generation timed out");
                None
            }
        }
    };

    if let Some(text) = generated {
        let shaped = shape(&clean_markdown(&text), tone.max_sentences, tone.max_questions);
        if !shaped.is_empty() {
            return Synthesis {
                text: shaped,
                source: ResponseSource::Generated,
            };
        }
    }

    let fallback = shape(&clean_markdown(&selected.content), tone.max_sentences, tone.max_questions);
    if fallback.is_empty() {
        Synthesis {
            text: CANNED_ACKNOWLEDGMENT.to_string(),
            source: ResponseSource::Canned,
        }
    } else {
        Synthesis {
            text: fallback,
            source: ResponseSource::CandidateFallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_markdown() {
        let raw = "## Plan\n\n\n\n- **First**, rest\n- then *relax*\n```rust\nx\n```";
        let cleaned = clean_markdown(raw);
        assert!(!cleaned.contains('#'));
        assert!(!cleaned.contains("**"));
        assert!(!cleaned.contains("```"));
        assert!(!cleaned.contains("\n\n\n"));
        assert!(cleaned.contains("First, rest"));
        assert!(cleaned.contains("then relax"));
    }

    #[test]
    fn test_shape_keeps_one_question() {
        let out = shape("How was it? Did you sleep? I hope so. Was it fun?", 5, 1);
        assert_eq!(out.matches('?').count(), 1);
        assert!(out.starts_with("How was it?"));
        assert!(out.contains("I hope so."));
    }

    #[test]
    fn test_shape_counts_mixed_terminators_as_questions() {
        let out = shape("Are you okay?! What happened? Tell me.", 5, 1);
        assert_eq!(out, "Are you okay?! Tell me.");
        assert_eq!(shape("Really?! Fine.", 2, 0), "Fine.");
        assert_eq!(shape("You did what!?", 2, 0), "You did what.");
    }

    #[test]
    fn test_shape_no_questions_turns_lone_question_into_statement() {
        let out = shape("Want to talk?", 2, 0);
        assert_eq!(out, "Want to talk.");
        assert!(!out.contains('?'));
    }

    #[test]
    fn test_shape_sentence_budget() {
        let out = shape("One. Two. Three. Four.", 2, 1);
        assert_eq!(out, "One. Two.");
        assert_eq!(shape("no terminator here", 3, 1), "no terminator here");
    }

    #[test]
    fn test_tone_follows_state() {
        let mut s = LimbicState::default();
        s.warmth = 0.9;
        s.arousal = 0.9;
        let t = tone_for(&s);
        assert_eq!(t.affect, "warm");
        assert_eq!(t.energy, "lively");
        assert_eq!(t.max_questions, 1);

        s.flags.door_slam_active = true;
        let t = tone_for(&s);
        assert_eq!(t.max_questions, 0);
        assert_eq!(t.max_sentences, 2);
    }

    struct FailingClient;

    #[async_trait::async_trait]
    impl LlmClient for FailingClient {
        async fn complete(&self, _s: &str, _p: &str, _c: CompletionParams) -> anyhow::Result<String> {
            anyhow::bail!("unreachable")
        }
    }

    fn deadline() -> Instant {
        Instant::now() + std::time::Duration::from_secs(5)
    }

    #[tokio::test]
    async fn test_falls_back_to_candidate_then_canned() {
        let candidates = vec![Candidate {
            id: "opt-1".into(),
            style: "warm".into(),
            content: "**Glad** you told me. How are you? Anything else?".into(),
        }];
        let decision = Decision {
            selected_option_id: "opt-1".into(),
            synthesized_from: vec![],
            scores: vec![],
            rationale: String::new(),
        };
        let s = LimbicState::default();
        let out = synthesize(
            &FailingClient, "hi", &decision, &candidates, Posture::Companion, &s,
            CompletionParams::default(), deadline(),
        )
        .await;
        assert_eq!(out.source, ResponseSource::CandidateFallback);
        assert_eq!(out.text, "Glad you told me. How are you?");

        let out = synthesize(
            &FailingClient, "hi", &Decision::none("no candidates"), &[], Posture::Companion, &s,
            CompletionParams::default(), deadline(),
        )
        .await;
        assert_eq!(out.source, ResponseSource::Canned);
        assert_eq!(out.text, CANNED_ACKNOWLEDGMENT);
    }

    mod props {
        use super::super::*;
        use proptest::prelude::*;

        fn question_count(text: &str) -> usize {
            sentences(text).into_iter().filter(|s| is_question(s)).count()
        }

        proptest! {
            #[test]
            fn shape_respects_question_and_sentence_limits(
                text in "[a-zA-Z ,?!.]{0,80}",
                max_sentences in 0usize..6,
                max_questions in 0usize..3,
            ) {
                let out = shape(&text, max_sentences, max_questions);
                prop_assert!(question_count(&out) <= max_questions, "{:?} -> {:?}", text, out);
                prop_assert!(sentences(&out).len() <= max_sentences.max(1), "{:?} -> {:?}", text, out);
            }
        }
    }
}
