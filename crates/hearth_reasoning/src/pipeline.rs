//! One conversational turn:
//! Perception → Retrieval → Divergent → Convergent → Synthesis → Commit.
//!
//! Stages run strictly in order. Nothing here returns an error: every
//! collaborator failure degrades to a fallback and is marked in the trace.

use crate::brain::Brain;
use crate::convergent::ScoringContext;
use crate::divergent;
use crate::perception::{self, Perception};
use crate::synthesis::{self, ResponseSource};
use crate::trace::PipelineTrace;
use chrono::Utc;
use hearth_core::{Capability, Posture};
use hearth_memory::MemoryMetadata;
use std::time::Duration;
use tokio::time::Instant;

/// Memory salience for a turn, from its emotional intensity.
fn turn_salience(perception: &Perception) -> f32 {
    let base = 0.3 + 0.5 * perception.intensity + 0.2 * perception.sentiment.abs();
    if perception.crisis {
        1.0
    } else {
        base.clamp(0.0, 1.0)
    }
}

impl Brain {
    pub async fn process_turn(&self, input: &str) -> PipelineTrace {
        let turn_id = uuid::Uuid::new_v4().to_string();
        let deadline = Instant::now() + Duration::from_millis(self.pipeline.turn_deadline_ms);
        tracing::debug!(turn_id = %turn_id, "Turn started");

        // Perception
        let deep = if self.capabilities.contains(Capability::DeepPerception) {
            self.deep.as_deref()
        } else {
            None
        };
        let perception = perception::perceive(
            input,
            deep,
            Duration::from_millis(self.pipeline.deep_perception_timeout_ms),
        )
        .await;

        let mut nudge = perception.limbic_nudge();
        if perception.delegation {
            // Handing over the wheel sticks until the posture is released
            nudge.force_posture = Some(Posture::CoPilot);
        }
        let (crisis, withdrawal) = (perception.crisis, perception.withdrawal);
        let state = self
            .limbic
            .register_interaction_with(nudge, |flags| {
                flags.crisis_active = crisis;
                flags.door_slam_active = withdrawal;
            })
            .await;
        let posture = if state.posture_forced {
            state.posture
        } else {
            perception.suggested_posture()
        };

        // Retrieval
        let memories = self.memory.retrieve(input, self.retrieval_limit).await;

        // Divergent
        let max = self.pipeline.max_candidates;
        let prompt = divergent::build_prompt(input, &perception, &state, &memories, max);
        let candidates = divergent::generate(self.llm.as_ref(), &prompt, max, self.params.clone(), deadline).await;

        // Convergent
        let decision = self.selector.select(
            &candidates,
            &ScoringContext {
                perception: &perception,
                limbic: &state,
            },
        );

        // Synthesis
        let synthesis = synthesis::synthesize(
            self.llm.as_ref(),
            input,
            &decision,
            &candidates,
            posture,
            &state,
            self.params.clone(),
            deadline,
        )
        .await;

        // Commit
        let fallback = candidates.is_empty() || synthesis.source != ResponseSource::Generated;
        let trace = PipelineTrace {
            turn_id,
            timestamp: Utc::now(),
            input: input.to_string(),
            perception: perception.clone(),
            posture,
            retrieved_ids: memories.iter().map(|m| m.id.clone()).collect(),
            candidates,
            decision,
            response: synthesis.text,
            response_source: synthesis.source,
            fallback,
            resulting_limbic_state: self.limbic.snapshot().await,
        };
        if let Err(e) = self.traces.append(&trace).await {
            tracing::error!(turn_id = %trace.turn_id, "Failed to append trace: {e:#}");
        }
        if trace.fallback {
            tracing::info!(turn_id = %trace.turn_id, source = ?trace.response_source, "Turn degraded to fallback");
        }

        self.schedule_background(input, perception).await;
        trace
    }

    /// Post-turn effects that must not delay the reply.
    async fn schedule_background(&self, input: &str, perception: Perception) {
        let limbic = self.limbic.clone();
        let memory = self.memory.clone();
        let notifier = if self.capabilities.contains(Capability::ProactiveNotifications) {
            self.notifier.clone()
        } else {
            None
        };
        let proactive = self.proactive.clone();
        let text = input.trim().to_string();

        let mut set = self.background.lock().await;
        while set.try_join_next().is_some() {}
        set.spawn(async move {
            if !text.is_empty() {
                let metadata = MemoryMetadata::new("episode", "conversation").with_salience(turn_salience(&perception));
                if memory.add(&text, metadata).await.is_none() {
                    tracing::debug!("Memory write-back skipped");
                }
            }

            let state = limbic.reevaluate_posture(perception.cognitive_load).await;

            if let Some(notifier) = notifier {
                if let Some(message) = proactive.evaluate(&state) {
                    if let Err(e) = notifier.notify(&message).await {
                        tracing::warn!("Proactive notification failed: {e:#}");
                    }
                }
            }

            limbic.decay().await;
        });
    }
}
