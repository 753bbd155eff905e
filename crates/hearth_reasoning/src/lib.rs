//! # Hearth Reasoning
//!
//! The cognitive pipeline and the [`Brain`] that hosts drive.
//!
//! A turn runs Perception → Retrieval → Divergent → Convergent → Synthesis →
//! Commit (see [`pipeline`]); tool calls go through [`tools::ToolRunner`],
//! which gates them on the live trust tier and takes safety-net snapshots.

pub mod brain;
pub mod convergent;
pub mod divergent;
pub mod llm;
pub mod perception;
pub mod pipeline;
pub mod proactive;
pub mod providers;
pub mod synthesis;
pub mod tools;
pub mod trace;

pub use brain::Brain;
pub use convergent::{ConvergentSelector, Decision, ScoringRule, NO_SELECTION};
pub use divergent::Candidate;
pub use llm::{create_client, CompletionParams, LlmClient};
pub use perception::{DeepAnalyzer, DeepPerception, LlmDeepAnalyzer, Perception};
pub use proactive::{ChannelNotifier, Notifier, ProactiveEvaluator};
pub use synthesis::{ResponseSource, CANNED_ACKNOWLEDGMENT};
pub use tools::{ToolCall, ToolResult};
pub use trace::{PipelineTrace, TraceStore};
