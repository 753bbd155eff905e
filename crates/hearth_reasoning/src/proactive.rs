//! Proactive check-ins.
//!
//! After a turn, a low mood combined with an established warm bond earns a
//! gentle follow-up, delivered through whatever notifier the host wired in.

use anyhow::Result;
use async_trait::async_trait;
use hearth_core::LimbicState;
use tokio::sync::mpsc;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, message: &str) -> Result<()>;
}

/// Delivers notifications into a channel (the CLI prints them).
pub struct ChannelNotifier {
    tx: mpsc::Sender<String>,
}

impl ChannelNotifier {
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn notify(&self, message: &str) -> Result<()> {
        self.tx
            .send(message.to_string())
            .await
            .map_err(|_| anyhow::anyhow!("notification channel closed"))
    }
}

#[derive(Debug, Clone)]
pub struct ProactiveEvaluator {
    pub valence_threshold: f32,
    pub warmth_threshold: f32,
}

impl Default for ProactiveEvaluator {
    fn default() -> Self {
        Self {
            valence_threshold: -0.3,
            warmth_threshold: 0.6,
        }
    }
}

impl ProactiveEvaluator {
    /// A check-in message when one is warranted.
    pub fn evaluate(&self, state: &LimbicState) -> Option<String> {
        if state.flags.door_slam_active {
            return None;
        }
        if state.flags.crisis_active {
            return Some("Checking in on you. You don't have to go through this alone.".to_string());
        }
        (state.valence < self.valence_threshold && state.warmth > self.warmth_threshold)
            .then(|| "Hey, just checking in. How are you holding up?".to_string())
    }
}
