//! Periodic maintenance for the limbic system
//!
//! Decay runs on its own schedule, independent of conversation turns. It
//! takes the same lock as turn updates, so the two never interleave.

use crate::system::LimbicSystem;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct MaintenanceConfig {
    /// How often decay is applied (default: 5 minutes)
    pub interval: Duration,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
        }
    }
}

impl MaintenanceConfig {
    pub fn from_secs(secs: u64) -> Self {
        Self {
            interval: Duration::from_secs(secs.max(1)),
        }
    }

    /// Very fast maintenance for testing
    pub fn testing() -> Self {
        Self {
            interval: Duration::from_millis(10),
        }
    }
}

/// Spawn the decay loop. Abort the handle to stop it.
pub fn spawn_maintenance(limbic: Arc<LimbicSystem>, config: MaintenanceConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let state = limbic.decay().await;
            tracing::trace!("Maintenance tick {}", state.describe());
        }
    })
}
