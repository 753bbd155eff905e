//! The limbic system: the one owner of the live state.
//!
//! Every read-modify-write (turn updates, interaction bookkeeping, periodic
//! decay, posture and flag changes) runs under a single async mutex, and the
//! new record is persisted before the lock is released. Readers that only
//! need the latest value subscribe to the watch channel instead of locking.

use crate::dynamics::LimbicDynamics;
use crate::store::LimbicStore;
use chrono::{DateTime, Utc};
use hearth_core::{LimbicDelta, LimbicFlags, LimbicState, TrustTier};
use tokio::sync::{watch, Mutex};

pub struct LimbicSystem {
    state: Mutex<LimbicState>,
    store: LimbicStore,
    dynamics: LimbicDynamics,
    state_watch_tx: watch::Sender<LimbicState>,
    state_watch_rx: watch::Receiver<LimbicState>,
}

impl LimbicSystem {
    /// Load (or bootstrap) the state from `store`.
    pub async fn open(store: LimbicStore, dynamics: LimbicDynamics) -> Self {
        let initial = store.load().await;
        tracing::info!("Limbic system online {}", initial.describe());
        let (state_watch_tx, state_watch_rx) = watch::channel(initial.clone());
        Self {
            state: Mutex::new(initial),
            store,
            dynamics,
            state_watch_tx,
            state_watch_rx,
        }
    }

    /// Current state, copied out.
    pub async fn snapshot(&self) -> LimbicState {
        self.state.lock().await.clone()
    }

    /// Live tier. Always derived from the current trust, never cached.
    pub async fn tier(&self) -> TrustTier {
        self.state.lock().await.tier()
    }

    pub async fn trust(&self) -> f32 {
        self.state.lock().await.trust
    }

    pub fn subscribe(&self) -> watch::Receiver<LimbicState> {
        self.state_watch_rx.clone()
    }

    pub fn dynamics(&self) -> &LimbicDynamics {
        &self.dynamics
    }

    /// Apply a delta without touching interaction bookkeeping.
    pub async fn update(&self, delta: LimbicDelta) -> LimbicState {
        self.mutate("update", |state, dynamics| dynamics.apply_delta(state, &delta))
            .await
    }

    /// Apply a delta as the result of a user turn: bumps the interaction
    /// counter and resets the decay anchor.
    pub async fn register_interaction(&self, delta: LimbicDelta) -> LimbicState {
        self.register_interaction_with(delta, |_| {}).await
    }

    /// Same as [`register_interaction`](Self::register_interaction), also
    /// updating flags in the same write.
    pub async fn register_interaction_with(
        &self,
        delta: LimbicDelta,
        flags: impl FnOnce(&mut LimbicFlags),
    ) -> LimbicState {
        let now = Utc::now();
        self.mutate("interaction", |state, dynamics| {
            flags(&mut state.flags);
            dynamics.apply_delta(state, &delta);
            state.interaction_count = state.interaction_count.saturating_add(1);
            state.last_interaction_ts = now;
        })
        .await
    }

    pub async fn decay(&self) -> LimbicState {
        self.decay_at(Utc::now()).await
    }

    /// Decay as of `now`. A no-op (and no write) when no time has passed.
    pub async fn decay_at(&self, now: DateTime<Utc>) -> LimbicState {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        if !self.dynamics.decay(&mut next, now) {
            return next;
        }
        self.commit(&mut guard, next, "decay").await
    }

    /// Re-derive posture from cognitive load. Ignored while a posture is forced.
    pub async fn reevaluate_posture(&self, load: f32) -> LimbicState {
        self.mutate("posture", |state, dynamics| {
            if dynamics.reevaluate_posture(state, load) {
                tracing::debug!("Posture shifted to {} (load {:.2})", state.posture, load);
            }
        })
        .await
    }

    /// Lift a forced posture so load-derived re-evaluation applies again.
    pub async fn release_posture(&self) -> LimbicState {
        self.mutate("posture", |state, _| state.posture_forced = false).await
    }

    pub async fn set_elastic_mode(&self, enabled: bool) -> LimbicState {
        self.set_flags(|flags| flags.elastic_mode = enabled).await
    }

    pub async fn set_flags(&self, f: impl FnOnce(&mut LimbicFlags)) -> LimbicState {
        self.mutate("flags", |state, _| f(&mut state.flags)).await
    }

    async fn mutate(
        &self,
        reason: &str,
        f: impl FnOnce(&mut LimbicState, &LimbicDynamics),
    ) -> LimbicState {
        let mut guard = self.state.lock().await;
        let mut next = guard.clone();
        f(&mut next, &self.dynamics);
        self.commit(&mut guard, next, reason).await
    }

    /// Persist then publish. A failed write is logged; the in-memory state
    /// still advances so the conversation is not blocked on the disk.
    async fn commit(
        &self,
        guard: &mut tokio::sync::MutexGuard<'_, LimbicState>,
        mut next: LimbicState,
        reason: &str,
    ) -> LimbicState {
        next.normalize();
        if let Err(e) = self.store.save(&next).await {
            tracing::error!("Failed to persist limbic state after {reason}: {e:#}");
        }
        **guard = next.clone();
        self.state_watch_tx.send_replace(next.clone());
        tracing::trace!("Limbic {reason}: {}", next.describe());
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use hearth_core::Posture;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn system(dir: &TempDir) -> LimbicSystem {
        LimbicSystem::open(
            LimbicStore::new(dir.path().join("limbic_state.json")),
            LimbicDynamics::default(),
        )
        .await
    }

    #[tokio::test]
    async fn test_update_persists_before_returning() {
        let dir = TempDir::new().unwrap();
        let sys = system(&dir).await;
        let after = sys.update(LimbicDelta { trust: 0.5, ..Default::default() }).await;
        assert!((after.trust - 0.75).abs() < 1e-6);

        let reopened = system(&dir).await;
        assert_eq!(reopened.snapshot().await, after);
    }

    #[tokio::test]
    async fn test_register_interaction_bumps_count() {
        let dir = TempDir::new().unwrap();
        let sys = system(&dir).await;
        let before = sys.snapshot().await;
        let after = sys.register_interaction(LimbicDelta::default()).await;
        assert_eq!(after.interaction_count, before.interaction_count + 1);
        assert!(after.last_interaction_ts >= before.last_interaction_ts);
    }

    #[tokio::test]
    async fn test_tier_follows_trust_immediately() {
        let dir = TempDir::new().unwrap();
        let sys = system(&dir).await;
        assert_eq!(sys.tier().await, TrustTier::Stranger);
        sys.update(LimbicDelta { trust: 0.4, ..Default::default() }).await;
        // 0.5 + 0.4*0.5 = 0.7
        assert_eq!(sys.tier().await, TrustTier::Associate);
    }

    #[tokio::test]
    async fn test_forced_posture_until_released() {
        let dir = TempDir::new().unwrap();
        let sys = system(&dir).await;
        sys.update(LimbicDelta { force_posture: Some(Posture::Expert), ..Default::default() })
            .await;
        assert_eq!(sys.reevaluate_posture(0.1).await.posture, Posture::Expert);
        sys.release_posture().await;
        assert_eq!(sys.reevaluate_posture(0.1).await.posture, Posture::Peer);
    }

    #[tokio::test]
    async fn test_decay_at_same_instant_is_noop() {
        let dir = TempDir::new().unwrap();
        let sys = system(&dir).await;
        let s = sys.snapshot().await;
        let after = sys.decay_at(s.last_interaction_ts).await;
        assert_eq!(after, s);
    }

    #[tokio::test]
    async fn test_decay_moves_arousal_toward_floor() {
        let dir = TempDir::new().unwrap();
        let sys = system(&dir).await;
        let s = sys.update(LimbicDelta { arousal: 0.8, ..Default::default() }).await;
        let later = sys.decay_at(s.last_interaction_ts + Duration::hours(24)).await;
        assert!(later.arousal < s.arousal);
        assert!(later.arousal >= 0.2);
    }

    #[tokio::test]
    async fn test_watch_channel_sees_updates() {
        let dir = TempDir::new().unwrap();
        let sys = system(&dir).await;
        let mut rx = sys.subscribe();
        sys.set_elastic_mode(true).await;
        rx.changed().await.unwrap();
        assert!(rx.borrow().flags.elastic_mode);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_serialized() {
        let dir = TempDir::new().unwrap();
        let sys = Arc::new(system(&dir).await);
        let mut handles = Vec::new();
        for _ in 0..20 {
            let sys = Arc::clone(&sys);
            handles.push(tokio::spawn(async move {
                sys.register_interaction(LimbicDelta { trust: 0.01, ..Default::default() })
                    .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let s = sys.snapshot().await;
        assert_eq!(s.interaction_count, 20);
        assert!(s.is_within_bounds());

        let persisted = system(&dir).await.snapshot().await;
        assert_eq!(persisted.interaction_count, 20);
    }
}
