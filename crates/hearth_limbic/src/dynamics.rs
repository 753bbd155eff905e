//! Limbic state dynamics.
//!
//! Updates are asymptotic: a positive delta closes a fraction of the gap to
//! the upper bound, a negative delta a fraction of the gap to the lower bound.
//! The value approaches its limits but cannot cross them. At a bound, a push
//! toward that bound has no effect.

use chrono::{DateTime, Utc};
use hearth_core::config::LimbicConfig;
use hearth_core::{LimbicDelta, LimbicState, Posture};

/// Elastic mode multiplies every delta by this before application.
pub const ELASTIC_MULTIPLIER: f32 = 3.0;

/// `current + Δ·(1−current)` for Δ>0, `current + Δ·current` otherwise.
/// `current` in [0, 1]; Δ is clamped to [-1, 1].
pub fn asymptotic(current: f32, delta: f32) -> f32 {
    let delta = if delta.is_finite() { delta.clamp(-1.0, 1.0) } else { 0.0 };
    let next = if delta > 0.0 {
        current + delta * (1.0 - current)
    } else {
        current + delta * current
    };
    next.clamp(0.0, 1.0)
}

/// Same rule for a [-1, 1] variable: normalize, update, map back.
pub fn asymptotic_bipolar(current: f32, delta: f32) -> f32 {
    let normalized = (current + 1.0) / 2.0;
    (asymptotic(normalized, delta) * 2.0 - 1.0).clamp(-1.0, 1.0)
}

/// Apply the elastic multiplier, then clamp so the tripled delta still
/// cannot cross a bound.
pub fn effective_delta(delta: f32, elastic: bool) -> f32 {
    if !delta.is_finite() {
        return 0.0;
    }
    let scaled = if elastic { delta * ELASTIC_MULTIPLIER } else { delta };
    scaled.clamp(-1.0, 1.0)
}

// =============================================================================
// Decay
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DecayConfig {
    pub arousal_floor: f32,
    pub arousal_decay_per_day: f32,
    pub valence_baseline: f32,
    pub valence_drift_per_hour: f32,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self::from(&LimbicConfig::default())
    }
}

impl From<&LimbicConfig> for DecayConfig {
    fn from(cfg: &LimbicConfig) -> Self {
        Self {
            arousal_floor: cfg.arousal_floor.clamp(0.0, 1.0),
            arousal_decay_per_day: cfg.arousal_decay_per_day.clamp(0.0, 1.0),
            valence_baseline: cfg.valence_baseline.clamp(-1.0, 1.0),
            valence_drift_per_hour: cfg.valence_drift_per_hour.max(0.0),
        }
    }
}

/// Move `current` toward `target` by keeping `factor` of the remaining gap.
/// The result stays between the two, whatever the rounding.
fn approach(current: f32, target: f32, factor: f64) -> f32 {
    let factor = factor.clamp(0.0, 1.0);
    let next = target as f64 + (current as f64 - target as f64) * factor;
    let (lo, hi) = if current <= target { (current, target) } else { (target, current) };
    (next as f32).clamp(lo, hi)
}

// =============================================================================
// Engine
// =============================================================================

/// Stateless update engine. The caller owns the state and the lock.
#[derive(Debug, Clone, Default)]
pub struct LimbicDynamics {
    decay: DecayConfig,
}

impl LimbicDynamics {
    pub fn new(decay: DecayConfig) -> Self {
        Self { decay }
    }

    pub fn decay_config(&self) -> &DecayConfig {
        &self.decay
    }

    pub fn apply_delta(&self, state: &mut LimbicState, delta: &LimbicDelta) {
        let elastic = state.flags.elastic_mode;
        state.trust = asymptotic(state.trust, effective_delta(delta.trust, elastic));
        state.warmth = asymptotic(state.warmth, effective_delta(delta.warmth, elastic));
        state.arousal = asymptotic(state.arousal, effective_delta(delta.arousal, elastic));
        state.valence = asymptotic_bipolar(state.valence, effective_delta(delta.valence, elastic));

        if let Some(posture) = delta.force_posture {
            state.posture = posture;
            state.posture_forced = true;
        }
        state.normalize();
    }

    /// Passive decay over the time since the later of the last interaction
    /// and the last decay. Returns false when no time has elapsed.
    pub fn decay(&self, state: &mut LimbicState, now: DateTime<Utc>) -> bool {
        let anchor = state.decay_anchor();
        let elapsed_ms = (now - anchor).num_milliseconds();
        if elapsed_ms <= 0 {
            return false;
        }
        let hours = elapsed_ms as f64 / 3_600_000.0;
        let days = hours / 24.0;

        let arousal_factor = (1.0 - self.decay.arousal_decay_per_day as f64).powf(days);
        state.arousal = approach(state.arousal, self.decay.arousal_floor, arousal_factor);

        let valence_factor = (-(self.decay.valence_drift_per_hour as f64) * hours).exp();
        state.valence = approach(state.valence, self.decay.valence_baseline, valence_factor);

        state.last_decay_ts = Some(now);
        state.normalize();
        true
    }

    /// Derive posture from load unless a forced posture is in effect.
    pub fn reevaluate_posture(&self, state: &mut LimbicState, load: f32) -> bool {
        if state.posture_forced {
            return false;
        }
        let next = Posture::from_load(load);
        let changed = next != state.posture;
        state.posture = next;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_asymptotic_growth_and_decline() {
        assert!((asymptotic(0.5, 0.5) - 0.75).abs() < 1e-6);
        assert!((asymptotic(0.5, -0.5) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_asymptotic_saturates_at_bounds() {
        assert_eq!(asymptotic(1.0, 0.9), 1.0);
        assert_eq!(asymptotic(0.0, -0.9), 0.0);
        // Full-strength delta lands exactly on the bound, never past it
        assert_eq!(asymptotic(0.3, 1.0), 1.0);
        assert_eq!(asymptotic(0.3, -1.0), 0.0);
    }

    #[test]
    fn test_bipolar_maps_through_unit_interval() {
        // 0.0 → 0.5 normalized → +0.5 delta → 0.75 → 0.5
        assert!((asymptotic_bipolar(0.0, 0.5) - 0.5).abs() < 1e-6);
        assert!((asymptotic_bipolar(0.0, -0.5) + 0.5).abs() < 1e-6);
        assert_eq!(asymptotic_bipolar(-1.0, -0.5), -1.0);
    }

    #[test]
    fn test_elastic_triples_then_clamps() {
        assert!((effective_delta(0.1, true) - 0.3).abs() < 1e-6);
        assert_eq!(effective_delta(0.6, true), 1.0);
        assert_eq!(effective_delta(f32::NAN, true), 0.0);
    }

    #[test]
    fn test_apply_delta_with_elastic_mode() {
        let engine = LimbicDynamics::default();
        let mut plain = LimbicState::default();
        let mut elastic = LimbicState::default();
        elastic.flags.elastic_mode = true;

        let delta = LimbicDelta { trust: 0.1, ..Default::default() };
        engine.apply_delta(&mut plain, &delta);
        engine.apply_delta(&mut elastic, &delta);

        // 0.5 + 0.1*0.5 = 0.55 vs 0.5 + 0.3*0.5 = 0.65
        assert!((plain.trust - 0.55).abs() < 1e-6);
        assert!((elastic.trust - 0.65).abs() < 1e-6);
    }

    #[test]
    fn test_forced_posture_sticks() {
        let engine = LimbicDynamics::default();
        let mut s = LimbicState::default();
        engine.apply_delta(&mut s, &LimbicDelta { force_posture: Some(Posture::Expert), ..Default::default() });
        assert_eq!(s.posture, Posture::Expert);
        assert!(!engine.reevaluate_posture(&mut s, 0.95));
        assert_eq!(s.posture, Posture::Expert);

        s.posture_forced = false;
        assert!(engine.reevaluate_posture(&mut s, 0.95));
        assert_eq!(s.posture, Posture::CoPilot);
    }

    #[test]
    fn test_decay_24_hours() {
        let engine = LimbicDynamics::default();
        let start = Utc::now() - Duration::hours(24);
        let mut s = LimbicState::bootstrap(start);
        s.arousal = 0.9;
        s.valence = -1.0;

        assert!(engine.decay(&mut s, start + Duration::hours(24)));
        // arousal: 0.2 + 0.7 * 0.5 = 0.55
        assert!((s.arousal - 0.55).abs() < 1e-4, "arousal = {}", s.arousal);
        // valence: -1 * e^(-1.2) ≈ -0.301
        assert!((s.valence + 0.3012).abs() < 1e-3, "valence = {}", s.valence);
    }

    #[test]
    fn test_decay_composes_without_double_counting() {
        let engine = LimbicDynamics::default();
        let start = Utc::now() - Duration::hours(48);

        let mut once = LimbicState::bootstrap(start);
        once.arousal = 1.0;
        once.valence = 0.8;
        let mut stepped = once.clone();

        engine.decay(&mut once, start + Duration::hours(12));
        for h in 1..=12 {
            engine.decay(&mut stepped, start + Duration::hours(h));
        }
        assert!((once.arousal - stepped.arousal).abs() < 1e-4);
        assert!((once.valence - stepped.valence).abs() < 1e-4);
    }

    #[test]
    fn test_decay_without_elapsed_time_is_noop() {
        let engine = LimbicDynamics::default();
        let now = Utc::now();
        let mut s = LimbicState::bootstrap(now);
        s.arousal = 0.9;
        assert!(!engine.decay(&mut s, now));
        assert_eq!(s.arousal, 0.9);
    }

    #[test]
    fn test_decay_below_floor_rises_to_floor_without_overshoot() {
        let engine = LimbicDynamics::default();
        let start = Utc::now() - Duration::days(30);
        let mut s = LimbicState::bootstrap(start);
        s.arousal = 0.0;
        engine.decay(&mut s, start + Duration::days(30));
        assert!(s.arousal <= 0.2 + 1e-6);
        assert!(s.arousal > 0.19);
    }
}
