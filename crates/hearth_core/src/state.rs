//! Limbic state: the bounded emotional variables that drive tone and behavior.
//!
//! - `trust`, `warmth`, `arousal` live in [0, 1]
//! - `valence` lives in [-1, 1]
//!
//! Every mutation path ends in [`LimbicState::normalize`], so a record read
//! back from disk or produced by arithmetic never leaves its range.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Guard against NaN and Infinity in state values.
/// If the value is not finite, replace it with the bootstrap default.
#[inline]
pub fn sanitize_f32(v: f32, fallback: f32) -> f32 {
    if v.is_finite() {
        v
    } else {
        tracing::warn!("NaN/Inf detected in limbic state, resetting to fallback {}", fallback);
        fallback
    }
}

/// Deserialize an f32, mapping `null` and non-numeric garbage to NaN so the
/// caller's `normalize()` can replace it with the default.
pub fn deserialize_safe_f32<'de, D>(deserializer: D) -> Result<f32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64().map(|v| v as f32).unwrap_or(f32::NAN))
}

pub const DEFAULT_TRUST: f32 = 0.5;
pub const DEFAULT_WARMTH: f32 = 0.5;
pub const DEFAULT_AROUSAL: f32 = 0.3;
pub const DEFAULT_VALENCE: f32 = 0.0;

// =============================================================================
// Posture
// =============================================================================

/// Behavioral / tonal mode selected per turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    #[default]
    Companion,
    CoPilot,
    Peer,
    Expert,
}

pub const POSTURE_COMPANION_LOAD: f32 = 0.5;
pub const POSTURE_COPILOT_LOAD: f32 = 0.8;

impl Posture {
    /// Derive a posture from a cognitive-load scalar.
    ///
    /// `Expert` is never derived, only forced.
    pub fn from_load(load: f32) -> Self {
        let load = if load.is_finite() { load } else { 0.0 };
        if load >= POSTURE_COPILOT_LOAD {
            Posture::CoPilot
        } else if load >= POSTURE_COMPANION_LOAD {
            Posture::Companion
        } else {
            Posture::Peer
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Posture::Companion => "companion",
            Posture::CoPilot => "co_pilot",
            Posture::Peer => "peer",
            Posture::Expert => "expert",
        }
    }
}

impl fmt::Display for Posture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// LimbicState
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimbicFlags {
    /// Triples update magnitude (onboarding-style rapid convergence).
    pub elastic_mode: bool,
    pub crisis_active: bool,
    pub door_slam_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimbicState {
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub trust: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub warmth: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub arousal: f32,
    #[serde(deserialize_with = "deserialize_safe_f32")]
    pub valence: f32,

    #[serde(default)]
    pub posture: Posture,
    /// Set when the posture was forced; load-derived re-evaluation leaves it alone.
    #[serde(default)]
    pub posture_forced: bool,

    pub last_interaction_ts: DateTime<Utc>,
    #[serde(default)]
    pub last_decay_ts: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interaction_count: u64,

    #[serde(default)]
    pub flags: LimbicFlags,
}

impl Default for LimbicState {
    fn default() -> Self {
        Self::bootstrap(Utc::now())
    }
}

impl LimbicState {
    /// Fresh state as created on first start.
    pub fn bootstrap(now: DateTime<Utc>) -> Self {
        Self {
            trust: DEFAULT_TRUST,
            warmth: DEFAULT_WARMTH,
            arousal: DEFAULT_AROUSAL,
            valence: DEFAULT_VALENCE,
            posture: Posture::default(),
            posture_forced: false,
            last_interaction_ts: now,
            last_decay_ts: None,
            interaction_count: 0,
            flags: LimbicFlags::default(),
        }
    }

    /// Sanitize and clamp all fields to valid ranges.
    pub fn normalize(&mut self) {
        self.trust = sanitize_f32(self.trust, DEFAULT_TRUST).clamp(0.0, 1.0);
        self.warmth = sanitize_f32(self.warmth, DEFAULT_WARMTH).clamp(0.0, 1.0);
        self.arousal = sanitize_f32(self.arousal, DEFAULT_AROUSAL).clamp(0.0, 1.0);
        self.valence = sanitize_f32(self.valence, DEFAULT_VALENCE).clamp(-1.0, 1.0);
    }

    pub fn is_within_bounds(&self) -> bool {
        (0.0..=1.0).contains(&self.trust)
            && (0.0..=1.0).contains(&self.warmth)
            && (0.0..=1.0).contains(&self.arousal)
            && (-1.0..=1.0).contains(&self.valence)
    }

    pub fn tier(&self) -> crate::TrustTier {
        crate::TrustTier::from_trust(self.trust)
    }

    /// Start of the window the next decay should cover.
    pub fn decay_anchor(&self) -> DateTime<Utc> {
        match self.last_decay_ts {
            Some(ts) if ts > self.last_interaction_ts => ts,
            _ => self.last_interaction_ts,
        }
    }

    /// Short one-line summary for prompts and logs.
    pub fn describe(&self) -> String {
        format!(
            "[limbic: T={:.2} W={:.2} A={:.2} V={:+.2} posture={}]",
            self.trust, self.warmth, self.arousal, self.valence, self.posture
        )
    }
}

/// Requested change to the limbic variables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimbicDelta {
    pub trust: f32,
    pub warmth: f32,
    pub arousal: f32,
    pub valence: f32,
    pub force_posture: Option<Posture>,
}

impl LimbicDelta {
    pub fn is_zero(&self) -> bool {
        self.trust == 0.0
            && self.warmth == 0.0
            && self.arousal == 0.0
            && self.valence == 0.0
            && self.force_posture.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_defaults() {
        let s = LimbicState::default();
        assert_eq!(s.trust, DEFAULT_TRUST);
        assert_eq!(s.posture, Posture::Companion);
        assert_eq!(s.interaction_count, 0);
        assert!(!s.flags.elastic_mode);
        assert!(s.is_within_bounds());
    }

    #[test]
    fn test_normalize_replaces_nan_and_clamps() {
        let mut s = LimbicState::default();
        s.trust = f32::NAN;
        s.arousal = 4.0;
        s.valence = -7.0;
        s.normalize();
        assert_eq!(s.trust, DEFAULT_TRUST);
        assert_eq!(s.arousal, 1.0);
        assert_eq!(s.valence, -1.0);
    }

    #[test]
    fn test_null_field_deserializes_to_default() {
        let json = r#"{"trust":null,"warmth":0.4,"arousal":0.2,"valence":0.1,
            "last_interaction_ts":"2026-01-01T00:00:00Z"}"#;
        let mut s: LimbicState = serde_json::from_str(json).unwrap();
        s.normalize();
        assert_eq!(s.trust, DEFAULT_TRUST);
        assert!((s.warmth - 0.4).abs() < 1e-6);
        assert_eq!(s.posture, Posture::Companion);
        assert!(s.last_decay_ts.is_none());
    }

    #[test]
    fn test_non_numeric_field_resets_only_that_field() {
        let json = r#"{"trust":"high","warmth":0.4,"arousal":[1],"valence":0.1,
            "last_interaction_ts":"2026-01-01T00:00:00Z"}"#;
        let mut s: LimbicState = serde_json::from_str(json).unwrap();
        s.normalize();
        assert_eq!(s.trust, DEFAULT_TRUST);
        assert_eq!(s.arousal, DEFAULT_AROUSAL);
        assert!((s.warmth - 0.4).abs() < 1e-6);
        assert!((s.valence - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_posture_from_load_thresholds() {
        assert_eq!(Posture::from_load(0.0), Posture::Peer);
        assert_eq!(Posture::from_load(0.49), Posture::Peer);
        assert_eq!(Posture::from_load(0.5), Posture::Companion);
        assert_eq!(Posture::from_load(0.79), Posture::Companion);
        assert_eq!(Posture::from_load(0.8), Posture::CoPilot);
        assert_eq!(Posture::from_load(1.0), Posture::CoPilot);
        assert_eq!(Posture::from_load(f32::NAN), Posture::Peer);
    }

    #[test]
    fn test_decay_anchor_prefers_latest() {
        let now = Utc::now();
        let mut s = LimbicState::bootstrap(now - chrono::Duration::hours(5));
        assert_eq!(s.decay_anchor(), s.last_interaction_ts);
        s.last_decay_ts = Some(now);
        assert_eq!(s.decay_anchor(), now);
    }
}
