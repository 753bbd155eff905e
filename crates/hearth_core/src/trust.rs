//! Trust tiers.
//!
//! The tier is never stored. It is recomputed from the trust scalar on every
//! read so the two can never disagree.

use serde::{Deserialize, Serialize};
use std::fmt;

pub const ASSOCIATE_THRESHOLD: f32 = 0.6;
pub const PARTNER_THRESHOLD: f32 = 0.8;
pub const SURROGATE_THRESHOLD: f32 = 0.9;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustTier {
    /// [0.0, 0.6): read-only
    Stranger,
    /// [0.6, 0.8): reads, plus writes inside the whitelist
    Associate,
    /// [0.8, 0.9): reads, writes, commits, sandboxed shell; writes are snapshotted
    Partner,
    /// [0.9, 1.0]: unrestricted
    Surrogate,
}

impl TrustTier {
    pub fn from_trust(trust: f32) -> Self {
        if !trust.is_finite() {
            return TrustTier::Stranger;
        }
        if trust >= SURROGATE_THRESHOLD {
            TrustTier::Surrogate
        } else if trust >= PARTNER_THRESHOLD {
            TrustTier::Partner
        } else if trust >= ASSOCIATE_THRESHOLD {
            TrustTier::Associate
        } else {
            TrustTier::Stranger
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustTier::Stranger => "stranger",
            TrustTier::Associate => "associate",
            TrustTier::Partner => "partner",
            TrustTier::Surrogate => "surrogate",
        }
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
