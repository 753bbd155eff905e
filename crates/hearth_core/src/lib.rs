//! # Hearth Core
//!
//! Types shared by every layer of the cognitive core:
//!
//! - [`LimbicState`]: the bounded emotional-variable tuple and its posture
//! - [`TrustTier`]: the discrete permission level derived from trust
//! - [`PermissionMatrix`]: tier-gated authorization of autonomous actions
//! - [`HearthConfig`]: TOML configuration with env overrides
//! - [`HearthError`]: the error taxonomy surfaced across crate boundaries

pub mod capability;
pub mod config;
pub mod error;
pub mod safety;
pub mod sentiment;
pub mod state;
pub mod trust;

pub use capability::{Capability, CapabilitySet};
pub use config::HearthConfig;
pub use error::{HearthError, HearthResult};
pub use safety::{ActionType, PermissionDecision, PermissionMatrix};
pub use state::{LimbicDelta, LimbicFlags, LimbicState, Posture};
pub use trust::TrustTier;
