//! # Hearth Limbic
//!
//! The bounded emotional-state machine.
//!
//! ## Architecture
//!
//! - [`dynamics`]: pure math. Asymptotic updates, time decay, posture derivation.
//! - [`LimbicStore`]: one JSON record, replaced atomically (temp file + rename).
//! - [`LimbicSystem`]: the single exclusive lock every mutation goes through,
//!   foreground turn or background decay alike. Each mutation is persisted
//!   before the lock is released, then broadcast on a watch channel.
//! - [`spawn_maintenance`]: periodic decay on an independent schedule.

pub mod dynamics;
mod heartbeat;
mod store;
mod system;

pub use dynamics::{DecayConfig, LimbicDynamics, ELASTIC_MULTIPLIER};
pub use heartbeat::{spawn_maintenance, MaintenanceConfig};
pub use store::LimbicStore;
pub use system::LimbicSystem;
