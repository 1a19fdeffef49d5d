//! Physics seam for the avatar and scene.
//!
//! This crate fixes the interface the rest of the workspace drives
//! ([`PhysicsBackend`]) and implements it with [`RapierBackend`]. Consumers
//! never see rapier types.
//!
//! # Invariants
//! - Bodies are addressed only by [`BodyHandle`]; handles are never reused.
//! - Forces accumulate until the next [`PhysicsBackend::step`] and are then cleared.
//! - Collision-start events are reported once per contact, and only for bodies
//!   with collision callbacks enabled.

mod backend;
mod body;
mod rapier;

pub use backend::{CollisionEvent, PhysicsBackend, PhysicsError};
pub use body::{BodyDesc, BodyHandle, CombineMode, MotionType, Shape};
pub use rapier::{PhysicsConfig, RapierBackend};

pub use rapier3d;

pub fn crate_info() -> &'static str {
    "xrspace-physics v0.1.0"
}
