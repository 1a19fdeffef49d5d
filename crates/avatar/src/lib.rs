//! The player avatar.
//!
//! An [`Avatar`] owns a transform node with a camera at eye height. Enabling
//! physics gives it a rigid body and a [`MovementStrategy`] bound to the
//! camera it currently carries; controller events then drive the body.
//!
//! # Invariants
//! - Physics goes `NoPhysics -> Active` once and never back.
//! - Whenever the scene's active camera changes, that camera is parented to the
//!   avatar and movement is rebound to it.
//! - A trigger pull fires at most one projectile until the trigger is fully
//!   released.

mod avatar;
mod fire;
mod movement;

pub use avatar::{Avatar, AvatarConfig, AvatarError, AvatarEvent, AvatarKind, PhysicsState};
pub use fire::{FireControl, WeaponConfig};
pub use movement::{
    AxisSign, BasicMovement, ImmersiveMovement, Motion, MovementConfig, MovementStrategy, deadzone,
};

pub fn crate_info() -> &'static str {
    "xrspace-avatar v0.1.0"
}
