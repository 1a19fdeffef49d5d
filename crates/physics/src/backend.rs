use glam::Vec3;
use xrspace_common::Transform;

use crate::body::{BodyDesc, BodyHandle};

/// Errors from physics operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PhysicsError {
    #[error("unknown body: {0:?}")]
    UnknownBody(BodyHandle),
    #[error("invalid body description: {0}")]
    InvalidBody(String),
    #[error("physics backend failed to initialize: {0}")]
    Initialization(String),
}

/// A contact reported by the backend during a step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CollisionEvent {
    /// `body` started touching `other`. `other` is `None` for the ground plane.
    Started {
        body: BodyHandle,
        other: Option<BodyHandle>,
        point: Vec3,
    },
}

impl CollisionEvent {
    pub fn body(&self) -> BodyHandle {
        match self {
            Self::Started { body, .. } => *body,
        }
    }
}

/// The interface the scene and avatar use to drive a physics engine.
///
/// All calls happen on the single render/event thread.
pub trait PhysicsBackend {
    /// World gravity before per-body gravity factors.
    fn gravity(&self) -> Vec3;

    /// Create a body at `at` (scale is ignored).
    fn add_body(&mut self, desc: BodyDesc, at: Transform) -> Result<BodyHandle, PhysicsError>;

    /// Remove a body. Returns false if it did not exist.
    fn remove_body(&mut self, body: BodyHandle) -> bool;

    fn contains(&self, body: BodyHandle) -> bool;

    fn body_count(&self) -> usize;

    fn desc(&self, body: BodyHandle) -> Result<BodyDesc, PhysicsError>;

    fn transform(&self, body: BodyHandle) -> Result<Transform, PhysicsError>;

    /// Teleport a body. Velocities are kept.
    fn set_transform(&mut self, body: BodyHandle, to: Transform) -> Result<(), PhysicsError>;

    fn linear_velocity(&self, body: BodyHandle) -> Result<Vec3, PhysicsError>;

    fn set_linear_velocity(&mut self, body: BodyHandle, velocity: Vec3)
    -> Result<(), PhysicsError>;

    fn angular_velocity(&self, body: BodyHandle) -> Result<Vec3, PhysicsError>;

    fn set_angular_velocity(
        &mut self,
        body: BodyHandle,
        velocity: Vec3,
    ) -> Result<(), PhysicsError>;

    /// Accumulate `force` applied at world-space `point` until the next step.
    fn apply_force(&mut self, body: BodyHandle, force: Vec3, point: Vec3)
    -> Result<(), PhysicsError>;

    fn set_collision_callbacks(&mut self, body: BodyHandle, enabled: bool)
    -> Result<(), PhysicsError>;

    /// Advance the simulation by `dt` seconds and report contacts that started.
    fn step(&mut self, dt: f32) -> Vec<CollisionEvent>;
}
