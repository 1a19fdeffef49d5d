use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Opaque handle to a body owned by a [`crate::PhysicsBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyHandle(pub u64);

/// How the backend moves a body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MotionType {
    /// Moved by forces, gravity and contacts.
    #[default]
    Dynamic,
    /// Moved only by its velocities; ignores forces and gravity.
    Kinematic,
    /// Never moves.
    Static,
}

/// How two material values are combined at a contact. When the two sides
/// disagree, the rule ranked higher in Average < Minimum < Multiply < Maximum wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CombineMode {
    #[default]
    Average,
    Minimum,
    Maximum,
    Multiply,
}

/// Collision shape, centered on the body origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Sphere { radius: f32 },
    Cylinder { radius: f32, height: f32 },
    Box { half_extents: [f32; 3] },
}

impl Default for Shape {
    fn default() -> Self {
        Self::Box {
            half_extents: [0.5, 0.5, 0.5],
        }
    }
}

/// Everything needed to create a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyDesc {
    pub shape: Shape,
    pub mass: f32,
    /// Principal moments of inertia. Zero on an axis locks rotation from torque
    /// about that axis.
    pub inertia: Vec3,
    pub gravity_factor: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub friction: f32,
    pub restitution: f32,
    pub restitution_combine: CombineMode,
    pub motion_type: MotionType,
    pub collision_callbacks: bool,
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            shape: Shape::default(),
            mass: 1.0,
            inertia: Vec3::ONE,
            gravity_factor: 1.0,
            linear_damping: 0.0,
            angular_damping: 0.1,
            friction: 0.5,
            restitution: 0.0,
            restitution_combine: CombineMode::Average,
            motion_type: MotionType::Dynamic,
            collision_callbacks: false,
        }
    }
}

impl BodyDesc {
    pub fn sphere(radius: f32, mass: f32) -> Self {
        Self {
            shape: Shape::Sphere { radius },
            mass,
            ..Self::default()
        }
    }

    pub fn fixed(shape: Shape) -> Self {
        Self {
            shape,
            mass: 0.0,
            motion_type: MotionType::Static,
            ..Self::default()
        }
    }
}
