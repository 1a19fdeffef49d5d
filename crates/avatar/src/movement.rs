//! Stick-driven locomotion.
//!
//! Both strategies re-derive the avatar's velocity from the stick axes on every
//! stick event, rotate it into the bound camera's frame and push the result to
//! the avatar's body. Anything that is not a stick event with a two-axis
//! payload is ignored.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use xrspace_common::NodeId;
use xrspace_input::{ControllerEvent, ControllerEventKind};
use xrspace_physics::BodyHandle;
use xrspace_scene::Scene;

/// Per-axis multiplier applied after the deadzone.
///
/// Hardware reports a forward push as negative Y, so `y` is `-1` to make
/// forward push move the avatar along +Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisSign {
    pub x: f32,
    pub y: f32,
}

impl Default for AxisSign {
    fn default() -> Self {
        Self { x: 1.0, y: -1.0 }
    }
}

/// Tuning shared by the movement strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MovementConfig {
    /// Axis magnitudes strictly below this contribute nothing.
    pub deadzone: f32,
    pub speed_factor: f32,
    pub axis_sign: AxisSign,
    /// Yaw rate in rad/s at full right-stick deflection.
    pub turn_rate: f32,
}

impl MovementConfig {
    pub fn basic() -> Self {
        Self {
            deadzone: 0.2,
            speed_factor: 10.0,
            axis_sign: AxisSign::default(),
            turn_rate: 0.0,
        }
    }

    pub fn immersive() -> Self {
        Self {
            deadzone: 0.25,
            speed_factor: 2500.0,
            axis_sign: AxisSign::default(),
            turn_rate: 2.0,
        }
    }

    /// `0` inside the deadzone, `value * speed_factor * sign` outside it.
    /// A value exactly on the deadzone is live.
    pub fn scale(&self, value: f32, sign: f32) -> f32 {
        if deadzone(value, self.deadzone) == 0.0 {
            0.0
        } else {
            value * self.speed_factor * sign
        }
    }

    /// Yaw rate for a horizontal right-stick deflection.
    pub fn turn(&self, x: f32) -> f32 {
        deadzone(x, self.deadzone) * self.turn_rate
    }
}

impl Default for MovementConfig {
    fn default() -> Self {
        Self::immersive()
    }
}

/// Zero `value` when its magnitude is below `threshold`.
pub fn deadzone(value: f32, threshold: f32) -> f32 {
    if value.abs() < threshold { 0.0 } else { value }
}

/// What a strategy did to the body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Motion {
    /// Absolute linear velocity written to the body.
    Velocity(Vec3),
    /// Force applied at the body's position.
    Force(Vec3),
    /// Yaw rate written as the body's angular velocity.
    Turn(f32),
}

/// Turns stick events into body motion relative to a camera.
pub trait MovementStrategy {
    fn camera(&self) -> NodeId;

    fn body(&self) -> BodyHandle;

    /// Update `velocity` from `event` and apply it to the body.
    /// Returns `None` when the event was ignored.
    fn drive(&self, velocity: &mut Vec3, event: &ControllerEvent, scene: &mut Scene) -> Option<Motion>;
}

/// Free flight: left stick moves in the camera's frame, right stick climbs
/// and sinks. Writes absolute velocity.
#[derive(Debug, Clone)]
pub struct BasicMovement {
    body: BodyHandle,
    camera: NodeId,
    config: MovementConfig,
}

impl BasicMovement {
    pub fn new(body: BodyHandle, camera: NodeId, config: MovementConfig) -> Self {
        Self {
            body,
            camera,
            config,
        }
    }
}

impl MovementStrategy for BasicMovement {
    fn camera(&self) -> NodeId {
        self.camera
    }

    fn body(&self) -> BodyHandle {
        self.body
    }

    fn drive(&self, velocity: &mut Vec3, event: &ControllerEvent, scene: &mut Scene) -> Option<Motion> {
        let axes = event.axes()?;
        let sign = self.config.axis_sign;
        match event.kind {
            ControllerEventKind::LStick => {
                velocity.z = self.config.scale(axes.y, sign.y);
                velocity.x = self.config.scale(axes.x, sign.x);
            }
            ControllerEventKind::RStick => {
                velocity.y = self.config.scale(axes.y, sign.y);
            }
            _ => return None,
        }

        let facing = scene.world_transform(self.camera)?.rotation;
        let world = facing * *velocity;
        let physics = scene.physics_mut()?;
        if let Err(e) = physics.set_linear_velocity(self.body, world) {
            tracing::debug!(error = %e, "movement skipped");
            return None;
        }
        Some(Motion::Velocity(world))
    }
}

/// Grounded locomotion: left stick pushes the body along the floor, right
/// stick turns in place.
#[derive(Debug, Clone)]
pub struct ImmersiveMovement {
    body: BodyHandle,
    camera: NodeId,
    config: MovementConfig,
}

impl ImmersiveMovement {
    pub fn new(body: BodyHandle, camera: NodeId, config: MovementConfig) -> Self {
        Self {
            body,
            camera,
            config,
        }
    }
}

impl MovementStrategy for ImmersiveMovement {
    fn camera(&self) -> NodeId {
        self.camera
    }

    fn body(&self) -> BodyHandle {
        self.body
    }

    fn drive(&self, velocity: &mut Vec3, event: &ControllerEvent, scene: &mut Scene) -> Option<Motion> {
        let axes = event.axes()?;
        match event.kind {
            ControllerEventKind::LStick => {
                let sign = self.config.axis_sign;
                velocity.z = self.config.scale(axes.y, sign.y);
                velocity.x = self.config.scale(axes.x, sign.x);

                let facing = scene.world_transform(self.camera)?.rotation;
                let mut force = facing * *velocity;
                force.y = 0.0;

                let physics = scene.physics_mut()?;
                let result = physics
                    .transform(self.body)
                    .and_then(|at| physics.apply_force(self.body, force, at.position));
                if let Err(e) = result {
                    tracing::debug!(error = %e, "movement skipped");
                    return None;
                }
                Some(Motion::Force(force))
            }
            ControllerEventKind::RStick => {
                let yaw = self.config.turn(axes.x);
                let physics = scene.physics_mut()?;
                if let Err(e) = physics.set_angular_velocity(self.body, Vec3::new(0.0, yaw, 0.0)) {
                    tracing::debug!(error = %e, "turn skipped");
                    return None;
                }
                Some(Motion::Turn(yaw))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Quat, Vec2};
    use std::rc::Rc;
    use xrspace_common::Transform;
    use xrspace_input::{Handedness, XrInputSource};
    use xrspace_physics::{BodyDesc, PhysicsConfig, RapierBackend};
    use xrspace_scene::{CameraInfo, NodeKind};

    fn stick(kind: ControllerEventKind, x: f32, y: f32) -> ControllerEvent {
        let source = Rc::new(XrInputSource::new(0, kind.handedness()));
        ControllerEvent::stick(kind, Vec2::new(x, y), source)
    }

    fn rig(yaw: f32) -> (Scene, BodyHandle, NodeId) {
        let mut scene = Scene::new();
        scene.enable_physics(Box::new(RapierBackend::new(PhysicsConfig {
            gravity: Vec3::ZERO,
            ground_height: None,
            ..PhysicsConfig::default()
        })));
        let avatar = scene.add_node("avatar", NodeKind::Transform, Transform::default());
        let camera = scene.add_node(
            "camera",
            NodeKind::Camera(CameraInfo::default()),
            Transform {
                rotation: Quat::from_rotation_y(yaw),
                ..Transform::default()
            },
        );
        let body = scene.attach_body(avatar, BodyDesc::default()).unwrap();
        (scene, body, camera)
    }

    #[test]
    fn deadzone_is_inclusive_of_live_input() {
        let config = MovementConfig::basic();
        assert_eq!(config.scale(0.19, 1.0), 0.0);
        assert_eq!(config.scale(-0.19, 1.0), 0.0);
        assert_eq!(config.scale(0.2, 1.0), 2.0);
        assert_eq!(config.scale(-0.5, -1.0), 5.0);
    }

    #[test]
    fn sub_deadzone_stick_contributes_nothing() {
        let (mut scene, body, camera) = rig(0.0);
        let movement = BasicMovement::new(body, camera, MovementConfig::basic());
        let mut velocity = Vec3::new(3.0, 0.0, 3.0);

        let motion = movement.drive(&mut velocity, &stick(ControllerEventKind::LStick, 0.1, -0.19), &mut scene);

        assert_eq!(motion, Some(Motion::Velocity(Vec3::ZERO)));
        assert_eq!(velocity, Vec3::ZERO);
    }

    #[test]
    fn basic_forward_push_moves_along_camera_facing() {
        let (mut scene, body, camera) = rig(std::f32::consts::FRAC_PI_2);
        let movement = BasicMovement::new(body, camera, MovementConfig::basic());
        let mut velocity = Vec3::ZERO;

        movement.drive(&mut velocity, &stick(ControllerEventKind::LStick, 0.0, -1.0), &mut scene);

        assert_eq!(velocity, Vec3::new(0.0, 0.0, 10.0));
        // camera yawed a quarter turn: its forward is +X
        let written = scene.physics().unwrap().linear_velocity(body).unwrap();
        assert!((written - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn basic_right_stick_climbs() {
        let (mut scene, body, camera) = rig(0.0);
        let movement = BasicMovement::new(body, camera, MovementConfig::basic());
        let mut velocity = Vec3::ZERO;

        movement.drive(&mut velocity, &stick(ControllerEventKind::RStick, 0.9, -0.5), &mut scene);

        assert_eq!(velocity, Vec3::new(0.0, 5.0, 0.0));
    }

    #[test]
    fn immersive_push_is_flattened_force() {
        let (mut scene, body, camera) = rig(0.0);
        // pitch the camera down; the push must stay horizontal
        scene
            .graph_mut()
            .set_local(
                camera,
                Transform {
                    rotation: Quat::from_rotation_x(0.5),
                    ..Transform::default()
                },
            )
            .unwrap();
        let movement = ImmersiveMovement::new(body, camera, MovementConfig::immersive());
        let mut velocity = Vec3::ZERO;

        let motion = movement.drive(&mut velocity, &stick(ControllerEventKind::LStick, 0.0, -1.0), &mut scene);

        let Some(Motion::Force(force)) = motion else {
            panic!("expected a force, got {motion:?}");
        };
        assert_eq!(force.y, 0.0);
        assert!(force.z > 0.0);
        scene.step(0.01);
        assert!(scene.physics().unwrap().linear_velocity(body).unwrap().z > 0.0);
    }

    #[test]
    fn immersive_right_stick_turns_in_place() {
        let (mut scene, body, camera) = rig(0.0);
        let movement = ImmersiveMovement::new(body, camera, MovementConfig::immersive());
        let mut velocity = Vec3::ZERO;

        let motion = movement.drive(&mut velocity, &stick(ControllerEventKind::RStick, 1.0, 0.0), &mut scene);

        assert_eq!(motion, Some(Motion::Turn(2.0)));
        assert_eq!(velocity, Vec3::ZERO);
        assert_eq!(
            scene.physics().unwrap().angular_velocity(body).unwrap(),
            Vec3::new(0.0, 2.0, 0.0)
        );
    }

    #[test]
    fn non_stick_events_are_ignored() {
        let (mut scene, body, camera) = rig(0.0);
        let movement = BasicMovement::new(body, camera, MovementConfig::basic());
        let mut velocity = Vec3::ONE;
        let source = Rc::new(XrInputSource::new(0, Handedness::Right));
        let trigger = ControllerEvent::button(
            ControllerEventKind::RTrigger,
            xrspace_input::ButtonChange {
                pressed: true,
                value: 1.0,
            },
            source,
        );

        assert_eq!(movement.drive(&mut velocity, &trigger, &mut scene), None);
        assert_eq!(
            movement.drive(&mut velocity, &stick(ControllerEventKind::Other, 1.0, 1.0), &mut scene),
            None
        );
        assert_eq!(velocity, Vec3::ONE);
    }
}
