use std::cell::RefCell;
use std::rc::{Rc, Weak};

use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};
use xrspace_common::{NodeId, Observable, Subscription, SubscriptionSet, Transform};
use xrspace_input::{ControllerEvent, ControllerEventKind};
use xrspace_physics::{BodyDesc, BodyHandle, CombineMode, MotionType, Shape};
use xrspace_scene::{
    CameraInfo, Color, EnvironmentBuilder, MeshInfo, NodeCollision, NodeKind, Primitive, Scene,
    SceneError, SceneHandle, WeakScene,
};

use crate::fire::{FireControl, WeaponConfig};
use crate::movement::{BasicMovement, ImmersiveMovement, Motion, MovementConfig, MovementStrategy};

#[derive(Debug, thiserror::Error)]
pub enum AvatarError {
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error("scene has been dropped")]
    SceneDropped,
    #[error("avatar has been disposed")]
    Disposed,
}

/// Which locomotion and body the avatar uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarKind {
    /// Falls under gravity, pushes along the floor, turns in place, fires.
    #[default]
    Immersive,
    /// Weightless free flight.
    Basic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AvatarConfig {
    pub kind: AvatarKind,
    pub start: Vec3,
    /// Camera offset above the avatar's origin.
    pub eye_height: f32,
    pub movement: MovementConfig,
    pub body: BodyDesc,
    /// `None` disables firing.
    pub weapon: Option<WeaponConfig>,
    /// Zero pitch and roll after every physics step.
    pub upright: bool,
}

impl AvatarConfig {
    pub fn immersive() -> Self {
        Self {
            kind: AvatarKind::Immersive,
            start: Vec3::new(0.0, 25.0, -5.0),
            eye_height: 1.6,
            movement: MovementConfig::immersive(),
            body: BodyDesc {
                shape: Shape::Cylinder {
                    radius: 0.5,
                    height: 0.1,
                },
                mass: 100.0,
                inertia: Vec3::ZERO,
                gravity_factor: 3.0,
                linear_damping: 0.4,
                angular_damping: 0.9,
                friction: 0.1,
                restitution: 0.0,
                restitution_combine: CombineMode::Minimum,
                motion_type: MotionType::Dynamic,
                collision_callbacks: true,
            },
            weapon: Some(WeaponConfig::default()),
            upright: false,
        }
    }

    pub fn basic() -> Self {
        Self {
            kind: AvatarKind::Basic,
            start: Vec3::new(0.0, 1.0, -5.0),
            eye_height: 1.6,
            movement: MovementConfig::basic(),
            body: BodyDesc {
                shape: Shape::Cylinder {
                    radius: 0.5,
                    height: 1.6,
                },
                mass: 100.0,
                gravity_factor: 0.0,
                ..BodyDesc::default()
            },
            weapon: None,
            upright: false,
        }
    }

    pub fn for_kind(kind: AvatarKind) -> Self {
        match kind {
            AvatarKind::Immersive => Self::immersive(),
            AvatarKind::Basic => Self::basic(),
        }
    }
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self::immersive()
    }
}

/// Published on [`Avatar::events`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AvatarEvent {
    Moved { motion: Motion },
    Turned { yaw_rate: f32 },
    Fired { bullet: NodeId, velocity: Vec3 },
    Collided { other: Option<NodeId>, point: Vec3 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhysicsState {
    NoPhysics,
    Active { body: BodyHandle },
}

struct AvatarState {
    config: AvatarConfig,
    transform: NodeId,
    /// Camera the avatar created for itself.
    own_camera: NodeId,
    camera: NodeId,
    physics: PhysicsState,
    movement: Option<Box<dyn MovementStrategy>>,
    velocity: Vec3,
    fire: Option<FireControl>,
    builder: EnvironmentBuilder,
    disposed: bool,
}

impl AvatarState {
    fn build_movement(&mut self) {
        let PhysicsState::Active { body } = self.physics else {
            return;
        };
        let movement: Box<dyn MovementStrategy> = match self.config.kind {
            AvatarKind::Immersive => Box::new(ImmersiveMovement::new(body, self.camera, self.config.movement)),
            AvatarKind::Basic => Box::new(BasicMovement::new(body, self.camera, self.config.movement)),
        };
        self.movement = Some(movement);
    }
}

/// State shared with the observers the avatar registers on the scene.
struct AvatarCore {
    state: RefCell<AvatarState>,
    scene: WeakScene,
    events: Observable<AvatarEvent>,
}

impl AvatarCore {
    fn scene(&self) -> Result<SceneHandle, AvatarError> {
        self.scene.upgrade().ok_or(AvatarError::SceneDropped)
    }

    fn handle_controller_event(&self, event: &ControllerEvent) {
        let Some(handle) = self.scene.upgrade() else {
            return;
        };
        let mut published = Vec::new();
        {
            let mut state = self.state.borrow_mut();
            if state.disposed {
                return;
            }
            let mut scene = handle.borrow_mut();
            let AvatarState {
                movement, velocity, ..
            } = &mut *state;
            if let Some(movement) = movement {
                match movement.drive(velocity, event, &mut scene) {
                    Some(Motion::Turn(yaw_rate)) => published.push(AvatarEvent::Turned { yaw_rate }),
                    Some(motion) => published.push(AvatarEvent::Moved { motion }),
                    None => {}
                }
            }
            if event.kind == ControllerEventKind::RTrigger {
                if let Some(fired) = fire(&mut state, event, &mut scene) {
                    published.push(fired);
                }
            }
        }
        for event in &published {
            self.events.notify(event);
        }
    }

    fn attach_camera(&self, camera: NodeId) -> Result<(), AvatarError> {
        let handle = self.scene()?;
        let mut state = self.state.borrow_mut();
        if state.disposed {
            return Err(AvatarError::Disposed);
        }
        let mut scene = handle.borrow_mut();
        scene.graph_mut().set_parent(camera, Some(state.transform))?;
        scene
            .graph_mut()
            .set_local_position(camera, Vec3::new(0.0, state.config.eye_height, 0.0))?;
        state.camera = camera;
        state.build_movement();
        tracing::debug!(
            avatar = %state.transform.short(),
            camera = %camera.short(),
            "camera attached to avatar"
        );
        Ok(())
    }

    /// Keep yaw, drop pitch and roll.
    fn upright(&self) {
        let Some(handle) = self.scene.upgrade() else {
            return;
        };
        let state = self.state.borrow();
        let PhysicsState::Active { body } = state.physics else {
            return;
        };
        let mut scene = handle.borrow_mut();
        let Some(current) = scene.world_transform(state.transform) else {
            return;
        };
        let (yaw, _, _) = current.rotation.to_euler(EulerRot::YXZ);
        let upright = Transform {
            rotation: Quat::from_rotation_y(yaw),
            ..current
        };
        if let Err(e) = scene.teleport(state.transform, upright) {
            tracing::warn!(error = %e, "uprighting failed");
            return;
        }
        if let Some(physics) = scene.physics_mut() {
            let yaw_only = physics
                .angular_velocity(body)
                .and_then(|spin| physics.set_angular_velocity(body, Vec3::new(0.0, spin.y, 0.0)));
            if let Err(e) = yaw_only {
                tracing::warn!(error = %e, ?body, "clearing pitch and roll spin failed");
            }
        }
    }

    fn handle_collision(&self, collision: &NodeCollision) {
        let transform = self.state.borrow().transform;
        if collision.node != transform {
            return;
        }
        tracing::trace!(other = ?collision.other.map(|n| n.short()), "avatar collided");
        self.events.notify(&AvatarEvent::Collided {
            other: collision.other,
            point: collision.point,
        });
    }
}

fn fire(state: &mut AvatarState, event: &ControllerEvent, scene: &mut Scene) -> Option<AvatarEvent> {
    let Some(value) = event.scalar() else {
        tracing::trace!("trigger event without a scalar value");
        return None;
    };
    let weapon = state.config.weapon.clone()?;
    let control = state.fire.as_mut()?;
    if !control.pull(value) {
        return None;
    }
    let Some(grip) = event.controller.grip() else {
        tracing::debug!(source = event.controller.id(), "trigger pulled without a grip pose");
        return None;
    };
    let bullet = match state
        .builder
        .bullet(scene, grip.position, weapon.radius, &weapon.color)
    {
        Ok(bullet) => bullet,
        Err(e) => {
            tracing::warn!(error = %e, "bullet spawn failed");
            return None;
        }
    };
    let mut velocity = Vec3::ZERO;
    if let Some(body) = scene.body_of(bullet) {
        velocity = event.controller.world_pointer_ray().direction * weapon.speed;
        if let Some(physics) = scene.physics_mut() {
            if let Err(e) = physics.set_linear_velocity(body, velocity) {
                tracing::warn!(error = %e, "bullet launch failed");
            }
        }
    }
    tracing::debug!(bullet = %bullet.short(), ?velocity, "fired");
    Some(AvatarEvent::Fired { bullet, velocity })
}

/// The player: a transform node carrying a camera at eye height and, once
/// physics is enabled, a rigid body driven by controller events.
///
/// The avatar follows the scene's active camera: whichever camera becomes
/// active is re-parented under the avatar.
pub struct Avatar {
    core: Rc<AvatarCore>,
    subscriptions: SubscriptionSet,
}

impl std::fmt::Debug for Avatar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.core.state.borrow();
        f.debug_struct("Avatar")
            .field("kind", &state.config.kind)
            .field("transform", &state.transform)
            .field("camera", &state.camera)
            .field("physics", &state.physics)
            .finish()
    }
}

impl Avatar {
    /// Create the avatar's nodes at the configured start position.
    pub fn new(scene: &SceneHandle, config: AvatarConfig) -> Result<Self, AvatarError> {
        let (transform, camera) = {
            let mut s = scene.borrow_mut();
            let kind = match config.kind {
                AvatarKind::Immersive => NodeKind::Mesh(MeshInfo {
                    primitive: Primitive::Cylinder {
                        diameter: 1.0,
                        height: 0.1,
                    },
                    color: Color::WHITE,
                }),
                AvatarKind::Basic => NodeKind::Transform,
            };
            let transform = s.add_node("avatar", kind, Transform::from_position(config.start));
            let camera = s.add_node(
                "avatar camera",
                NodeKind::Camera(CameraInfo::default()),
                Transform::from_position(Vec3::new(0.0, config.eye_height, 0.0)),
            );
            s.graph_mut().set_parent(camera, Some(transform))?;
            (transform, camera)
        };

        let fire = config.weapon.as_ref().map(|w| FireControl::new(w.threshold));
        let builder = match &config.weapon {
            Some(weapon) => EnvironmentBuilder::new().with_bullet_lifetime(weapon.lifetime),
            None => EnvironmentBuilder::new(),
        };
        let core = Rc::new(AvatarCore {
            state: RefCell::new(AvatarState {
                config,
                transform,
                own_camera: camera,
                camera,
                physics: PhysicsState::NoPhysics,
                movement: None,
                velocity: Vec3::ZERO,
                fire,
                builder,
                disposed: false,
            }),
            scene: scene.downgrade(),
            events: Observable::new(),
        });

        let mut subscriptions = SubscriptionSet::new();
        let weak = Rc::downgrade(&core);
        subscriptions.push(scene.on_active_camera_changed(move |camera| {
            if let Some(core) = weak.upgrade() {
                if let Err(e) = core.attach_camera(*camera) {
                    tracing::warn!(error = %e, "camera attach failed");
                }
            }
        }));

        tracing::debug!(avatar = %transform.short(), "avatar created");
        Ok(Self {
            core,
            subscriptions,
        })
    }

    /// The avatar's transform node; doubles as its id.
    pub fn id(&self) -> NodeId {
        self.core.state.borrow().transform
    }

    pub fn kind(&self) -> AvatarKind {
        self.core.state.borrow().config.kind
    }

    /// Camera the avatar currently carries.
    pub fn camera(&self) -> NodeId {
        self.core.state.borrow().camera
    }

    /// Camera created together with the avatar.
    pub fn own_camera(&self) -> NodeId {
        self.core.state.borrow().own_camera
    }

    pub fn physics_state(&self) -> PhysicsState {
        self.core.state.borrow().physics
    }

    pub fn body(&self) -> Option<BodyHandle> {
        match self.core.state.borrow().physics {
            PhysicsState::Active { body } => Some(body),
            PhysicsState::NoPhysics => None,
        }
    }

    /// Camera the movement strategy is bound to, if there is one.
    pub fn movement_camera(&self) -> Option<NodeId> {
        self.core.state.borrow().movement.as_ref().map(|m| m.camera())
    }

    /// Last velocity derived from stick input, in the camera's frame.
    pub fn velocity(&self) -> Vec3 {
        self.core.state.borrow().velocity
    }

    pub fn events(&self) -> &Observable<AvatarEvent> {
        &self.core.events
    }

    /// Give the avatar a rigid body and a movement strategy.
    ///
    /// The scene must have physics enabled. Returns `false` if physics was
    /// already active.
    pub fn enable_physics(&mut self) -> Result<bool, AvatarError> {
        let handle = self.core.scene()?;
        let upright = {
            let mut state = self.core.state.borrow_mut();
            if state.disposed {
                return Err(AvatarError::Disposed);
            }
            if state.physics != PhysicsState::NoPhysics {
                return Ok(false);
            }
            let body = handle
                .borrow_mut()
                .attach_body(state.transform, state.config.body)?;
            state.physics = PhysicsState::Active { body };
            state.build_movement();
            tracing::info!(
                avatar = %state.transform.short(),
                ?body,
                kind = ?state.config.kind,
                "avatar physics enabled"
            );
            state.config.upright
        };

        if upright {
            let weak: Weak<AvatarCore> = Rc::downgrade(&self.core);
            self.subscriptions.push(handle.on_after_physics(move |_| {
                if let Some(core) = weak.upgrade() {
                    core.upright();
                }
            }));
        }
        let weak: Weak<AvatarCore> = Rc::downgrade(&self.core);
        self.subscriptions.push(handle.on_collision(move |collision| {
            if let Some(core) = weak.upgrade() {
                core.handle_collision(collision);
            }
        }));
        Ok(true)
    }

    /// Route one controller event: sticks to the movement strategy, the right
    /// trigger to the weapon.
    pub fn controller_observer(&self, event: &ControllerEvent) {
        self.core.handle_controller_event(event);
    }

    /// Subscribe the avatar to a controller event bus.
    pub fn listen(&self, bus: &Observable<ControllerEvent>) -> Subscription {
        let weak = Rc::downgrade(&self.core);
        bus.add(move |event| {
            if let Some(core) = weak.upgrade() {
                core.handle_controller_event(event);
            }
        })
    }

    /// Remove the avatar's nodes and body from the scene and stop observing it.
    /// A foreign camera carried by the avatar is detached, not disposed.
    pub fn dispose(&mut self) {
        self.subscriptions.clear();
        let mut state = self.core.state.borrow_mut();
        if state.disposed {
            return;
        }
        state.disposed = true;
        state.movement = None;
        state.physics = PhysicsState::NoPhysics;
        let Some(handle) = self.core.scene.upgrade() else {
            return;
        };
        let mut scene = handle.borrow_mut();
        if state.camera != state.own_camera {
            if let Err(e) = scene.graph_mut().set_parent(state.camera, None) {
                tracing::debug!(error = %e, "camera detach skipped");
            }
        }
        match scene.dispose_node(state.transform) {
            Ok(removed) => tracing::debug!(count = removed.len(), "avatar disposed"),
            Err(e) => tracing::debug!(error = %e, "avatar already gone"),
        }
    }
}
