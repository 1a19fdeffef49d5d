use std::collections::BTreeMap;
use std::sync::Mutex;

use glam::{BVec3, Quat, Vec3};
use rapier3d::math::{Isometry, Point, Real, Vector};
use rapier3d::na::{Quaternion, Translation3, UnitQuaternion};
use rapier3d::prelude::CollisionEvent as RapierEvent;
use rapier3d::prelude::{
    ActiveEvents, CCDSolver, CoefficientCombineRule, ColliderBuilder, ColliderHandle, ColliderSet,
    ContactPair, DefaultBroadPhase, EventHandler, ImpulseJointSet, IntegrationParameters,
    IslandManager, MultibodyJointSet, NarrowPhase, PhysicsPipeline, QueryPipeline, RigidBody,
    RigidBodyBuilder, RigidBodyHandle, RigidBodySet,
};
use serde::{Deserialize, Serialize};
use xrspace_common::Transform;

use crate::backend::{CollisionEvent, PhysicsBackend, PhysicsError};
use crate::body::{BodyDesc, BodyHandle, CombineMode, MotionType, Shape};

/// World settings for [`RapierBackend`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub gravity: Vec3,
    /// Height of an infinite static ground plane. `None` disables ground contact.
    pub ground_height: Option<f32>,
    pub ground_restitution: f32,
    pub ground_friction: f32,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            gravity: Vec3::new(0.0, -9.8, 0.0),
            ground_height: Some(-1.0),
            ground_restitution: 1.0,
            ground_friction: 0.5,
        }
    }
}

struct BodyEntry {
    rigid: RigidBodyHandle,
    collider: ColliderHandle,
    desc: BodyDesc,
    /// Rotation-locked axes.
    locked: BVec3,
    /// Angular velocity set explicitly on locked axes. Rapier zeroes those
    /// axes, so the backend turns the body itself.
    spin: Vec3,
}

struct StartedContact {
    colliders: (ColliderHandle, ColliderHandle),
    point: Option<Vec3>,
}

/// Collects collision-start events while the pipeline steps.
#[derive(Default)]
struct ContactCollector {
    started: Mutex<Vec<StartedContact>>,
}

impl ContactCollector {
    fn drain(&self) -> Vec<StartedContact> {
        self.started
            .lock()
            .map(|mut started| std::mem::take(&mut *started))
            .unwrap_or_default()
    }
}

impl EventHandler for ContactCollector {
    fn handle_collision_event(
        &self,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        event: RapierEvent,
        contact_pair: Option<&ContactPair>,
    ) {
        if let RapierEvent::Started(a, b, _) = event {
            let point = contact_pair.and_then(first_contact_point);
            if let Ok(mut started) = self.started.lock() {
                started.push(StartedContact {
                    colliders: (a, b),
                    point,
                });
            }
        }
    }

    fn handle_contact_force_event(
        &self,
        _dt: Real,
        _bodies: &RigidBodySet,
        _colliders: &ColliderSet,
        _contact_pair: &ContactPair,
        _total_force_magnitude: Real,
    ) {
    }
}

fn first_contact_point(pair: &ContactPair) -> Option<Vec3> {
    pair.manifolds
        .iter()
        .find_map(|m| m.data.solver_contacts.first())
        .map(|c| Vec3::new(c.point.x, c.point.y, c.point.z))
}

fn to_vector(v: Vec3) -> Vector<Real> {
    Vector::new(v.x, v.y, v.z)
}

fn from_vector(v: &Vector<Real>) -> Vec3 {
    Vec3::new(v.x, v.y, v.z)
}

fn to_isometry(position: Vec3, rotation: Quat) -> Isometry<Real> {
    let q = rotation.normalize();
    Isometry::from_parts(
        Translation3::new(position.x, position.y, position.z),
        UnitQuaternion::from_quaternion(Quaternion::new(q.w, q.x, q.y, q.z)),
    )
}

fn from_isometry(iso: &Isometry<Real>) -> (Vec3, Quat) {
    let t = iso.translation.vector;
    let q = iso.rotation.quaternion();
    (Vec3::new(t.x, t.y, t.z), Quat::from_xyzw(q.i, q.j, q.k, q.w))
}

fn combine_rule(mode: CombineMode) -> CoefficientCombineRule {
    match mode {
        CombineMode::Average => CoefficientCombineRule::Average,
        CombineMode::Minimum => CoefficientCombineRule::Min,
        CombineMode::Maximum => CoefficientCombineRule::Max,
        CombineMode::Multiply => CoefficientCombineRule::Multiply,
    }
}

fn validate(desc: &BodyDesc, at: &Transform) -> Result<(), PhysicsError> {
    let invalid = |reason: String| Err(PhysicsError::InvalidBody(reason));
    if desc.motion_type == MotionType::Dynamic && !(desc.mass > 0.0 && desc.mass.is_finite()) {
        return invalid(format!("dynamic body needs positive mass, got {}", desc.mass));
    }
    let dims = match desc.shape {
        Shape::Sphere { radius } => vec![radius],
        Shape::Cylinder { radius, height } => vec![radius, height],
        Shape::Box { half_extents } => half_extents.to_vec(),
    };
    if dims.iter().any(|d| !(*d > 0.0 && d.is_finite())) {
        return invalid(format!("shape needs positive finite dimensions, got {:?}", desc.shape));
    }
    if !at.position.is_finite() || !at.rotation.is_finite() {
        return invalid("non-finite start transform".into());
    }
    Ok(())
}

fn collider_for(desc: &BodyDesc) -> ColliderBuilder {
    let builder = match desc.shape {
        Shape::Sphere { radius } => ColliderBuilder::ball(radius),
        Shape::Cylinder { radius, height } => ColliderBuilder::cylinder(height * 0.5, radius),
        Shape::Box { half_extents: [x, y, z] } => ColliderBuilder::cuboid(x, y, z),
    };
    let events = if desc.collision_callbacks {
        ActiveEvents::COLLISION_EVENTS
    } else {
        ActiveEvents::empty()
    };
    builder
        .mass(if desc.motion_type == MotionType::Dynamic { desc.mass } else { 0.0 })
        .friction(desc.friction)
        .restitution(desc.restitution)
        .restitution_combine_rule(combine_rule(desc.restitution_combine))
        .active_events(events)
}

/// [`PhysicsBackend`] on top of a rapier pipeline.
///
/// Owns the body and collider sets and steps the pipeline itself. An optional
/// ground is a body-less halfspace collider; contacts with it report `other`
/// as `None`. Rapier derives inertia from shape and mass; a zero moment in
/// [`BodyDesc::inertia`] locks rotation about that axis.
pub struct RapierBackend {
    config: PhysicsConfig,
    gravity: Vector<Real>,
    params: IntegrationParameters,
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: DefaultBroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd: CCDSolver,
    query_pipeline: QueryPipeline,
    collector: ContactCollector,
    entries: BTreeMap<BodyHandle, BodyEntry>,
    next_handle: u64,
}

impl Default for RapierBackend {
    fn default() -> Self {
        Self::new(PhysicsConfig::default())
    }
}

impl std::fmt::Debug for RapierBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RapierBackend")
            .field("config", &self.config)
            .field("bodies", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl RapierBackend {
    pub fn new(config: PhysicsConfig) -> Self {
        let mut colliders = ColliderSet::new();
        if let Some(height) = config.ground_height {
            let ground = ColliderBuilder::halfspace(Vector::y_axis())
                .translation(Vector::new(0.0, height, 0.0))
                .friction(config.ground_friction)
                .restitution(config.ground_restitution)
                .user_data(0)
                .build();
            colliders.insert(ground);
        }
        Self {
            config,
            gravity: to_vector(config.gravity),
            params: IntegrationParameters::default(),
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders,
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            collector: ContactCollector::default(),
            entries: BTreeMap::new(),
            next_handle: 0,
        }
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    fn entry(&self, body: BodyHandle) -> Result<&BodyEntry, PhysicsError> {
        self.entries.get(&body).ok_or(PhysicsError::UnknownBody(body))
    }

    fn rigid(&self, body: BodyHandle) -> Result<&RigidBody, PhysicsError> {
        let entry = self.entry(body)?;
        self.bodies
            .get(entry.rigid)
            .ok_or(PhysicsError::UnknownBody(body))
    }

    fn rigid_mut(&mut self, body: BodyHandle) -> Result<&mut RigidBody, PhysicsError> {
        let entry = self.entries.get(&body).ok_or(PhysicsError::UnknownBody(body))?;
        self.bodies
            .get_mut(entry.rigid)
            .ok_or(PhysicsError::UnknownBody(body))
    }

    /// The body owning `collider`, or `None` for the ground.
    fn owner(&self, collider: ColliderHandle) -> Option<BodyHandle> {
        let data = self.colliders.get(collider)?.user_data.checked_sub(1)?;
        let body = BodyHandle(u64::try_from(data).ok()?);
        self.entries.contains_key(&body).then_some(body)
    }

    fn turn_locked_axes(&mut self, dt: f32) {
        for entry in self.entries.values_mut() {
            if entry.spin == Vec3::ZERO {
                continue;
            }
            let Some(rb) = self.bodies.get_mut(entry.rigid) else {
                continue;
            };
            let (position, rotation) = from_isometry(rb.position());
            let rotation = (Quat::from_scaled_axis(entry.spin * dt) * rotation).normalize();
            rb.set_position(to_isometry(position, rotation), true);
            entry.spin *= 1.0 / (1.0 + dt * entry.desc.angular_damping);
        }
    }

    fn started_events(&self, started: Vec<StartedContact>) -> Vec<CollisionEvent> {
        let mut events = Vec::new();
        for contact in started {
            let a = self.owner(contact.colliders.0);
            let b = self.owner(contact.colliders.1);
            for (body, other) in [(a, b), (b, a)] {
                let Some(body) = body else {
                    continue;
                };
                if !self.entries.get(&body).is_some_and(|e| e.desc.collision_callbacks) {
                    continue;
                }
                let point = contact.point.unwrap_or_else(|| {
                    self.rigid(body)
                        .map(|rb| from_vector(rb.translation()))
                        .unwrap_or_default()
                });
                events.push(CollisionEvent::Started { body, other, point });
            }
        }
        events
    }
}

impl PhysicsBackend for RapierBackend {
    fn gravity(&self) -> Vec3 {
        self.config.gravity
    }

    fn add_body(&mut self, desc: BodyDesc, at: Transform) -> Result<BodyHandle, PhysicsError> {
        validate(&desc, &at)?;
        let handle = BodyHandle(self.next_handle);
        self.next_handle += 1;

        let locked = if desc.motion_type == MotionType::Dynamic {
            desc.inertia.cmpeq(Vec3::ZERO)
        } else {
            BVec3::FALSE
        };
        let builder = match desc.motion_type {
            MotionType::Dynamic => RigidBodyBuilder::dynamic(),
            MotionType::Kinematic => RigidBodyBuilder::kinematic_velocity_based(),
            MotionType::Static => RigidBodyBuilder::fixed(),
        };
        let rigid = builder
            .position(to_isometry(at.position, at.rotation))
            .gravity_scale(desc.gravity_factor)
            .linear_damping(desc.linear_damping)
            .angular_damping(desc.angular_damping)
            .enabled_rotations(!locked.x, !locked.y, !locked.z)
            .build();
        let rigid = self.bodies.insert(rigid);
        let collider = collider_for(&desc)
            .user_data(u128::from(handle.0) + 1)
            .build();
        let collider = self
            .colliders
            .insert_with_parent(collider, rigid, &mut self.bodies);

        self.entries.insert(
            handle,
            BodyEntry {
                rigid,
                collider,
                desc,
                locked,
                spin: Vec3::ZERO,
            },
        );
        tracing::trace!(?handle, motion = ?desc.motion_type, "body added");
        Ok(handle)
    }

    fn remove_body(&mut self, body: BodyHandle) -> bool {
        let Some(entry) = self.entries.remove(&body) else {
            return false;
        };
        self.bodies
            .remove(
                entry.rigid,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some()
    }

    fn contains(&self, body: BodyHandle) -> bool {
        self.entries.contains_key(&body)
    }

    fn body_count(&self) -> usize {
        self.entries.len()
    }

    fn desc(&self, body: BodyHandle) -> Result<BodyDesc, PhysicsError> {
        Ok(self.entry(body)?.desc)
    }

    fn transform(&self, body: BodyHandle) -> Result<Transform, PhysicsError> {
        let (position, rotation) = from_isometry(self.rigid(body)?.position());
        Ok(Transform {
            position,
            rotation,
            ..Transform::default()
        })
    }

    fn set_transform(&mut self, body: BodyHandle, to: Transform) -> Result<(), PhysicsError> {
        self.rigid_mut(body)?
            .set_position(to_isometry(to.position, to.rotation), true);
        Ok(())
    }

    fn linear_velocity(&self, body: BodyHandle) -> Result<Vec3, PhysicsError> {
        Ok(from_vector(self.rigid(body)?.linvel()))
    }

    fn set_linear_velocity(
        &mut self,
        body: BodyHandle,
        velocity: Vec3,
    ) -> Result<(), PhysicsError> {
        self.rigid_mut(body)?.set_linvel(to_vector(velocity), true);
        Ok(())
    }

    fn angular_velocity(&self, body: BodyHandle) -> Result<Vec3, PhysicsError> {
        let entry = self.entry(body)?;
        let free = from_vector(self.rigid(body)?.angvel());
        Ok(Vec3::select(entry.locked, entry.spin, free))
    }

    fn set_angular_velocity(
        &mut self,
        body: BodyHandle,
        velocity: Vec3,
    ) -> Result<(), PhysicsError> {
        let entry = self
            .entries
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        entry.spin = Vec3::select(entry.locked, velocity, Vec3::ZERO);
        let free = Vec3::select(entry.locked, Vec3::ZERO, velocity);
        self.rigid_mut(body)?.set_angvel(to_vector(free), true);
        Ok(())
    }

    fn apply_force(
        &mut self,
        body: BodyHandle,
        force: Vec3,
        point: Vec3,
    ) -> Result<(), PhysicsError> {
        self.rigid_mut(body)?.add_force_at_point(
            to_vector(force),
            Point::new(point.x, point.y, point.z),
            true,
        );
        Ok(())
    }

    fn set_collision_callbacks(
        &mut self,
        body: BodyHandle,
        enabled: bool,
    ) -> Result<(), PhysicsError> {
        let entry = self
            .entries
            .get_mut(&body)
            .ok_or(PhysicsError::UnknownBody(body))?;
        entry.desc.collision_callbacks = enabled;
        if let Some(collider) = self.colliders.get_mut(entry.collider) {
            collider.set_active_events(if enabled {
                ActiveEvents::COLLISION_EVENTS
            } else {
                ActiveEvents::empty()
            });
        }
        Ok(())
    }

    fn step(&mut self, dt: f32) -> Vec<CollisionEvent> {
        let _span = tracing::trace_span!("physics_step", bodies = self.entries.len()).entered();
        self.params.dt = dt;
        self.pipeline.step(
            &self.gravity,
            &self.params,
            &mut self.islands,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.bodies,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            &mut self.ccd,
            Some(&mut self.query_pipeline),
            &(),
            &self.collector,
        );
        self.turn_locked_axes(dt);
        for (_, rb) in self.bodies.iter_mut() {
            rb.reset_forces(false);
            rb.reset_torques(false);
        }
        let started = self.collector.drain();
        self.started_events(started)
    }
}
