use std::cell::{Ref, RefCell, RefMut};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use glam::Vec3;
use xrspace_common::{NodeId, Observable, Subscription, Transform};
use xrspace_physics::{BodyDesc, BodyHandle, CollisionEvent, PhysicsBackend};

use crate::error::SceneError;
use crate::graph::{NodeKind, SceneEvent, SceneGraph};
use crate::timer::{TimerAction, TimerId, TimerRegistry};

/// Delivered to post-physics observers once per step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicsTick {
    pub tick: u64,
    pub dt: f32,
    /// Scene time after the step, in seconds.
    pub clock: f64,
}

/// A collision-start contact translated to scene nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeCollision {
    pub node: NodeId,
    /// `None` when the contact is with the ground plane.
    pub other: Option<NodeId>,
    pub point: Vec3,
}

/// What one [`Scene::step`] did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub tick: u64,
    pub collisions: Vec<NodeCollision>,
    pub disposed: Vec<NodeId>,
}

/// The scene: node graph, optional physics, active camera, clock and timers.
///
/// Observers of camera changes, physics ticks and collisions live here but
/// are only notified through [`SceneHandle`], after the scene is released.
pub struct Scene {
    graph: SceneGraph,
    physics: Option<Box<dyn PhysicsBackend>>,
    bodies: BTreeMap<NodeId, BodyHandle>,
    body_nodes: BTreeMap<BodyHandle, NodeId>,
    active_camera: Option<NodeId>,
    timers: TimerRegistry,
    clock: f64,
    tick: u64,
    on_active_camera_changed: Observable<NodeId>,
    on_after_physics: Observable<PhysicsTick>,
    on_collision: Observable<NodeCollision>,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("nodes", &self.graph.len())
            .field("physics", &self.physics.is_some())
            .field("active_camera", &self.active_camera)
            .field("timers", &self.timers.len())
            .field("clock", &self.clock)
            .field("tick", &self.tick)
            .finish()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            graph: SceneGraph::new(),
            physics: None,
            bodies: BTreeMap::new(),
            body_nodes: BTreeMap::new(),
            active_camera: None,
            timers: TimerRegistry::new(),
            clock: 0.0,
            tick: 0,
            on_active_camera_changed: Observable::new(),
            on_after_physics: Observable::new(),
            on_collision: Observable::new(),
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut SceneGraph {
        &mut self.graph
    }

    /// Scene time in seconds.
    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn timers(&self) -> &TimerRegistry {
        &self.timers
    }

    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind, local: Transform) -> NodeId {
        self.graph.add(name, kind, local)
    }

    pub fn world_transform(&self, id: NodeId) -> Option<Transform> {
        self.graph.world_transform(id)
    }

    /// Install a physics backend. Replaces any previous backend and forgets
    /// bodies created against it.
    pub fn enable_physics(&mut self, backend: Box<dyn PhysicsBackend>) {
        if self.physics.is_some() {
            tracing::warn!("replacing physics backend; existing bodies are dropped");
        }
        self.bodies.clear();
        self.body_nodes.clear();
        self.physics = Some(backend);
    }

    pub fn is_physics_enabled(&self) -> bool {
        self.physics.is_some()
    }

    pub fn physics(&self) -> Option<&dyn PhysicsBackend> {
        self.physics.as_deref()
    }

    pub fn physics_mut(&mut self) -> Option<&mut (dyn PhysicsBackend + 'static)> {
        self.physics.as_deref_mut()
    }

    /// Create a body for `node` at the node's current absolute transform.
    pub fn attach_body(&mut self, node: NodeId, desc: BodyDesc) -> Result<BodyHandle, SceneError> {
        let at = self
            .graph
            .world_transform(node)
            .ok_or(SceneError::UnknownNode(node))?;
        if self.bodies.contains_key(&node) {
            return Err(SceneError::AlreadyHasBody(node));
        }
        let physics = self.physics.as_mut().ok_or(SceneError::PhysicsDisabled)?;
        let body = physics.add_body(desc, at)?;
        self.bodies.insert(node, body);
        self.body_nodes.insert(body, node);
        tracing::debug!(node = %node.short(), ?body, "physics body attached");
        Ok(body)
    }

    pub fn body_of(&self, node: NodeId) -> Option<BodyHandle> {
        self.bodies.get(&node).copied()
    }

    pub fn node_of(&self, body: BodyHandle) -> Option<NodeId> {
        self.body_nodes.get(&body).copied()
    }

    /// Place a node at an absolute transform, moving its body with it.
    pub fn teleport(&mut self, node: NodeId, world: Transform) -> Result<(), SceneError> {
        self.graph.set_world_transform(node, world)?;
        if let (Some(body), Some(physics)) = (self.bodies.get(&node), self.physics.as_mut()) {
            physics.set_transform(*body, world)?;
        }
        Ok(())
    }

    /// Dispose a node, its descendants and their bodies.
    pub fn dispose_node(&mut self, node: NodeId) -> Result<Vec<NodeId>, SceneError> {
        let removed = self.graph.remove_subtree(node)?;
        for id in &removed {
            if let Some(body) = self.bodies.remove(id) {
                self.body_nodes.remove(&body);
                if let Some(physics) = self.physics.as_mut() {
                    physics.remove_body(body);
                }
            }
            if self.active_camera == Some(*id) {
                self.active_camera = None;
            }
        }
        tracing::trace!(node = %node.short(), count = removed.len(), "disposed");
        Ok(removed)
    }

    pub fn active_camera(&self) -> Option<NodeId> {
        self.active_camera
    }

    /// Record `camera` as the active camera. Returns whether it changed.
    /// Observers are notified by [`SceneHandle::set_active_camera`].
    pub fn set_active_camera(&mut self, camera: NodeId) -> Result<bool, SceneError> {
        let node = self
            .graph
            .get(camera)
            .ok_or(SceneError::UnknownNode(camera))?;
        if !node.kind.is_camera() {
            return Err(SceneError::NotACamera(camera));
        }
        if self.active_camera == Some(camera) {
            return Ok(false);
        }
        self.active_camera = Some(camera);
        self.graph.record(SceneEvent::ActiveCameraChanged { camera });
        Ok(true)
    }

    /// Dispose `node` once `delay` seconds of scene time have passed.
    pub fn schedule_disposal(&mut self, node: NodeId, delay: f64) -> TimerId {
        self.timers
            .schedule(self.clock + delay, TimerAction::DisposeNode(node))
    }

    pub fn cancel_timer(&mut self, id: TimerId) -> bool {
        self.timers.cancel(id)
    }

    /// Advance the clock, step physics, sync bodies back onto their nodes and
    /// run due timers. Observers are not notified here.
    pub fn step(&mut self, dt: f32) -> StepReport {
        let _span = tracing::trace_span!("scene_step", tick = self.tick + 1).entered();
        self.tick += 1;
        self.clock += f64::from(dt);

        let mut report = StepReport {
            tick: self.tick,
            ..StepReport::default()
        };

        if let Some(physics) = self.physics.as_mut() {
            let contacts = physics.step(dt);
            for (node, body) in &self.bodies {
                if let Ok(world) = physics.transform(*body) {
                    let scale = self
                        .graph
                        .world_transform(*node)
                        .map(|t| t.scale)
                        .unwrap_or(Vec3::ONE);
                    let world = Transform { scale, ..world };
                    if let Err(e) = self.graph.set_world_transform(*node, world) {
                        tracing::warn!(error = %e, "body sync failed");
                    }
                }
            }
            report.collisions = contacts
                .into_iter()
                .filter_map(|contact| match contact {
                    CollisionEvent::Started { body, other, point } => {
                        let node = self.body_nodes.get(&body).copied()?;
                        let other = other.and_then(|o| self.body_nodes.get(&o).copied());
                        Some(NodeCollision { node, other, point })
                    }
                })
                .collect();
        }

        for (_, action) in self.timers.take_due(self.clock) {
            match action {
                TimerAction::DisposeNode(node) => {
                    // The node may already be gone with its scene or parent.
                    if let Ok(removed) = self.dispose_node(node) {
                        report.disposed.extend(removed);
                    }
                }
            }
        }

        report
    }
}

/// Shared handle to a [`Scene`] on the render thread.
///
/// Methods that notify observers release the scene borrow first.
#[derive(Clone)]
pub struct SceneHandle(Rc<RefCell<Scene>>);

/// Non-owning counterpart of [`SceneHandle`], for observers stored inside the
/// scene's own observables.
#[derive(Clone)]
pub struct WeakScene(Weak<RefCell<Scene>>);

impl WeakScene {
    pub fn upgrade(&self) -> Option<SceneHandle> {
        self.0.upgrade().map(SceneHandle)
    }
}

impl Default for SceneHandle {
    fn default() -> Self {
        Self::new(Scene::new())
    }
}

impl SceneHandle {
    pub fn new(scene: Scene) -> Self {
        Self(Rc::new(RefCell::new(scene)))
    }

    pub fn borrow(&self) -> Ref<'_, Scene> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Scene> {
        self.0.borrow_mut()
    }

    pub fn downgrade(&self) -> WeakScene {
        WeakScene(Rc::downgrade(&self.0))
    }

    /// Make `camera` active and notify camera-change observers if it changed.
    pub fn set_active_camera(&self, camera: NodeId) -> Result<(), SceneError> {
        let (changed, observers) = {
            let mut scene = self.0.borrow_mut();
            let changed = scene.set_active_camera(camera)?;
            (changed, scene.on_active_camera_changed.clone())
        };
        if changed {
            tracing::debug!(camera = %camera.short(), "active camera changed");
            observers.notify(&camera);
        }
        Ok(())
    }

    /// Step the scene, then notify collision observers and post-physics hooks.
    pub fn step(&self, dt: f32) -> StepReport {
        let (report, clock, has_physics, after_physics, collisions) = {
            let mut scene = self.0.borrow_mut();
            let report = scene.step(dt);
            (
                report,
                scene.clock,
                scene.physics.is_some(),
                scene.on_after_physics.clone(),
                scene.on_collision.clone(),
            )
        };
        for collision in &report.collisions {
            collisions.notify(collision);
        }
        if has_physics {
            after_physics.notify(&PhysicsTick {
                tick: report.tick,
                dt,
                clock,
            });
        }
        report
    }

    pub fn on_active_camera_changed(&self, observer: impl FnMut(&NodeId) + 'static) -> Subscription {
        self.0.borrow().on_active_camera_changed.add(observer)
    }

    /// Runs once per step, after physics integration and body sync.
    pub fn on_after_physics(&self, observer: impl FnMut(&PhysicsTick) + 'static) -> Subscription {
        self.0.borrow().on_after_physics.add(observer)
    }

    pub fn after_physics_observers(&self) -> usize {
        self.0.borrow().on_after_physics.observer_count()
    }

    pub fn on_collision(&self, observer: impl FnMut(&NodeCollision) + 'static) -> Subscription {
        self.0.borrow().on_collision.add(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::CameraInfo;
    use std::cell::Cell;
    use xrspace_physics::{PhysicsConfig, RapierBackend};

    fn physics_scene() -> Scene {
        let mut scene = Scene::new();
        scene.enable_physics(Box::new(RapierBackend::new(PhysicsConfig {
            gravity: Vec3::ZERO,
            ground_height: None,
            ..PhysicsConfig::default()
        })));
        scene
    }

    #[test]
    fn scene_starts_empty() {
        let scene = Scene::new();
        assert_eq!(scene.tick(), 0);
        assert_eq!(scene.clock(), 0.0);
        assert!(scene.graph().is_empty());
        assert!(scene.active_camera().is_none());
    }

    #[test]
    fn attach_body_requires_physics() {
        let mut scene = Scene::new();
        let node = scene.add_node("n", NodeKind::Transform, Transform::default());
        assert_eq!(
            scene.attach_body(node, BodyDesc::default()),
            Err(SceneError::PhysicsDisabled)
        );
    }

    #[test]
    fn one_body_per_node() {
        let mut scene = physics_scene();
        let node = scene.add_node("n", NodeKind::Transform, Transform::default());
        scene.attach_body(node, BodyDesc::default()).unwrap();
        assert_eq!(
            scene.attach_body(node, BodyDesc::default()),
            Err(SceneError::AlreadyHasBody(node))
        );
    }

    #[test]
    fn step_syncs_body_onto_node() {
        let mut scene = physics_scene();
        let node = scene.add_node("n", NodeKind::Transform, Transform::default());
        let body = scene.attach_body(node, BodyDesc::default()).unwrap();
        scene
            .physics_mut()
            .unwrap()
            .set_linear_velocity(body, Vec3::new(1.0, 0.0, 0.0))
            .unwrap();

        scene.step(0.5);
        let world = scene.world_transform(node).unwrap();
        assert!((world.position.x - 0.5).abs() < 1e-5);
    }

    #[test]
    fn dispose_removes_bodies_of_subtree() {
        let mut scene = physics_scene();
        let parent = scene.add_node("p", NodeKind::Transform, Transform::default());
        let child = scene.add_node("c", NodeKind::Transform, Transform::default());
        scene.graph_mut().set_parent(child, Some(parent)).unwrap();
        scene.attach_body(parent, BodyDesc::default()).unwrap();

        scene.dispose_node(parent).unwrap();
        assert!(scene.graph().is_empty());
        assert!(scene.body_of(parent).is_none());
        assert_eq!(scene.physics().unwrap().body_count(), 0);
    }

    #[test]
    fn scheduled_disposal_runs_on_scene_time() {
        let mut scene = Scene::new();
        let node = scene.add_node("n", NodeKind::Transform, Transform::default());
        scene.schedule_disposal(node, 1.0);

        let report = scene.step(0.5);
        assert!(report.disposed.is_empty());
        let report = scene.step(0.5);
        assert_eq!(report.disposed, vec![node]);
        assert!(!scene.graph().contains(node));
    }

    #[test]
    fn active_camera_must_be_a_camera() {
        let mut scene = Scene::new();
        let node = scene.add_node("n", NodeKind::Transform, Transform::default());
        assert_eq!(scene.set_active_camera(node), Err(SceneError::NotACamera(node)));
    }

    #[test]
    fn camera_change_notifies_after_release() {
        let handle = SceneHandle::default();
        let camera = handle.borrow_mut().add_node(
            "cam",
            NodeKind::Camera(CameraInfo::default()),
            Transform::default(),
        );

        let seen = Rc::new(Cell::new(0));
        let weak = handle.downgrade();
        let s = Rc::clone(&seen);
        let _sub = handle.on_active_camera_changed(move |id| {
            // observers may borrow the scene again
            let scene = weak.upgrade().unwrap();
            assert_eq!(scene.borrow().active_camera(), Some(*id));
            s.set(s.get() + 1);
        });

        handle.set_active_camera(camera).unwrap();
        handle.set_active_camera(camera).unwrap();
        assert_eq!(seen.get(), 1);
    }

    #[test]
    fn after_physics_runs_once_per_step() {
        let handle = SceneHandle::new(physics_scene());
        let ticks = Rc::new(RefCell::new(Vec::new()));
        let t = Rc::clone(&ticks);
        let _sub = handle.on_after_physics(move |tick| t.borrow_mut().push(tick.tick));

        handle.step(0.1);
        handle.step(0.1);
        assert_eq!(*ticks.borrow(), vec![1, 2]);
        assert_eq!(handle.after_physics_observers(), 1);
    }

    #[test]
    fn after_physics_silent_without_physics() {
        let handle = SceneHandle::default();
        let calls = Rc::new(Cell::new(0));
        let c = Rc::clone(&calls);
        let _sub = handle.on_after_physics(move |_| c.set(c.get() + 1));
        handle.step(0.1);
        assert_eq!(calls.get(), 0);
    }
}
