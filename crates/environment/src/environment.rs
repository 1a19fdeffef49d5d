use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use glam::Vec3;
use serde::Serialize;
use tracing::Instrument;
use xrspace_avatar::{Avatar, AvatarError, AvatarEvent};
use xrspace_common::{NodeId, Observable, Subscription, SubscriptionSet, Transform};
use xrspace_input::{ControllerEvent, InputMapper, MotionController, XrInputSource};
use xrspace_physics::PhysicsError;
use xrspace_scene::{
    CameraInfo, EnvironmentBuilder, NodeKind, Scene, SceneError, SceneHandle, StepReport,
};

use crate::config::{EnvironmentConfig, EnvironmentKind};
use crate::demo::{self, DemoScene};
use crate::physics::PhysicsProvider;
use crate::readiness::{Readiness, ReadinessFlags, ReadinessSignal};
use crate::script::ScriptPlayer;
use crate::xr::{XrError, XrRuntime, XrSession, XrState};

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("physics initialization failed: {0}")]
    Physics(#[from] PhysicsError),
    #[error("XR initialization failed: {0}")]
    Xr(#[from] XrError),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Avatar(#[from] AvatarError),
    #[error("no XR session; initialize XR first")]
    NoSession,
    #[error("environment has been disposed")]
    Disposed,
    #[error("step must be a positive finite number of seconds, got {0}")]
    InvalidStep(f32),
}

/// Totals from [`Environment::run_script`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunSummary {
    pub ticks: u64,
    pub clock: f64,
    pub script_steps: usize,
    pub controller_events: usize,
    pub moves: usize,
    pub turns: usize,
    pub shots: usize,
    pub avatar_collisions: usize,
    pub disposed_nodes: usize,
    pub avatar_position: Vec3,
}

/// Binds every controller a session reports, now or later, to the mapper.
#[derive(Clone)]
struct ControllerBinder {
    mapper: InputMapper,
    bindings: Rc<RefCell<SubscriptionSet>>,
}

impl ControllerBinder {
    fn watch(&self, source: &Rc<XrInputSource>) {
        if let Some(controller) = source.motion_controller() {
            self.bind(source, &controller);
            return;
        }
        let binder = self.clone();
        let weak: Weak<XrInputSource> = Rc::downgrade(source);
        let init = source.on_motion_controller_init().add(move |controller| {
            if let Some(source) = weak.upgrade() {
                binder.bind(&source, controller);
            }
        });
        self.bindings.borrow_mut().push(init);
    }

    fn bind(&self, source: &Rc<XrInputSource>, controller: &MotionController) {
        let set = self.mapper.bind(source, controller);
        self.bindings.borrow_mut().append(set);
    }
}

/// Orchestrates one experience: scene, avatar, physics and XR bootstraps, and
/// the controller event bus between the XR hardware and the avatar.
///
/// Physics and XR come up asynchronously and in either order. Readiness is
/// reported on two observables: [`Environment::on_readiness_changed`] on every
/// flag change, [`Environment::on_ready`] once both are up.
pub struct Environment {
    config: EnvironmentConfig,
    scene: SceneHandle,
    avatar: Avatar,
    builder: EnvironmentBuilder,
    bus: Observable<ControllerEvent>,
    mapper: InputMapper,
    readiness: Readiness,
    on_readiness_changed: Observable<ReadinessFlags>,
    on_ready: Observable<ReadinessFlags>,
    session: Option<Rc<XrSession>>,
    xr_camera: Option<NodeId>,
    bindings: Rc<RefCell<SubscriptionSet>>,
    subscriptions: SubscriptionSet,
    disposed: bool,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("variant", &self.config.variant)
            .field("readiness", &self.readiness.state())
            .field("avatar", &self.avatar)
            .field("session", &self.session.as_ref().map(|s| s.state()))
            .field("disposed", &self.disposed)
            .finish()
    }
}

impl Environment {
    pub fn new(config: EnvironmentConfig) -> Result<Self, EnvironmentError> {
        Self::with_scene(SceneHandle::default(), config)
    }

    /// Build the environment into an existing scene. The avatar's camera
    /// becomes the active camera.
    pub fn with_scene(scene: SceneHandle, config: EnvironmentConfig) -> Result<Self, EnvironmentError> {
        let _span = tracing::info_span!("environment", variant = ?config.variant).entered();

        let avatar = Avatar::new(&scene, config.avatar_config())?;
        scene.set_active_camera(avatar.own_camera())?;

        let bus = Observable::new();
        let mut subscriptions = SubscriptionSet::new();
        subscriptions.push(avatar.listen(&bus));
        let mapper = InputMapper::new(bus.clone(), config.variant.binding_profile());
        let builder = EnvironmentBuilder::new().with_bullet_lifetime(config.bullet_lifetime);

        tracing::info!(avatar = %avatar.id().short(), "environment created");
        Ok(Self {
            config,
            scene,
            avatar,
            builder,
            bus,
            mapper,
            readiness: Readiness::new(),
            on_readiness_changed: Observable::new(),
            on_ready: Observable::new(),
            session: None,
            xr_camera: None,
            bindings: Rc::new(RefCell::new(SubscriptionSet::new())),
            subscriptions,
            disposed: false,
        })
    }

    pub fn kind(&self) -> EnvironmentKind {
        self.config.variant
    }

    pub fn config(&self) -> &EnvironmentConfig {
        &self.config
    }

    pub fn scene(&self) -> &SceneHandle {
        &self.scene
    }

    pub fn avatar(&self) -> &Avatar {
        &self.avatar
    }

    pub fn builder(&self) -> &EnvironmentBuilder {
        &self.builder
    }

    /// The bus every mapped controller event is published on.
    pub fn controller_observable(&self) -> &Observable<ControllerEvent> {
        &self.bus
    }

    pub fn readiness(&self) -> &Readiness {
        &self.readiness
    }

    pub fn session(&self) -> Option<&Rc<XrSession>> {
        self.session.as_ref()
    }

    pub fn xr_camera(&self) -> Option<NodeId> {
        self.xr_camera
    }

    /// Number of live hardware subscriptions made for controllers.
    pub fn binding_count(&self) -> usize {
        self.bindings.borrow().len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Notified on every readiness flag change, with both flags.
    pub fn on_readiness_changed(&self, observer: impl FnMut(&ReadinessFlags) + 'static) -> Subscription {
        self.on_readiness_changed.add(observer)
    }

    /// Notified once, when physics and XR are both up.
    pub fn on_ready(&self, observer: impl FnMut(&ReadinessFlags) + 'static) -> Subscription {
        self.on_ready.add(observer)
    }

    fn ensure_live(&self) -> Result<(), EnvironmentError> {
        if self.disposed {
            Err(EnvironmentError::Disposed)
        } else {
            Ok(())
        }
    }

    /// Bring up physics and give the avatar its body.
    ///
    /// Calling it again after success does nothing.
    pub async fn initialize_physics(&mut self, provider: &impl PhysicsProvider) -> Result<(), EnvironmentError> {
        self.ensure_live()?;
        if self.readiness.flags().physics_ready {
            tracing::debug!("physics already initialized");
            return Ok(());
        }

        let backend = provider
            .initialize()
            .instrument(tracing::info_span!("physics_bootstrap"))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "physics initialization failed");
                EnvironmentError::Physics(e)
            })?;
        self.scene.borrow_mut().enable_physics(backend);
        self.avatar.enable_physics()?;
        self.signal(ReadinessSignal::Physics);
        Ok(())
    }

    /// Request an XR session and wire its controllers to the input mapper.
    ///
    /// Creates the XR camera, which becomes the active camera once the session
    /// is in XR. Calling it again returns the existing session.
    pub async fn initialize_xr(&mut self, runtime: &impl XrRuntime) -> Result<Rc<XrSession>, EnvironmentError> {
        self.ensure_live()?;
        if let Some(session) = &self.session {
            return Ok(Rc::clone(session));
        }

        let session = runtime
            .create_session(&self.config.xr)
            .instrument(tracing::info_span!("xr_bootstrap"))
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "XR initialization failed");
                EnvironmentError::Xr(e)
            })?;

        let camera = self.scene.borrow_mut().add_node(
            "xr camera",
            NodeKind::Camera(CameraInfo::default()),
            Transform::default(),
        );
        self.xr_camera = Some(camera);

        let scene = self.scene.downgrade();
        self.subscriptions.push(session.on_state_changed().add(move |state| {
            if *state != XrState::InXr {
                return;
            }
            let Some(scene) = scene.upgrade() else {
                return;
            };
            if let Err(e) = scene.set_active_camera(camera) {
                tracing::warn!(error = %e, "XR camera activation failed");
            }
        }));

        let binder = ControllerBinder {
            mapper: self.mapper.clone(),
            bindings: Rc::clone(&self.bindings),
        };
        for source in session.controllers() {
            binder.watch(&source);
        }
        self.subscriptions
            .push(session.on_controller_added().add(move |source| binder.watch(source)));

        self.session = Some(Rc::clone(&session));
        self.signal(ReadinessSignal::Xr);
        Ok(session)
    }

    fn signal(&mut self, signal: ReadinessSignal) {
        let Some(transition) = self.readiness.signal(signal) else {
            tracing::debug!(?signal, "readiness signal repeated");
            return;
        };
        let flags = transition.flags;
        tracing::info!(
            physics_ready = flags.physics_ready,
            xr_ready = flags.xr_ready,
            "readiness changed"
        );
        self.on_readiness_changed.notify(&flags);
        if transition.entered_ready() {
            tracing::info!("environment ready");
            self.on_ready.notify(&flags);
        }
    }

    /// Advance the scene by `dt` seconds.
    pub fn step(&self, dt: f32) -> StepReport {
        self.scene.step(dt)
    }

    /// Hand the scene and avatar to a scene-building function.
    pub fn build_scene<R>(&self, build: impl FnOnce(&mut Scene, &Avatar, &EnvironmentBuilder) -> R) -> R {
        let mut scene = self.scene.borrow_mut();
        build(&mut scene, &self.avatar, &self.builder)
    }

    /// Build the demo world if the config enables it.
    pub fn build_demo(&self) -> Result<Option<DemoScene>, EnvironmentError> {
        if !self.config.demo.enabled {
            return Ok(None);
        }
        let config = self.config.demo.clone();
        let demo = self.build_scene(|scene, _, builder| demo::populate(scene, builder, &config))?;
        Ok(Some(demo))
    }

    /// Connect `player` to the XR session and run the scene for `seconds`,
    /// feeding script steps as scene time passes.
    pub fn run_script(
        &mut self,
        player: &mut ScriptPlayer,
        seconds: f64,
        dt: f32,
    ) -> Result<RunSummary, EnvironmentError> {
        self.ensure_live()?;
        if !(dt.is_finite() && dt > 0.0) {
            return Err(EnvironmentError::InvalidStep(dt));
        }
        let session = self.session.clone().ok_or(EnvironmentError::NoSession)?;
        let _span = tracing::info_span!("run_script", seconds, dt).entered();

        let events = Rc::new(Cell::new(0usize));
        let counter = Rc::clone(&events);
        let _tap = self.bus.add(move |_| counter.set(counter.get() + 1));

        let avatar_events = Rc::new(RefCell::new(RunSummary::default()));
        let totals = Rc::clone(&avatar_events);
        let _avatar_tap = self.avatar.events().add(move |event| {
            let mut t = totals.borrow_mut();
            match event {
                AvatarEvent::Moved { .. } => t.moves += 1,
                AvatarEvent::Turned { .. } => t.turns += 1,
                AvatarEvent::Fired { .. } => t.shots += 1,
                AvatarEvent::Collided { .. } => t.avatar_collisions += 1,
            }
        });

        player.connect(&session);

        let mut summary = RunSummary::default();
        let end = self.scene.borrow().clock() + seconds;
        while self.scene.borrow().clock() + 1e-9 < end {
            let now = self.scene.borrow().clock();
            summary.script_steps += player.advance(now);
            let report = self.step(dt);
            summary.ticks += 1;
            summary.disposed_nodes += report.disposed.len();
        }

        let totals = avatar_events.borrow();
        summary.moves = totals.moves;
        summary.turns = totals.turns;
        summary.shots = totals.shots;
        summary.avatar_collisions = totals.avatar_collisions;
        summary.controller_events = events.get();
        let scene = self.scene.borrow();
        summary.clock = scene.clock();
        summary.avatar_position = scene
            .world_transform(self.avatar.id())
            .map(|t| t.position)
            .unwrap_or(Vec3::ZERO);
        tracing::info!(ticks = summary.ticks, shots = summary.shots, "script finished");
        Ok(summary)
    }

    /// Release every subscription, the avatar and the XR camera. Idempotent.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.subscriptions.clear();
        self.bindings.borrow_mut().clear();
        self.avatar.dispose();
        if let Some(camera) = self.xr_camera.take() {
            if let Err(e) = self.scene.borrow_mut().dispose_node(camera) {
                tracing::warn!(error = %e, camera = %camera.short(), "XR camera disposal failed");
            }
        }
        self.session = None;
        tracing::info!("environment disposed");
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::RapierPhysicsProvider;
    use crate::xr::SimulatedXrRuntime;
    use glam::Vec2;
    use xrspace_input::{ControllerEventKind, Handedness, THUMBSTICK, TRIGGER};

    fn ready_environment(config: EnvironmentConfig) -> Environment {
        let mut env = Environment::new(config).unwrap();
        let physics = RapierPhysicsProvider::new(env.config().physics);
        pollster::block_on(env.initialize_physics(&physics)).unwrap();
        pollster::block_on(env.initialize_xr(&SimulatedXrRuntime::new())).unwrap();
        env
    }

    #[test]
    fn avatar_camera_is_active_at_start() {
        let env = Environment::new(EnvironmentConfig::default()).unwrap();
        assert_eq!(env.scene().borrow().active_camera(), Some(env.avatar().own_camera()));
        assert!(!env.readiness().is_ready());
    }

    #[test]
    fn controllers_added_later_are_bound() {
        let env = ready_environment(EnvironmentConfig::default());
        let kinds = Rc::new(RefCell::new(Vec::new()));
        let k = Rc::clone(&kinds);
        let _tap = env.controller_observable().add(move |e| k.borrow_mut().push(e.kind));

        let session = env.session().unwrap();
        let source = session.connect_controller(Handedness::Right);
        assert_eq!(env.binding_count(), 1);
        let controller = source.init_motion_controller(MotionController::standard(Handedness::Right));
        // init watcher + thumbstick, trigger, squeeze, a, b
        assert_eq!(env.binding_count(), 6);

        controller.component(TRIGGER).unwrap().update_button(true, 0.3);
        controller.component(THUMBSTICK).unwrap().update_axes(Vec2::new(0.5, 0.0));
        assert_eq!(
            *kinds.borrow(),
            vec![ControllerEventKind::RTrigger, ControllerEventKind::RStick]
        );
    }

    #[test]
    fn entering_xr_activates_xr_camera_under_avatar() {
        let env = ready_environment(EnvironmentConfig::default());
        let camera = env.xr_camera().unwrap();

        env.session().unwrap().enter();

        let scene = env.scene().borrow();
        assert_eq!(scene.active_camera(), Some(camera));
        assert_eq!(scene.graph().parent(camera), Some(env.avatar().id()));
        drop(scene);
        assert_eq!(env.avatar().movement_camera(), Some(camera));
    }

    #[test]
    fn physics_failure_does_not_advance_readiness() {
        struct Broken;
        impl PhysicsProvider for Broken {
            fn initialize(
                &self,
            ) -> impl std::future::Future<Output = Result<Box<dyn xrspace_physics::PhysicsBackend>, PhysicsError>>
            {
                std::future::ready(Err(PhysicsError::Initialization("no engine".into())))
            }
        }

        let mut env = Environment::new(EnvironmentConfig::default()).unwrap();
        let changes = Rc::new(Cell::new(0));
        let c = Rc::clone(&changes);
        let _sub = env.on_readiness_changed(move |_| c.set(c.get() + 1));

        let err = pollster::block_on(env.initialize_physics(&Broken)).unwrap_err();
        assert!(matches!(err, EnvironmentError::Physics(_)));
        assert_eq!(changes.get(), 0);
        assert!(!env.readiness().flags().physics_ready);
        assert!(env.avatar().body().is_none());
    }

    #[test]
    fn dispose_releases_everything() {
        let mut env = ready_environment(EnvironmentConfig::default());
        let session = Rc::clone(env.session().unwrap());
        let source = session.connect_controller(Handedness::Left);
        source.init_motion_controller(MotionController::standard(Handedness::Left));
        assert!(env.binding_count() > 0);

        env.dispose();
        env.dispose();

        assert!(env.is_disposed());
        assert_eq!(env.binding_count(), 0);
        assert_eq!(session.on_controller_added().observer_count(), 0);
        assert_eq!(env.controller_observable().observer_count(), 0);
        assert!(!env.scene().borrow().graph().contains(env.avatar().id()));
        assert!(matches!(
            pollster::block_on(env.initialize_xr(&SimulatedXrRuntime::new())),
            Err(EnvironmentError::Disposed)
        ));
    }

    #[test]
    fn dispose_tolerates_xr_camera_already_gone() {
        let mut env = ready_environment(EnvironmentConfig::default());
        let camera = env.xr_camera().unwrap();
        env.scene().borrow_mut().dispose_node(camera).unwrap();

        env.dispose();

        assert!(env.is_disposed());
        assert!(env.xr_camera().is_none());
        assert!(env.session().is_none());
        assert_eq!(env.binding_count(), 0);
    }
}
