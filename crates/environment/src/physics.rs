use std::future::Future;

use xrspace_physics::{PhysicsBackend, PhysicsConfig, PhysicsError, RapierBackend};

/// Asynchronously produces the physics backend for a scene.
pub trait PhysicsProvider {
    fn initialize(&self) -> impl Future<Output = Result<Box<dyn PhysicsBackend>, PhysicsError>>;
}

/// Provides [`RapierBackend`] with a fixed configuration.
#[derive(Debug, Clone, Default)]
pub struct RapierPhysicsProvider {
    config: PhysicsConfig,
}

impl RapierPhysicsProvider {
    pub fn new(config: PhysicsConfig) -> Self {
        Self { config }
    }
}

impl PhysicsProvider for RapierPhysicsProvider {
    fn initialize(&self) -> impl Future<Output = Result<Box<dyn PhysicsBackend>, PhysicsError>> {
        let gravity = self.config.gravity;
        let result = if gravity.is_finite() {
            tracing::debug!(?gravity, ground = ?self.config.ground_height, "physics initialized");
            Ok(Box::new(RapierBackend::new(self.config)) as Box<dyn PhysicsBackend>)
        } else {
            Err(PhysicsError::Initialization(format!(
                "gravity must be finite, got {gravity}"
            )))
        };
        std::future::ready(result)
    }
}
