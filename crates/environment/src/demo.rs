//! The demo world: a light, a skybox, a ground plane and a field of falling
//! spheres scattered by a seeded generator.

use glam::Vec3;
use serde::{Deserialize, Serialize};
use xrspace_common::NodeId;
use xrspace_scene::{Color, EnvironmentBuilder, Scene, SceneError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    pub enabled: bool,
    pub spheres: usize,
    pub seed: u64,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            spheres: 100,
            seed: 42,
        }
    }
}

/// Splitmix64 stream. Same seed, same scene, on every platform.
#[derive(Debug, Clone)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform in `[0, 1)`.
    pub fn next_f32(&mut self) -> f32 {
        // top 24 bits fill the f32 mantissa exactly
        (self.next_u64() >> 40) as f32 / (1u64 << 24) as f32
    }
}

/// Node ids of what [`populate`] built.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoScene {
    pub light: NodeId,
    pub skybox: NodeId,
    pub ground: NodeId,
    pub spheres: Vec<NodeId>,
}

pub fn populate(
    scene: &mut Scene,
    builder: &EnvironmentBuilder,
    config: &DemoConfig,
) -> Result<DemoScene, SceneError> {
    let mut rng = SplitMix64::new(config.seed);

    let light = builder.light(scene, Vec3::new(1.0, 50.0, 0.0), 0.4);
    let skybox = builder.skybox(scene, 999.0, "#ff0000")?;
    let ground = builder.ground(scene, Vec3::new(0.0, -1.0, 0.0), 1000.0, 1000.0, "#224411")?;

    let mut spheres = Vec::with_capacity(config.spheres);
    for _ in 0..config.spheres {
        let x = rng.next_f32() * 500.0 - 250.0;
        let z = rng.next_f32() * 500.0 - 250.0;
        let y = rng.next_f32() * 10.0 + 10.0;
        let radius = (rng.next_f32() * 1.5).max(0.05);
        let color = Color::rgb(rng.next_f32(), rng.next_f32(), rng.next_f32()).to_hex();
        let sphere = builder.sphere(scene, Vec3::new(x, y, z), radius, &color)?;

        let vy = rng.next_f32() * 100.0 - 50.0;
        if let (Some(body), Some(physics)) = (scene.body_of(sphere), scene.physics_mut()) {
            physics.set_linear_velocity(body, Vec3::new(0.0, vy, 0.0))?;
        }
        spheres.push(sphere);
    }

    tracing::info!(seed = config.seed, spheres = spheres.len(), "demo scene built");
    Ok(DemoScene {
        light,
        skybox,
        ground,
        spheres,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use xrspace_physics::{PhysicsConfig, RapierBackend};

    #[test]
    fn generator_is_deterministic_and_in_range() {
        let mut a = SplitMix64::new(7);
        let mut b = SplitMix64::new(7);
        for _ in 0..1000 {
            let v = a.next_f32();
            assert_eq!(v, b.next_f32());
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn populate_builds_every_piece() {
        let mut scene = Scene::new();
        scene.enable_physics(Box::new(RapierBackend::new(PhysicsConfig::default())));
        let config = DemoConfig {
            spheres: 12,
            ..DemoConfig::default()
        };

        let demo = populate(&mut scene, &EnvironmentBuilder::new(), &config).unwrap();

        assert_eq!(demo.spheres.len(), 12);
        // 12 spheres + the static ground
        assert_eq!(scene.physics().unwrap().body_count(), 13);
        for sphere in &demo.spheres {
            let p = scene.world_transform(*sphere).unwrap().position;
            assert!((-250.0..250.0).contains(&p.x));
            assert!((10.0..20.0).contains(&p.y));
        }
    }

    #[test]
    fn same_seed_same_layout() {
        let layout = |seed| {
            let mut scene = Scene::new();
            let config = DemoConfig {
                spheres: 5,
                seed,
                ..DemoConfig::default()
            };
            let demo = populate(&mut scene, &EnvironmentBuilder::new(), &config).unwrap();
            demo.spheres
                .iter()
                .map(|s| scene.world_transform(*s).unwrap().position)
                .collect::<Vec<_>>()
        };
        assert_eq!(layout(3), layout(3));
        assert_ne!(layout(3), layout(4));
    }
}
