use std::str::FromStr;

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};
use xrspace_common::{NodeId, Transform};
use xrspace_physics::{BodyDesc, CombineMode, MotionType, Shape};

use crate::error::SceneError;
use crate::graph::{LightInfo, MeshInfo, NodeKind, Primitive};
use crate::scene::Scene;

/// Seconds a bullet lives before the scene disposes it.
pub const BULLET_LIFETIME: f64 = 2.5;

/// Linear RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const WHITE: Color = Color::rgb(1.0, 1.0, 1.0);

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    pub fn to_hex(&self) -> String {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", c(self.r), c(self.g), c(self.b))
    }
}

impl FromStr for Color {
    type Err = SceneError;

    /// Parses `#rrggbb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SceneError::InvalidColor(s.to_string());
        let hex = s.strip_prefix('#').ok_or_else(invalid)?;
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(invalid());
        }
        let channel = |i: usize| {
            u8::from_str_radix(&hex[i..i + 2], 16)
                .map(|v| f32::from(v) / 255.0)
                .map_err(|_| invalid())
        };
        Ok(Color::rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

/// Builds scene content: primitives with physics, projectiles, lights.
///
/// Bodies are only attached when the scene has physics enabled.
#[derive(Debug, Clone)]
pub struct EnvironmentBuilder {
    bullet_lifetime: f64,
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self {
            bullet_lifetime: BULLET_LIFETIME,
        }
    }
}

impl EnvironmentBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bullet_lifetime(mut self, seconds: f64) -> Self {
        self.bullet_lifetime = seconds;
        self
    }

    pub fn bullet_lifetime(&self) -> f64 {
        self.bullet_lifetime
    }

    /// A glowing icosphere with a child point light and a dynamic sphere body.
    /// Both nodes are disposed together when the bullet's lifetime runs out.
    /// If the body cannot be attached, neither node is left behind.
    pub fn bullet(
        &self,
        scene: &mut Scene,
        position: Vec3,
        radius: f32,
        color: &str,
    ) -> Result<NodeId, SceneError> {
        let color: Color = color.parse()?;
        let mesh = scene.add_node(
            "bullet",
            NodeKind::Mesh(MeshInfo {
                primitive: Primitive::IcoSphere { radius },
                color,
            }),
            Transform::from_position(position),
        );
        let light = scene.add_node(
            "bullet light",
            NodeKind::Light(LightInfo { intensity: 0.02 }),
            Transform::default(),
        );

        if let Err(e) = arm_bullet(scene, mesh, light, radius) {
            for node in [mesh, light] {
                if !scene.graph().contains(node) {
                    continue;
                }
                if let Err(cleanup) = scene.dispose_node(node) {
                    tracing::warn!(error = %cleanup, node = %node.short(), "bullet cleanup failed");
                }
            }
            return Err(e);
        }
        scene.schedule_disposal(mesh, self.bullet_lifetime);
        Ok(mesh)
    }

    /// A bouncy-but-grippy dynamic sphere.
    pub fn sphere(
        &self,
        scene: &mut Scene,
        position: Vec3,
        radius: f32,
        color: &str,
    ) -> Result<NodeId, SceneError> {
        let color: Color = color.parse()?;
        let mesh = scene.add_node(
            "sphere",
            NodeKind::Mesh(MeshInfo {
                primitive: Primitive::Sphere { radius },
                color,
            }),
            Transform::from_position(position),
        );
        if scene.is_physics_enabled() {
            let desc = BodyDesc {
                restitution: 0.2,
                friction: 0.9,
                restitution_combine: CombineMode::Minimum,
                ..BodyDesc::sphere(radius, 10.0)
            };
            scene.attach_body(mesh, desc)?;
        }
        Ok(mesh)
    }

    /// A flat static ground plane lying in XZ.
    pub fn ground(
        &self,
        scene: &mut Scene,
        position: Vec3,
        width: f32,
        depth: f32,
        color: &str,
    ) -> Result<NodeId, SceneError> {
        let color: Color = color.parse()?;
        let plane = scene.add_node(
            "ground",
            NodeKind::Mesh(MeshInfo {
                primitive: Primitive::Plane {
                    width,
                    height: depth,
                },
                color,
            }),
            Transform {
                position,
                rotation: Quat::from_rotation_x(std::f32::consts::FRAC_PI_2),
                ..Transform::default()
            },
        );
        if scene.is_physics_enabled() {
            let shape = Shape::Box {
                half_extents: [width * 0.5, 0.01, depth * 0.5],
            };
            scene.attach_body(plane, BodyDesc::fixed(shape))?;
        }
        Ok(plane)
    }

    /// An unlit box around the viewer.
    pub fn skybox(&self, scene: &mut Scene, size: f32, color: &str) -> Result<NodeId, SceneError> {
        let color: Color = color.parse()?;
        Ok(scene.add_node(
            "skybox",
            NodeKind::Mesh(MeshInfo {
                primitive: Primitive::Box { size },
                color,
            }),
            Transform::default(),
        ))
    }

    pub fn light(&self, scene: &mut Scene, position: Vec3, intensity: f32) -> NodeId {
        scene.add_node(
            "light",
            NodeKind::Light(LightInfo { intensity }),
            Transform::from_position(position),
        )
    }
}

/// Parent the light under the bullet mesh and give the mesh its body.
fn arm_bullet(scene: &mut Scene, mesh: NodeId, light: NodeId, radius: f32) -> Result<(), SceneError> {
    scene.graph_mut().set_parent(light, Some(mesh))?;
    if scene.is_physics_enabled() {
        let desc = BodyDesc {
            motion_type: MotionType::Dynamic,
            ..BodyDesc::sphere(radius, 10.0)
        };
        scene.attach_body(mesh, desc)?;
    }
    Ok(())
}
