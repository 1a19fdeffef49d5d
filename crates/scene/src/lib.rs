//! Scene: node graph, active camera, scene clock, timers and physics hookup.
//!
//! # Invariants
//! - Every mutation of the graph is recorded in the scene event log.
//! - A node has at most one physics body; disposing a node disposes its
//!   subtree and every body attached to it.
//! - Observers registered through [`SceneHandle`] are notified only after the
//!   scene borrow is released, so they may freely borrow the scene again.
//! - Timers run on scene time, never wall-clock time.

mod builder;
mod error;
mod graph;
mod scene;
mod timer;

pub use builder::{BULLET_LIFETIME, Color, EnvironmentBuilder};
pub use error::SceneError;
pub use graph::{CameraInfo, LightInfo, MeshInfo, Node, NodeKind, Primitive, SceneEvent, SceneGraph};
pub use scene::{NodeCollision, PhysicsTick, Scene, SceneHandle, StepReport, WeakScene};
pub use timer::{TimerAction, TimerId, TimerRegistry};

pub fn crate_info() -> &'static str {
    "xrspace-scene v0.1.0"
}
