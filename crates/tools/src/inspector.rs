use glam::Vec3;
use serde::Serialize;
use xrspace_common::NodeId;
use xrspace_physics::BodyHandle;
use xrspace_scene::Scene;

/// Read-only queries against a scene, for the CLI and debugging.
pub struct SceneInspector;

impl SceneInspector {
    /// Produce a summary of the scene state.
    pub fn summary(scene: &Scene) -> SceneSummary {
        SceneSummary {
            tick: scene.tick(),
            clock: scene.clock(),
            node_count: scene.graph().len(),
            body_count: scene.physics().map_or(0, |p| p.body_count()),
            pending_timers: scene.timers().len(),
            logged_events: scene.graph().events().len(),
            active_camera: scene.active_camera(),
        }
    }

    /// World-space details of one node, including its body's velocity if it has one.
    pub fn inspect_node(scene: &Scene, id: NodeId) -> Option<NodeInfo> {
        let node = scene.graph().get(id)?;
        let world = scene.world_transform(id)?;
        let body = scene.body_of(id);
        let velocity = body
            .zip(scene.physics())
            .and_then(|(b, physics)| physics.linear_velocity(b).ok());
        let r = world.rotation;
        Some(NodeInfo {
            id,
            name: node.name.clone(),
            kind: node.kind.label(),
            parent: node.parent,
            position: world.position.to_array(),
            rotation: [r.x, r.y, r.z, r.w],
            scale: world.scale.to_array(),
            body,
            velocity: velocity.map(|v| v.to_array()),
        })
    }

    /// List all node IDs in the scene.
    pub fn list_nodes(scene: &Scene) -> Vec<NodeId> {
        scene.graph().nodes().keys().copied().collect()
    }

    /// Nodes with the given name, in id order.
    pub fn find_by_name(scene: &Scene, name: &str) -> Vec<NodeId> {
        scene
            .graph()
            .nodes()
            .iter()
            .filter(|(_, n)| n.name == name)
            .map(|(id, _)| *id)
            .collect()
    }
}

/// Summary of scene state for the inspector.
#[derive(Debug, Clone, Serialize)]
pub struct SceneSummary {
    pub tick: u64,
    pub clock: f64,
    pub node_count: usize,
    pub body_count: usize,
    pub pending_timers: usize,
    pub logged_events: usize,
    pub active_camera: Option<NodeId>,
}

impl std::fmt::Display for SceneSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scene: tick={} clock={:.3}s nodes={} bodies={} timers={} events={}",
            self.tick,
            self.clock,
            self.node_count,
            self.body_count,
            self.pending_timers,
            self.logged_events
        )
    }
}

/// Detailed info about a single node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub kind: &'static str,
    pub parent: Option<NodeId>,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    pub body: Option<BodyHandle>,
    pub velocity: Option<[f32; 3]>,
}

impl std::fmt::Display for NodeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {:<10} pos=({:.2}, {:.2}, {:.2})",
            self.kind,
            self.id.short(),
            self.name,
            self.position[0],
            self.position[1],
            self.position[2],
        )?;
        if let Some(v) = self.velocity {
            write!(f, " vel=({:.2}, {:.2}, {:.2})", v[0], v[1], v[2])?;
        }
        Ok(())
    }
}
