use std::collections::BTreeMap;

use glam::Vec3;
use serde::{Deserialize, Serialize};
use xrspace_common::{NodeId, Transform};

use crate::builder::Color;
use crate::error::SceneError;

/// An event record produced by every mutation of the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SceneEvent {
    Added { id: NodeId, name: String },
    /// Node was disposed together with its subtree.
    Disposed { id: NodeId },
    Reparented {
        id: NodeId,
        parent: Option<NodeId>,
    },
    ActiveCameraChanged { camera: NodeId },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    /// Vertical field of view in radians.
    pub fov: f32,
}

impl Default for CameraInfo {
    fn default() -> Self {
        Self {
            fov: 0.8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Primitive {
    Sphere { radius: f32 },
    IcoSphere { radius: f32 },
    Cylinder { diameter: f32, height: f32 },
    Plane { width: f32, height: f32 },
    Box { size: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeshInfo {
    pub primitive: Primitive,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LightInfo {
    pub intensity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Transform,
    Camera(CameraInfo),
    Mesh(MeshInfo),
    Light(LightInfo),
}

impl NodeKind {
    pub fn is_camera(&self) -> bool {
        matches!(self, Self::Camera(_))
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Transform => "transform",
            Self::Camera(_) => "camera",
            Self::Mesh(_) => "mesh",
            Self::Light(_) => "light",
        }
    }
}

/// A node in the scene graph. `local` is relative to `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub local: Transform,
    pub parent: Option<NodeId>,
}

/// Parent/child tree of nodes.
///
/// Uses BTreeMap for deterministic iteration order.
#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    nodes: BTreeMap<NodeId, Node>,
    event_log: Vec<SceneEvent>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> &BTreeMap<NodeId, Node> {
        &self.nodes
    }

    /// Read-only access to the event log.
    pub fn events(&self) -> &[SceneEvent] {
        &self.event_log
    }

    /// Drain and return the event log.
    pub fn drain_events(&mut self) -> Vec<SceneEvent> {
        std::mem::take(&mut self.event_log)
    }

    pub(crate) fn record(&mut self, event: SceneEvent) {
        self.event_log.push(event);
    }

    /// Add a root node. Returns its id.
    pub fn add(&mut self, name: impl Into<String>, kind: NodeKind, local: Transform) -> NodeId {
        let id = NodeId::new();
        let name = name.into();
        self.nodes.insert(
            id,
            Node {
                name: name.clone(),
                kind,
                local,
                parent: None,
            },
        );
        self.event_log.push(SceneEvent::Added { id, name });
        id
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(&id).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|(_, n)| n.parent == Some(id))
            .map(|(child, _)| *child)
            .collect()
    }

    /// Attach `child` under `parent`, or detach it to the root with `None`.
    /// The child's local transform is kept as-is.
    pub fn set_parent(&mut self, child: NodeId, parent: Option<NodeId>) -> Result<(), SceneError> {
        if !self.contains(child) {
            return Err(SceneError::UnknownNode(child));
        }
        if let Some(p) = parent {
            if !self.contains(p) {
                return Err(SceneError::UnknownNode(p));
            }
            let mut cursor = Some(p);
            while let Some(ancestor) = cursor {
                if ancestor == child {
                    return Err(SceneError::ParentCycle { child, parent: p });
                }
                cursor = self.parent(ancestor);
            }
        }
        if let Some(node) = self.nodes.get_mut(&child) {
            node.parent = parent;
        }
        self.event_log.push(SceneEvent::Reparented { id: child, parent });
        Ok(())
    }

    pub fn set_local(&mut self, id: NodeId, local: Transform) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(&id).ok_or(SceneError::UnknownNode(id))?;
        node.local = local;
        Ok(())
    }

    pub fn set_local_position(&mut self, id: NodeId, position: Vec3) -> Result<(), SceneError> {
        let node = self.nodes.get_mut(&id).ok_or(SceneError::UnknownNode(id))?;
        node.local.position = position;
        Ok(())
    }

    /// Absolute transform, composed through the parent chain.
    pub fn world_transform(&self, id: NodeId) -> Option<Transform> {
        let node = self.nodes.get(&id)?;
        match node.parent {
            Some(parent) => {
                let parent_world = self.world_transform(parent)?;
                Some(parent_world.mul_transform(&node.local))
            }
            None => Some(node.local),
        }
    }

    /// Place a node at an absolute transform by solving for its local transform.
    pub fn set_world_transform(&mut self, id: NodeId, world: Transform) -> Result<(), SceneError> {
        let parent = self
            .nodes
            .get(&id)
            .ok_or(SceneError::UnknownNode(id))?
            .parent;
        let local = match parent.and_then(|p| self.world_transform(p)) {
            Some(p) => {
                let inv = p.rotation.inverse();
                Transform {
                    position: (inv * (world.position - p.position)) / p.scale,
                    rotation: (inv * world.rotation).normalize(),
                    scale: world.scale / p.scale,
                }
            }
            None => world,
        };
        self.set_local(id, local)
    }

    /// Remove `id` and all of its descendants. Returns the removed ids,
    /// descendants first.
    pub fn remove_subtree(&mut self, id: NodeId) -> Result<Vec<NodeId>, SceneError> {
        if !self.contains(id) {
            return Err(SceneError::UnknownNode(id));
        }
        let mut removed = Vec::new();
        self.collect_subtree(id, &mut removed);
        for node in &removed {
            self.nodes.remove(node);
        }
        self.event_log.push(SceneEvent::Disposed { id });
        Ok(removed)
    }

    fn collect_subtree(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(id) {
            self.collect_subtree(child, out);
        }
        out.push(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Quat;

    fn root(graph: &mut SceneGraph, position: Vec3) -> NodeId {
        graph.add("root", NodeKind::Transform, Transform::from_position(position))
    }

    #[test]
    fn graph_starts_empty() {
        let g = SceneGraph::new();
        assert!(g.is_empty());
        assert!(g.events().is_empty());
    }

    #[test]
    fn child_world_transform_follows_parent() {
        let mut g = SceneGraph::new();
        let parent = root(&mut g, Vec3::new(0.0, 10.0, 0.0));
        let child = g.add(
            "child",
            NodeKind::Transform,
            Transform::from_position(Vec3::new(0.0, 1.6, 0.0)),
        );
        g.set_parent(child, Some(parent)).unwrap();

        let world = g.world_transform(child).unwrap();
        assert_eq!(world.position, Vec3::new(0.0, 11.6, 0.0));
        assert_eq!(g.children(parent), vec![child]);
    }

    #[test]
    fn parent_cycle_rejected() {
        let mut g = SceneGraph::new();
        let a = root(&mut g, Vec3::ZERO);
        let b = root(&mut g, Vec3::ZERO);
        g.set_parent(b, Some(a)).unwrap();
        assert_eq!(
            g.set_parent(a, Some(b)),
            Err(SceneError::ParentCycle { child: a, parent: b })
        );
        assert_eq!(
            g.set_parent(a, Some(a)),
            Err(SceneError::ParentCycle { child: a, parent: a })
        );
    }

    #[test]
    fn set_world_transform_solves_local() {
        let mut g = SceneGraph::new();
        let parent = g.add(
            "parent",
            NodeKind::Transform,
            Transform {
                position: Vec3::new(5.0, 0.0, 0.0),
                rotation: Quat::from_rotation_y(1.0),
                ..Transform::default()
            },
        );
        let child = root(&mut g, Vec3::ZERO);
        g.set_parent(child, Some(parent)).unwrap();

        let target = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_x(0.5),
            ..Transform::default()
        };
        g.set_world_transform(child, target).unwrap();
        let world = g.world_transform(child).unwrap();
        assert!((world.position - target.position).length() < 1e-4);
        assert!(world.rotation.abs_diff_eq(target.rotation, 1e-4));
    }

    #[test]
    fn remove_subtree_takes_descendants() {
        let mut g = SceneGraph::new();
        let a = root(&mut g, Vec3::ZERO);
        let b = root(&mut g, Vec3::ZERO);
        let c = root(&mut g, Vec3::ZERO);
        let other = root(&mut g, Vec3::ZERO);
        g.set_parent(b, Some(a)).unwrap();
        g.set_parent(c, Some(b)).unwrap();

        let removed = g.remove_subtree(a).unwrap();
        assert_eq!(removed, vec![c, b, a]);
        assert_eq!(g.len(), 1);
        assert!(g.contains(other));
        assert!(matches!(g.events().last(), Some(SceneEvent::Disposed { id }) if *id == a));
    }

    #[test]
    fn unknown_nodes_are_errors() {
        let mut g = SceneGraph::new();
        let ghost = NodeId::new();
        assert_eq!(g.remove_subtree(ghost), Err(SceneError::UnknownNode(ghost)));
        assert_eq!(g.set_parent(ghost, None), Err(SceneError::UnknownNode(ghost)));
        assert!(g.world_transform(ghost).is_none());
    }
}
