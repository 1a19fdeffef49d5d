use xrspace_common::NodeId;
use xrspace_physics::PhysicsError;

/// Errors from scene operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SceneError {
    #[error("unknown node: {0:?}")]
    UnknownNode(NodeId),
    #[error("node {0:?} is not a camera")]
    NotACamera(NodeId),
    #[error("parenting {child:?} under {parent:?} would create a cycle")]
    ParentCycle { child: NodeId, parent: NodeId },
    #[error("physics is not enabled on this scene")]
    PhysicsDisabled,
    #[error("node {0:?} already has a physics body")]
    AlreadyHasBody(NodeId),
    #[error("invalid color {0:?}, expected #rrggbb")]
    InvalidColor(String),
    #[error(transparent)]
    Physics(#[from] PhysicsError),
}
