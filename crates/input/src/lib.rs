//! Controller input: raw XR hardware components in, normalized
//! [`ControllerEvent`]s out.
//!
//! # Invariants
//! - Classification of a component is total: anything unrecognized is
//!   [`ControllerEventKind::Other`], never dropped.
//! - Every hardware update produces exactly one event, delivered in hardware order.
//! - Basic and immersive variants share the same event vocabulary.

pub mod event;
pub mod hardware;
pub mod mapper;
pub mod mapping;

pub use event::{ControllerEvent, ControllerEventKind, EventValue};
pub use hardware::{ButtonChange, ComponentType, Handedness, MotionController, XrComponent, XrInputSource};
pub use mapper::{BindingProfile, InputMapper};
pub use mapping::{SQUEEZE, THUMBSTICK, TRIGGER};

pub fn crate_info() -> &'static str {
    "xrspace-input v0.1.0"
}
