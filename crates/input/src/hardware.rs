//! Model of XR controller hardware as the runtime exposes it.
//!
//! The XR runtime owns these objects and pushes updates into them; everything
//! else observes.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use glam::Vec2;
use serde::{Deserialize, Serialize};
use xrspace_common::{Observable, Pose, Ray};

use crate::mapping::{SQUEEZE, THUMBSTICK, TRIGGER};

/// Which hand holds a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Handedness {
    Left,
    Right,
    #[default]
    None,
}

impl Handedness {
    /// Total parse of the runtime's handedness label.
    pub fn from_label(label: &str) -> Self {
        match label {
            "left" => Self::Left,
            "right" => Self::Right,
            _ => Self::None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::None => "none",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Trigger,
    Squeeze,
    Thumbstick,
    Touchpad,
    Button,
}

/// A button-like state change: pressed flag plus analog value in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonChange {
    pub pressed: bool,
    pub value: f32,
}

#[derive(Debug, Default)]
struct ComponentState {
    pressed: bool,
    value: f32,
    axes: Vec2,
}

/// One physical input on a motion controller.
#[derive(Debug)]
pub struct XrComponent {
    id: String,
    kind: ComponentType,
    state: RefCell<ComponentState>,
    on_button_state_changed: Observable<ButtonChange>,
    on_axis_value_changed: Observable<Vec2>,
}

impl XrComponent {
    pub fn new(id: impl Into<String>, kind: ComponentType) -> Self {
        Self {
            id: id.into(),
            kind,
            state: RefCell::new(ComponentState::default()),
            on_button_state_changed: Observable::new(),
            on_axis_value_changed: Observable::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ComponentType {
        self.kind
    }

    pub fn pressed(&self) -> bool {
        self.state.borrow().pressed
    }

    pub fn value(&self) -> f32 {
        self.state.borrow().value
    }

    pub fn axes(&self) -> Vec2 {
        self.state.borrow().axes
    }

    pub fn on_button_state_changed(&self) -> &Observable<ButtonChange> {
        &self.on_button_state_changed
    }

    pub fn on_axis_value_changed(&self) -> &Observable<Vec2> {
        &self.on_axis_value_changed
    }

    /// Hardware side: record a button/trigger/grip change and notify.
    pub fn update_button(&self, pressed: bool, value: f32) {
        let value = value.clamp(0.0, 1.0);
        {
            let mut state = self.state.borrow_mut();
            state.pressed = pressed;
            state.value = value;
        }
        self.on_button_state_changed
            .notify(&ButtonChange { pressed, value });
    }

    /// Hardware side: record an axis change and notify.
    pub fn update_axes(&self, axes: Vec2) {
        self.state.borrow_mut().axes = axes;
        self.on_axis_value_changed.notify(&axes);
    }
}

/// The set of components a controller profile exposes, keyed by component id.
#[derive(Debug)]
pub struct MotionController {
    profile: String,
    components: BTreeMap<String, Rc<XrComponent>>,
}

impl MotionController {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            components: BTreeMap::new(),
        }
    }

    /// The generic trigger/squeeze/thumbstick layout, with A/B on the right
    /// hand and X/Y on the left.
    pub fn standard(handedness: Handedness) -> Self {
        let mut controller = Self::new("generic-trigger-squeeze-thumbstick");
        controller.add_component(XrComponent::new(TRIGGER, ComponentType::Trigger));
        controller.add_component(XrComponent::new(SQUEEZE, ComponentType::Squeeze));
        controller.add_component(XrComponent::new(THUMBSTICK, ComponentType::Thumbstick));
        let buttons: &[&str] = match handedness {
            Handedness::Right => &["a-button", "b-button"],
            Handedness::Left => &["x-button", "y-button"],
            Handedness::None => &[],
        };
        for id in buttons {
            controller.add_component(XrComponent::new(*id, ComponentType::Button));
        }
        controller
    }

    pub fn add_component(&mut self, component: XrComponent) -> Rc<XrComponent> {
        let component = Rc::new(component);
        self.components
            .insert(component.id().to_string(), Rc::clone(&component));
        component
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn component(&self, id: &str) -> Option<Rc<XrComponent>> {
        self.components.get(id).cloned()
    }

    pub fn components(&self) -> impl Iterator<Item = &Rc<XrComponent>> {
        self.components.values()
    }

    pub fn components_of_type(&self, kind: ComponentType) -> Vec<Rc<XrComponent>> {
        self.components
            .values()
            .filter(|c| c.kind() == kind)
            .cloned()
            .collect()
    }
}

/// A tracked controller: handedness, grip and pointer poses, and the motion
/// controller once the runtime has identified it.
#[derive(Debug)]
pub struct XrInputSource {
    id: u32,
    handedness: Handedness,
    grip: Cell<Option<Pose>>,
    pointer: Cell<Pose>,
    motion_controller: RefCell<Option<Rc<MotionController>>>,
    on_motion_controller_init: Observable<Rc<MotionController>>,
}

impl XrInputSource {
    pub fn new(id: u32, handedness: Handedness) -> Self {
        Self {
            id,
            handedness,
            grip: Cell::new(None),
            pointer: Cell::new(Pose::default()),
            motion_controller: RefCell::new(None),
            on_motion_controller_init: Observable::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }

    /// World pose of the grip, if the controller reports one.
    pub fn grip(&self) -> Option<Pose> {
        self.grip.get()
    }

    pub fn set_grip(&self, pose: Option<Pose>) {
        self.grip.set(pose);
    }

    pub fn pointer(&self) -> Pose {
        self.pointer.get()
    }

    pub fn set_pointer(&self, pose: Pose) {
        self.pointer.set(pose);
    }

    /// World-space ray along the pointer's forward axis.
    pub fn world_pointer_ray(&self) -> Ray {
        self.pointer.get().ray()
    }

    pub fn motion_controller(&self) -> Option<Rc<MotionController>> {
        self.motion_controller.borrow().clone()
    }

    pub fn on_motion_controller_init(&self) -> &Observable<Rc<MotionController>> {
        &self.on_motion_controller_init
    }

    /// Runtime side: the controller's profile has loaded.
    pub fn init_motion_controller(&self, controller: MotionController) -> Rc<MotionController> {
        let controller = Rc::new(controller);
        *self.motion_controller.borrow_mut() = Some(Rc::clone(&controller));
        tracing::debug!(
            source = self.id,
            hand = self.handedness.label(),
            profile = controller.profile(),
            "motion controller initialized"
        );
        self.on_motion_controller_init.notify(&controller);
        controller
    }
}
