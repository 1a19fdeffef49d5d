use std::fmt;
use std::rc::Rc;

use glam::Vec2;
use serde::{Deserialize, Serialize};

use crate::hardware::{ButtonChange, Handedness, XrInputSource};

/// Hand-qualified input sources. Closed set; unrecognized input is `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerEventKind {
    A,
    B,
    X,
    Y,
    RGrip,
    RTrigger,
    RStick,
    LGrip,
    LTrigger,
    LStick,
    Other,
}

impl ControllerEventKind {
    pub fn is_stick(&self) -> bool {
        matches!(self, Self::LStick | Self::RStick)
    }

    /// Hand implied by the kind. Face buttons are tied to a hand by layout.
    pub fn handedness(&self) -> Handedness {
        match self {
            Self::A | Self::B | Self::RGrip | Self::RTrigger | Self::RStick => Handedness::Right,
            Self::X | Self::Y | Self::LGrip | Self::LTrigger | Self::LStick => Handedness::Left,
            Self::Other => Handedness::None,
        }
    }
}

impl fmt::Display for ControllerEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::A => "A",
            Self::B => "B",
            Self::X => "X",
            Self::Y => "Y",
            Self::RGrip => "R_GRIP",
            Self::RTrigger => "R_TRIGGER",
            Self::RStick => "R_STICK",
            Self::LGrip => "L_GRIP",
            Self::LTrigger => "L_TRIGGER",
            Self::LStick => "L_STICK",
            Self::Other => "OTHER",
        };
        f.write_str(name)
    }
}

/// Event payload: a scalar for buttons, triggers and grips; two axes for sticks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EventValue {
    Scalar(f32),
    Axis(Vec2),
}

/// A normalized controller input notification.
///
/// Button-like events carry `down`/`up` flags that are never both true.
/// Stick events carry no flags.
#[derive(Debug, Clone)]
pub struct ControllerEvent {
    pub kind: ControllerEventKind,
    pub value: Option<EventValue>,
    pub down: Option<bool>,
    pub up: Option<bool>,
    pub controller: Rc<XrInputSource>,
}

impl ControllerEvent {
    pub fn button(kind: ControllerEventKind, change: ButtonChange, controller: Rc<XrInputSource>) -> Self {
        Self {
            kind,
            value: Some(EventValue::Scalar(change.value)),
            down: Some(change.pressed),
            up: Some(!change.pressed),
            controller,
        }
    }

    pub fn stick(kind: ControllerEventKind, axes: Vec2, controller: Rc<XrInputSource>) -> Self {
        Self {
            kind,
            value: Some(EventValue::Axis(axes)),
            down: None,
            up: None,
            controller,
        }
    }

    /// Scalar payload, if this event carries one.
    pub fn scalar(&self) -> Option<f32> {
        match self.value {
            Some(EventValue::Scalar(v)) => Some(v),
            _ => None,
        }
    }

    /// Two-axis payload, if this event carries one.
    pub fn axes(&self) -> Option<Vec2> {
        match self.value {
            Some(EventValue::Axis(v)) => Some(v),
            _ => None,
        }
    }

    pub fn is_down(&self) -> bool {
        self.down.unwrap_or(false)
    }
}
