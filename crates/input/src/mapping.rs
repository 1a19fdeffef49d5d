//! Pure classification of hardware components into event kinds.

use crate::event::ControllerEventKind;
use crate::hardware::{ComponentType, Handedness};

pub const TRIGGER: &str = "xr-standard-trigger";
pub const SQUEEZE: &str = "xr-standard-squeeze";
pub const THUMBSTICK: &str = "xr-standard-thumbstick";

pub fn map_button(id: &str) -> ControllerEventKind {
    match id {
        "a-button" => ControllerEventKind::A,
        "b-button" => ControllerEventKind::B,
        "x-button" => ControllerEventKind::X,
        "y-button" => ControllerEventKind::Y,
        _ => ControllerEventKind::Other,
    }
}

pub fn map_trigger(hand: Handedness) -> ControllerEventKind {
    match hand {
        Handedness::Right => ControllerEventKind::RTrigger,
        Handedness::Left => ControllerEventKind::LTrigger,
        Handedness::None => ControllerEventKind::Other,
    }
}

pub fn map_grip(hand: Handedness) -> ControllerEventKind {
    match hand {
        Handedness::Right => ControllerEventKind::RGrip,
        Handedness::Left => ControllerEventKind::LGrip,
        Handedness::None => ControllerEventKind::Other,
    }
}

pub fn map_stick(hand: Handedness) -> ControllerEventKind {
    match hand {
        Handedness::Right => ControllerEventKind::RStick,
        Handedness::Left => ControllerEventKind::LStick,
        Handedness::None => ControllerEventKind::Other,
    }
}

/// Classify any component. Total: every input maps to some kind.
pub fn classify(id: &str, kind: ComponentType, hand: Handedness) -> ControllerEventKind {
    match kind {
        ComponentType::Thumbstick => map_stick(hand),
        ComponentType::Trigger => map_trigger(hand),
        ComponentType::Squeeze => map_grip(hand),
        ComponentType::Button | ComponentType::Touchpad => map_button(id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_buttons() {
        assert_eq!(map_button("a-button"), ControllerEventKind::A);
        assert_eq!(map_button("b-button"), ControllerEventKind::B);
        assert_eq!(map_button("x-button"), ControllerEventKind::X);
        assert_eq!(map_button("y-button"), ControllerEventKind::Y);
        assert_eq!(map_button("menu"), ControllerEventKind::Other);
    }

    #[test]
    fn hand_qualified_components() {
        assert_eq!(
            classify(TRIGGER, ComponentType::Trigger, Handedness::Right),
            ControllerEventKind::RTrigger
        );
        assert_eq!(
            classify(SQUEEZE, ComponentType::Squeeze, Handedness::Left),
            ControllerEventKind::LGrip
        );
        assert_eq!(
            classify(THUMBSTICK, ComponentType::Thumbstick, Handedness::Left),
            ControllerEventKind::LStick
        );
    }

    #[test]
    fn unknown_hand_is_other_for_every_type() {
        for kind in [
            ComponentType::Thumbstick,
            ComponentType::Trigger,
            ComponentType::Squeeze,
        ] {
            assert_eq!(
                classify("anything", kind, Handedness::None),
                ControllerEventKind::Other
            );
        }
    }

    #[test]
    fn buttons_ignore_hand() {
        assert_eq!(
            classify("a-button", ComponentType::Button, Handedness::None),
            ControllerEventKind::A
        );
    }
}
