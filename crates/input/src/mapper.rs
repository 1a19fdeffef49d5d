use std::rc::{Rc, Weak};

use glam::Vec2;
use serde::{Deserialize, Serialize};
use xrspace_common::{Observable, Subscription, SubscriptionSet};

use crate::event::{ControllerEvent, ControllerEventKind};
use crate::hardware::{ComponentType, MotionController, XrComponent, XrInputSource};
use crate::mapping::{self, SQUEEZE, THUMBSTICK, TRIGGER};

/// Which components a variant listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingProfile {
    /// Thumbstick, trigger, squeeze and every button.
    #[default]
    Immersive,
    /// Thumbstick and buttons.
    Basic,
}

/// Re-emits hardware component changes as [`ControllerEvent`]s on a bus.
#[derive(Debug, Clone)]
pub struct InputMapper {
    bus: Observable<ControllerEvent>,
    profile: BindingProfile,
}

impl InputMapper {
    pub fn new(bus: Observable<ControllerEvent>, profile: BindingProfile) -> Self {
        Self { bus, profile }
    }

    pub fn profile(&self) -> BindingProfile {
        self.profile
    }

    /// Subscribe to every component of `controller` that the profile covers.
    /// Dropping the returned set releases every hardware subscription.
    pub fn bind(&self, source: &Rc<XrInputSource>, controller: &MotionController) -> SubscriptionSet {
        let mut bindings = SubscriptionSet::new();

        if let Some(stick) = controller.component(THUMBSTICK) {
            bindings.push(self.bind_axes(&stick, source));
        }
        if self.profile == BindingProfile::Immersive {
            for id in [TRIGGER, SQUEEZE] {
                if let Some(component) = controller.component(id) {
                    bindings.push(self.bind_button(&component, source));
                }
            }
        }
        for button in controller.components_of_type(ComponentType::Button) {
            bindings.push(self.bind_button(&button, source));
        }

        tracing::debug!(
            source = source.id(),
            hand = source.handedness().label(),
            profile = ?self.profile,
            bindings = bindings.len(),
            "controller bound"
        );
        bindings
    }

    fn bind_button(&self, component: &XrComponent, source: &Rc<XrInputSource>) -> Subscription {
        let kind = mapping::classify(component.id(), component.kind(), source.handedness());
        let bus = self.bus.clone();
        let source: Weak<XrInputSource> = Rc::downgrade(source);
        component.on_button_state_changed().add(move |change| {
            let Some(controller) = source.upgrade() else {
                return;
            };
            tracing::trace!(%kind, pressed = change.pressed, value = change.value, "button");
            bus.notify(&ControllerEvent::button(kind, *change, controller));
        })
    }

    fn bind_axes(&self, component: &XrComponent, source: &Rc<XrInputSource>) -> Subscription {
        let kind = mapping::classify(component.id(), component.kind(), source.handedness());
        if kind == ControllerEventKind::Other {
            tracing::debug!(source = source.id(), "thumbstick without a hand maps to OTHER");
        }
        let bus = self.bus.clone();
        let source: Weak<XrInputSource> = Rc::downgrade(source);
        component.on_axis_value_changed().add(move |axes: &Vec2| {
            let Some(controller) = source.upgrade() else {
                return;
            };
            tracing::trace!(%kind, x = axes.x, y = axes.y, "axes");
            bus.notify(&ControllerEvent::stick(kind, *axes, controller));
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventValue;
    use crate::hardware::Handedness;
    use std::cell::RefCell;

    struct Rig {
        bus: Observable<ControllerEvent>,
        seen: Rc<RefCell<Vec<(ControllerEventKind, Option<EventValue>)>>>,
        _tap: Subscription,
    }

    fn rig() -> Rig {
        let bus = Observable::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let tap = bus.add(move |e: &ControllerEvent| s.borrow_mut().push((e.kind, e.value)));
        Rig {
            bus,
            seen,
            _tap: tap,
        }
    }

    fn controller(hand: Handedness) -> (Rc<XrInputSource>, MotionController) {
        (
            Rc::new(XrInputSource::new(1, hand)),
            MotionController::standard(hand),
        )
    }

    #[test]
    fn every_update_emits_in_order() {
        let rig = rig();
        let (source, mc) = controller(Handedness::Right);
        let _bindings = InputMapper::new(rig.bus.clone(), BindingProfile::Immersive).bind(&source, &mc);

        let trigger = mc.component(TRIGGER).unwrap();
        let stick = mc.component(THUMBSTICK).unwrap();
        trigger.update_button(false, 0.2);
        trigger.update_button(false, 0.2);
        stick.update_axes(Vec2::new(0.0, -1.0));
        mc.component("a-button").unwrap().update_button(true, 1.0);

        assert_eq!(
            *rig.seen.borrow(),
            vec![
                (ControllerEventKind::RTrigger, Some(EventValue::Scalar(0.2))),
                (ControllerEventKind::RTrigger, Some(EventValue::Scalar(0.2))),
                (ControllerEventKind::RStick, Some(EventValue::Axis(Vec2::new(0.0, -1.0)))),
                (ControllerEventKind::A, Some(EventValue::Scalar(1.0))),
            ]
        );
    }

    #[test]
    fn handless_stick_emits_other() {
        let rig = rig();
        let (source, mc) = controller(Handedness::None);
        let _bindings = InputMapper::new(rig.bus.clone(), BindingProfile::Immersive).bind(&source, &mc);

        mc.component(THUMBSTICK).unwrap().update_axes(Vec2::new(1.0, 0.0));
        mc.component(TRIGGER).unwrap().update_button(true, 1.0);

        let seen = rig.seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|(k, _)| *k == ControllerEventKind::Other));
    }

    #[test]
    fn basic_profile_skips_trigger_and_grip() {
        let rig = rig();
        let (source, mc) = controller(Handedness::Left);
        let bindings = InputMapper::new(rig.bus.clone(), BindingProfile::Basic).bind(&source, &mc);
        // thumbstick + x + y
        assert_eq!(bindings.len(), 3);

        mc.component(TRIGGER).unwrap().update_button(true, 1.0);
        mc.component(SQUEEZE).unwrap().update_button(true, 1.0);
        mc.component("x-button").unwrap().update_button(true, 1.0);

        assert_eq!(*rig.seen.borrow(), vec![(ControllerEventKind::X, Some(EventValue::Scalar(1.0)))]);
    }

    #[test]
    fn dropping_bindings_stops_events() {
        let rig = rig();
        let (source, mc) = controller(Handedness::Left);
        let bindings = InputMapper::new(rig.bus.clone(), BindingProfile::Immersive).bind(&source, &mc);
        let stick = mc.component(THUMBSTICK).unwrap();

        stick.update_axes(Vec2::X);
        drop(bindings);
        stick.update_axes(Vec2::Y);

        assert_eq!(rig.seen.borrow().len(), 1);
        assert_eq!(stick.on_axis_value_changed().observer_count(), 0);
    }

    #[test]
    fn events_reference_their_controller() {
        let bus: Observable<ControllerEvent> = Observable::new();
        let ids = Rc::new(RefCell::new(Vec::new()));
        let i = Rc::clone(&ids);
        let _tap = bus.add(move |e: &ControllerEvent| i.borrow_mut().push(e.controller.id()));

        let (source, mc) = controller(Handedness::Right);
        let _bindings = InputMapper::new(bus, BindingProfile::Immersive).bind(&source, &mc);
        mc.component(SQUEEZE).unwrap().update_button(true, 0.9);

        assert_eq!(*ids.borrow(), vec![1]);
    }
}
