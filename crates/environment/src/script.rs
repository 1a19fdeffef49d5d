//! Timed controller input, replayed against an [`XrSession`].
//!
//! ```json
//! {
//!   "controllers": [{"handedness": "right", "grip": [0.2, 1.2, 0.3]}],
//!   "steps": [
//!     {"at": 0.5, "hand": "right", "component": "xr-standard-trigger", "value": 0.7},
//!     {"at": 1.0, "hand": "right", "component": "xr-standard-thumbstick", "axes": [0.0, -1.0]}
//!   ]
//! }
//! ```
//! Controllers without a `components` list get the standard layout for their
//! hand.

use std::path::Path;
use std::rc::Rc;

use glam::{Quat, Vec2, Vec3};
use serde::{Deserialize, Serialize};
use xrspace_common::Pose;
use xrspace_input::{ComponentType, Handedness, MotionController, XrComponent};

use crate::xr::XrSession;

#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("step at {at}s targets undeclared {hand} controller")]
    UnknownController { at: f64, hand: String },
    #[error("step at {at}s targets unknown component {component:?} on the {hand} controller")]
    UnknownComponent {
        at: f64,
        hand: String,
        component: String,
    },
    #[error("step at {at}s has neither value nor axes")]
    EmptyStep { at: f64 },
    #[error("controller {0} is declared twice")]
    DuplicateController(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ComponentType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSpec {
    pub handedness: Handedness,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentSpec>,
    /// World position of the grip. Omitted means no grip pose.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grip: Option<Vec3>,
    /// Pointer direction. Defaults to straight ahead (+Z).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aim: Option<Vec3>,
}

impl ControllerSpec {
    fn build_motion_controller(&self) -> MotionController {
        if self.components.is_empty() {
            return MotionController::standard(self.handedness);
        }
        let mut controller = MotionController::new("scripted");
        for c in &self.components {
            controller.add_component(XrComponent::new(c.id.clone(), c.kind));
        }
        controller
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    /// Scene time in seconds.
    pub at: f64,
    pub hand: Handedness,
    pub component: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f32>,
    /// Defaults to `value > 0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub axes: Option<[f32; 2]>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputScript {
    #[serde(default)]
    pub controllers: Vec<ControllerSpec>,
    #[serde(default)]
    pub steps: Vec<ScriptStep>,
}

impl InputScript {
    pub fn from_json_str(json: &str) -> Result<Self, ScriptError> {
        let mut script: Self = serde_json::from_str(json)?;
        script.validate()?;
        script.steps.sort_by(|a, b| a.at.total_cmp(&b.at));
        Ok(script)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScriptError> {
        let path = path.as_ref();
        let script = Self::from_json_str(&std::fs::read_to_string(path)?)?;
        tracing::debug!(
            path = %path.display(),
            controllers = script.controllers.len(),
            steps = script.steps.len(),
            "input script loaded"
        );
        Ok(script)
    }

    /// Time of the last step.
    pub fn duration(&self) -> f64 {
        self.steps.iter().map(|s| s.at).fold(0.0, f64::max)
    }

    fn validate(&self) -> Result<(), ScriptError> {
        let mut layouts: Vec<(Handedness, MotionController)> = Vec::new();
        for spec in &self.controllers {
            if layouts.iter().any(|(hand, _)| *hand == spec.handedness) {
                return Err(ScriptError::DuplicateController(spec.handedness.label().into()));
            }
            layouts.push((spec.handedness, spec.build_motion_controller()));
        }
        for step in &self.steps {
            let hand = step.hand.label().to_string();
            let Some((_, layout)) = layouts.iter().find(|(h, _)| *h == step.hand) else {
                return Err(ScriptError::UnknownController { at: step.at, hand });
            };
            if layout.component(&step.component).is_none() {
                return Err(ScriptError::UnknownComponent {
                    at: step.at,
                    hand,
                    component: step.component.clone(),
                });
            }
            if step.value.is_none() && step.axes.is_none() {
                return Err(ScriptError::EmptyStep { at: step.at });
            }
        }
        Ok(())
    }
}

struct Connected {
    hand: Handedness,
    controller: Rc<MotionController>,
}

/// Plays an [`InputScript`] into a session as scene time advances.
pub struct ScriptPlayer {
    script: InputScript,
    cursor: usize,
    connected: Vec<Connected>,
}

impl ScriptPlayer {
    pub fn new(script: InputScript) -> Self {
        Self {
            script,
            cursor: 0,
            connected: Vec::new(),
        }
    }

    pub fn script(&self) -> &InputScript {
        &self.script
    }

    /// Enter XR and connect every declared controller, then initialize its
    /// motion controller.
    pub fn connect(&mut self, session: &XrSession) {
        session.enter();
        for spec in &self.script.controllers {
            let source = session.connect_controller(spec.handedness);
            source.set_grip(spec.grip.map(|p| Pose::new(p, Quat::IDENTITY)));
            if let Some(aim) = spec.aim {
                let aim = aim.try_normalize().unwrap_or(Vec3::Z);
                let rotation = Quat::from_rotation_arc(Vec3::Z, aim);
                source.set_pointer(Pose::new(spec.grip.unwrap_or(Vec3::ZERO), rotation));
            }
            let controller = source.init_motion_controller(spec.build_motion_controller());
            self.connected.push(Connected {
                hand: spec.handedness,
                controller,
            });
        }
    }

    /// Apply every step due at or before `now`. Returns how many ran.
    pub fn advance(&mut self, now: f64) -> usize {
        let mut applied = 0;
        while let Some(step) = self.script.steps.get(self.cursor) {
            if step.at > now {
                break;
            }
            self.cursor += 1;
            applied += 1;

            let component = self
                .connected
                .iter()
                .find(|c| c.hand == step.hand)
                .and_then(|c| c.controller.component(&step.component));
            let Some(component) = component else {
                tracing::warn!(
                    at = step.at,
                    component = %step.component,
                    "step skipped: controller not connected"
                );
                continue;
            };
            tracing::trace!(
                at = step.at,
                hand = step.hand.label(),
                component = %step.component,
                "script step"
            );
            if let Some([x, y]) = step.axes {
                component.update_axes(Vec2::new(x, y));
            }
            if let Some(value) = step.value {
                component.update_button(step.pressed.unwrap_or(value > 0.0), value);
            }
        }
        applied
    }

    pub fn is_finished(&self) -> bool {
        self.cursor >= self.script.steps.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::xr::{XrSessionOptions, XrState};

    const SCRIPT: &str = r#"{
        "controllers": [
            {"handedness": "right", "grip": [0.0, 1.0, 0.0]},
            {"handedness": "left"}
        ],
        "steps": [
            {"at": 1.0, "hand": "left", "component": "xr-standard-thumbstick", "axes": [0.0, -1.0]},
            {"at": 0.5, "hand": "right", "component": "xr-standard-trigger", "value": 0.7}
        ]
    }"#;

    #[test]
    fn parses_and_sorts_steps() {
        let script = InputScript::from_json_str(SCRIPT).unwrap();
        assert_eq!(script.controllers.len(), 2);
        assert_eq!(script.steps[0].at, 0.5);
        assert_eq!(script.duration(), 1.0);
    }

    #[test]
    fn rejects_undeclared_targets() {
        let json = r#"{"controllers": [{"handedness": "left"}],
            "steps": [{"at": 0, "hand": "right", "component": "a-button", "value": 1}]}"#;
        assert!(matches!(
            InputScript::from_json_str(json),
            Err(ScriptError::UnknownController { .. })
        ));

        let json = r#"{"controllers": [{"handedness": "left"}],
            "steps": [{"at": 0, "hand": "left", "component": "a-button", "value": 1}]}"#;
        assert!(matches!(
            InputScript::from_json_str(json),
            Err(ScriptError::UnknownComponent { .. })
        ));

        let json = r#"{"controllers": [{"handedness": "left"}],
            "steps": [{"at": 0, "hand": "left", "component": "x-button"}]}"#;
        assert!(matches!(
            InputScript::from_json_str(json),
            Err(ScriptError::EmptyStep { .. })
        ));
    }

    #[test]
    fn player_applies_steps_on_time() {
        let session = XrSession::new(XrSessionOptions::default());
        let mut player = ScriptPlayer::new(InputScript::from_json_str(SCRIPT).unwrap());
        player.connect(&session);
        assert_eq!(session.state(), XrState::InXr);
        assert_eq!(session.controllers().len(), 2);

        assert_eq!(player.advance(0.25), 0);
        assert_eq!(player.advance(0.5), 1);
        let right = session.controllers()[0].motion_controller().unwrap();
        assert_eq!(right.component("xr-standard-trigger").unwrap().value(), 0.7);
        assert!(!player.is_finished());

        assert_eq!(player.advance(5.0), 1);
        assert!(player.is_finished());
    }
}
