//! XR session seam.
//!
//! The device runtime is external. [`XrRuntime`] is what the environment needs
//! from it; [`SimulatedXrRuntime`] stands in for a headset so sessions can be
//! driven from scripts and tests.

use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use xrspace_common::Observable;
use xrspace_input::{Handedness, XrInputSource};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum XrError {
    #[error("immersive sessions are not supported: {0}")]
    Unsupported(String),
    #[error("session request failed: {0}")]
    SessionFailed(String),
}

/// Options handed to the runtime when requesting a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XrSessionOptions {
    pub disable_teleportation: bool,
    pub framebuffer_scale: f32,
    pub optional_features: bool,
    pub pointer_selection_on_all_controllers: bool,
}

impl Default for XrSessionOptions {
    fn default() -> Self {
        Self {
            disable_teleportation: true,
            framebuffer_scale: 1.0,
            optional_features: true,
            pointer_selection_on_all_controllers: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum XrState {
    EnteringXr,
    InXr,
    ExitingXr,
    #[default]
    NotInXr,
}

/// A live XR session: its state and the controllers the runtime has found.
#[derive(Debug)]
pub struct XrSession {
    options: XrSessionOptions,
    state: Cell<XrState>,
    next_source: Cell<u32>,
    controllers: RefCell<Vec<Rc<XrInputSource>>>,
    on_controller_added: Observable<Rc<XrInputSource>>,
    on_state_changed: Observable<XrState>,
}

impl XrSession {
    pub fn new(options: XrSessionOptions) -> Self {
        Self {
            options,
            state: Cell::new(XrState::NotInXr),
            next_source: Cell::new(0),
            controllers: RefCell::new(Vec::new()),
            on_controller_added: Observable::new(),
            on_state_changed: Observable::new(),
        }
    }

    pub fn options(&self) -> &XrSessionOptions {
        &self.options
    }

    pub fn state(&self) -> XrState {
        self.state.get()
    }

    pub fn controllers(&self) -> Vec<Rc<XrInputSource>> {
        self.controllers.borrow().clone()
    }

    pub fn on_controller_added(&self) -> &Observable<Rc<XrInputSource>> {
        &self.on_controller_added
    }

    pub fn on_state_changed(&self) -> &Observable<XrState> {
        &self.on_state_changed
    }

    /// Runtime side: move to `state`, notifying only on change.
    pub fn set_state(&self, state: XrState) {
        if self.state.replace(state) == state {
            return;
        }
        tracing::debug!(?state, "xr state changed");
        self.on_state_changed.notify(&state);
    }

    /// Runtime side: enter immersive mode.
    pub fn enter(&self) {
        self.set_state(XrState::EnteringXr);
        self.set_state(XrState::InXr);
    }

    /// Runtime side: a controller was detected.
    pub fn connect_controller(&self, handedness: Handedness) -> Rc<XrInputSource> {
        let id = self.next_source.get();
        self.next_source.set(id + 1);
        let source = Rc::new(XrInputSource::new(id, handedness));
        self.controllers.borrow_mut().push(Rc::clone(&source));
        tracing::debug!(source = id, hand = handedness.label(), "controller added");
        self.on_controller_added.notify(&source);
        source
    }
}

/// What the environment needs from an XR device runtime.
pub trait XrRuntime {
    fn create_session(
        &self,
        options: &XrSessionOptions,
    ) -> impl Future<Output = Result<Rc<XrSession>, XrError>>;
}

/// Headless runtime: sessions start outside XR with no controllers; callers
/// (usually a script player) connect controllers and push hardware updates.
#[derive(Debug, Clone, Default)]
pub struct SimulatedXrRuntime {
    failure: Option<XrError>,
}

impl SimulatedXrRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// A runtime whose session requests always fail with `error`.
    pub fn failing(error: XrError) -> Self {
        Self {
            failure: Some(error),
        }
    }
}

impl XrRuntime for SimulatedXrRuntime {
    fn create_session(
        &self,
        options: &XrSessionOptions,
    ) -> impl Future<Output = Result<Rc<XrSession>, XrError>> {
        let result = match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(Rc::new(XrSession::new(options.clone()))),
        };
        std::future::ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_changes_notify_once() {
        let session = XrSession::new(XrSessionOptions::default());
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = Rc::clone(&seen);
        let _sub = session.on_state_changed().add(move |st| s.borrow_mut().push(*st));

        session.enter();
        session.set_state(XrState::InXr);

        assert_eq!(*seen.borrow(), vec![XrState::EnteringXr, XrState::InXr]);
    }

    #[test]
    fn controllers_get_distinct_ids() {
        let session = XrSession::new(XrSessionOptions::default());
        let left = session.connect_controller(Handedness::Left);
        let right = session.connect_controller(Handedness::Right);
        assert_ne!(left.id(), right.id());
        assert_eq!(session.controllers().len(), 2);
    }

    #[test]
    fn simulated_runtime_honors_failure() {
        let ok = pollster::block_on(SimulatedXrRuntime::new().create_session(&XrSessionOptions::default()));
        assert!(ok.is_ok());

        let runtime = SimulatedXrRuntime::failing(XrError::Unsupported("no headset".into()));
        let err = pollster::block_on(runtime.create_session(&XrSessionOptions::default()));
        assert_eq!(err.unwrap_err(), XrError::Unsupported("no headset".into()));
    }
}
