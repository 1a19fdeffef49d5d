//! An XR experience: scene, avatar, physics and XR session brought up
//! together and wired so controller hardware drives the avatar.
//!
//! # Invariants
//! - Physics and XR bootstraps may complete in either order; the environment
//!   reports ready exactly once, when both are done.
//! - A failed bootstrap leaves readiness unchanged.
//! - Every controller the session reports is bound to the controller bus, and
//!   every binding is released on dispose.
//! - Script playback and bullet expiry run on scene time only.

pub mod config;
pub mod demo;
pub mod environment;
pub mod physics;
pub mod readiness;
pub mod script;
pub mod xr;

pub use config::{AvatarOverrides, BootstrapOrder, ConfigError, EnvironmentConfig, EnvironmentKind};
pub use demo::{DemoConfig, DemoScene, SplitMix64};
pub use environment::{Environment, EnvironmentError, RunSummary};
pub use physics::{PhysicsProvider, RapierPhysicsProvider};
pub use readiness::{Readiness, ReadinessFlags, ReadinessSignal, ReadinessState, Transition};
pub use script::{ComponentSpec, ControllerSpec, InputScript, ScriptError, ScriptPlayer, ScriptStep};
pub use xr::{SimulatedXrRuntime, XrError, XrRuntime, XrSession, XrSessionOptions, XrState};

/// Returns crate version info.
pub fn crate_info() -> &'static str {
    "xrspace-environment v0.1.0"
}
