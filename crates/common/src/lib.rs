//! Shared types for the xrspace workspace.
//!
//! # Invariants
//! - Everything here is single-threaded (`Rc`/`RefCell`); nothing is `Send`.
//! - Observers are released when their [`Subscription`] is dropped.

pub mod observable;
pub mod types;

pub use observable::{Observable, Subscription, SubscriptionSet};
pub use types::{NodeId, Pose, Ray, Transform};

pub fn crate_info() -> &'static str {
    "xrspace-common v0.1.0"
}
